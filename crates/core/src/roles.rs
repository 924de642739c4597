//! Closed enumeration of the advisor panel plus the static per-agent
//! configuration table. Unknown role keys are rejected here, at the boundary,
//! never deeper in the call chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts;

/// Sampling parameters and system prompt for one persona or pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub system_prompt: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// The fixed set of board personas queried per user request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Ceo,
    Cfo,
    Cpo,
    Marketing,
    Skeptic,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown agent `{0}` (expected ceo|cfo|cpo|marketing|skeptic)")]
pub struct UnknownAgent(pub String);

impl AgentRole {
    /// Canonical output ordering for board replies.
    pub const BOARD_ORDER: [AgentRole; 5] =
        [Self::Ceo, Self::Cfo, Self::Cpo, Self::Marketing, Self::Skeptic];

    pub fn parse(value: &str) -> Result<Self, UnknownAgent> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ceo" => Ok(Self::Ceo),
            "cfo" => Ok(Self::Cfo),
            "cpo" => Ok(Self::Cpo),
            "marketing" => Ok(Self::Marketing),
            "skeptic" => Ok(Self::Skeptic),
            other => Err(UnknownAgent(other.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        self.spec().key
    }

    pub fn title(&self) -> &'static str {
        self.spec().title
    }

    pub fn spec(&self) -> &'static AgentSpec {
        match self {
            Self::Ceo => &CEO_SPEC,
            Self::Cfo => &CFO_SPEC,
            Self::Cpo => &CPO_SPEC,
            Self::Marketing => &MARKETING_SPEC,
            Self::Skeptic => &SKEPTIC_SPEC,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = UnknownAgent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

static CEO_SPEC: AgentSpec = AgentSpec {
    key: "ceo",
    title: "Chief Executive Officer",
    system_prompt: prompts::CEO_SYSTEM_PROMPT,
    temperature: 0.8,
    max_tokens: 500,
    top_p: 0.9,
};

static CFO_SPEC: AgentSpec = AgentSpec {
    key: "cfo",
    title: "Chief Financial Officer",
    system_prompt: prompts::CFO_SYSTEM_PROMPT,
    temperature: 0.6,
    max_tokens: 500,
    top_p: 0.9,
};

static CPO_SPEC: AgentSpec = AgentSpec {
    key: "cpo",
    title: "Chief Product Officer",
    system_prompt: prompts::CPO_SYSTEM_PROMPT,
    temperature: 0.7,
    max_tokens: 500,
    top_p: 0.9,
};

static MARKETING_SPEC: AgentSpec = AgentSpec {
    key: "marketing",
    title: "Head of Marketing",
    system_prompt: prompts::MARKETING_SYSTEM_PROMPT,
    temperature: 0.9,
    max_tokens: 500,
    top_p: 0.95,
};

static SKEPTIC_SPEC: AgentSpec = AgentSpec {
    key: "skeptic",
    title: "Resident Skeptic",
    system_prompt: prompts::SKEPTIC_SYSTEM_PROMPT,
    temperature: 0.7,
    max_tokens: 500,
    top_p: 0.9,
};

/// Synthesizes the board's verdicts into a single recommendation.
pub static SUMMARY_SPEC: AgentSpec = AgentSpec {
    key: "summary",
    title: "Board Summary",
    system_prompt: prompts::SUMMARY_SYSTEM_PROMPT,
    temperature: 0.6,
    max_tokens: 600,
    top_p: 0.9,
};

/// Reduces a free-text user message into the compact structured form.
pub static COMPRESSOR_SPEC: AgentSpec = AgentSpec {
    key: "compressor",
    title: "Request Compressor",
    system_prompt: prompts::COMPRESSOR_SYSTEM_PROMPT,
    temperature: 0.3,
    max_tokens: 300,
    top_p: 0.85,
};

/// Converts a compact structured verdict back into prose.
pub static EXPANDER_SPEC: AgentSpec = AgentSpec {
    key: "expander",
    title: "Response Expander",
    system_prompt: prompts::EXPANDER_SYSTEM_PROMPT,
    temperature: 0.5,
    max_tokens: 600,
    top_p: 0.9,
};

pub static THERAPIST_SPEC: AgentSpec = AgentSpec {
    key: "therapist",
    title: "Clarity Therapist",
    system_prompt: prompts::THERAPIST_SYSTEM_PROMPT,
    temperature: 0.7,
    max_tokens: 500,
    top_p: 0.9,
};

pub static HYPOTHESIS_SPEC: AgentSpec = AgentSpec {
    key: "hypothesis",
    title: "Hypothesis Generator",
    system_prompt: prompts::HYPOTHESIS_SYSTEM_PROMPT,
    temperature: 0.8,
    max_tokens: 500,
    top_p: 0.9,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_keys_case_insensitively() {
        assert_eq!(AgentRole::parse("cfo"), Ok(AgentRole::Cfo));
        assert_eq!(AgentRole::parse(" CEO "), Ok(AgentRole::Ceo));
        assert_eq!(AgentRole::parse("Skeptic"), Ok(AgentRole::Skeptic));
    }

    #[test]
    fn parse_rejects_unknown_keys() {
        let err = AgentRole::parse("cto").expect_err("cto is not on the board");
        assert_eq!(err, UnknownAgent("cto".to_string()));
    }

    #[test]
    fn board_order_covers_every_role_once() {
        let mut keys: Vec<&str> = AgentRole::BOARD_ORDER.iter().map(|r| r.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn specs_carry_distinct_keys_and_titles() {
        for role in AgentRole::BOARD_ORDER {
            let spec = role.spec();
            assert_eq!(spec.key, role.key());
            assert!(!spec.title.is_empty());
            assert!(!spec.system_prompt.is_empty());
            assert!(spec.max_tokens > 0);
        }
    }
}
