//! Error taxonomy for the provider pipeline. Transport and auth failures are
//! never swallowed: they propagate to the orchestrator, which decides
//! per-agent isolation, and finally to the HTTP boundary for status mapping.

use thiserror::Error;

use crate::roles::UnknownAgent;

/// Failure talking to the upstream LLM provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Provider token acquisition failed. Fatal for the current request.
    #[error("provider auth failed with status {status}: {body_prefix}")]
    Auth { status: u16, body_prefix: String },
    /// Chat-completion call returned a non-success status.
    #[error("provider call failed with status {status}: {body_prefix}")]
    Status { status: u16, body_prefix: String },
    /// The per-call timeout elapsed. Not retried.
    #[error("provider call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("provider connection failed: {0}")]
    Connect(String),
    /// Response body did not match the expected completion shape.
    #[error("provider returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Text safe to show an end user. Raw provider bodies and tokens stay out.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "Authorization with the language model provider failed.",
            Self::Status { .. } | Self::InvalidResponse(_) => {
                "The language model provider returned an error."
            }
            Self::Timeout { .. } => "The language model provider timed out.",
            Self::Connect(_) => "The language model provider could not be reached.",
        }
    }
}

/// Failure of a board invocation as a whole. Validation variants are raised
/// before any network call is made.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("active_agents must not be empty")]
    NoAgents,
    #[error(transparent)]
    UnknownAgent(#[from] UnknownAgent),
    #[error("history is required to recompute a summary")]
    EmptyHistory,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl BoardError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NoAgents | Self::UnknownAgent(_) | Self::EmptyHistory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_never_leak_the_body() {
        let error = UpstreamError::Status {
            status: 500,
            body_prefix: "secret internal details".to_string(),
        };
        assert!(!error.user_message().contains("secret"));
    }

    #[test]
    fn validation_variants_are_flagged() {
        assert!(BoardError::NoAgents.is_validation());
        assert!(BoardError::EmptyHistory.is_validation());
        assert!(!BoardError::Upstream(UpstreamError::Timeout { timeout_secs: 60 }).is_validation());
    }
}
