//! Domain types shared across the pipeline: the compact request produced by
//! the compressor, the structured verdict produced by board personas, and the
//! per-call usage record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured distillation of a free-text user message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedRequest {
    pub intent: String,
    pub domain: String,
    #[serde(default)]
    pub idea_summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub constraints: Option<Value>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub key_facts: Vec<String>,
}

impl CompressedRequest {
    /// Degraded representation used when the compressor returns invalid or
    /// incomplete JSON. The request still flows through the board.
    pub fn fallback(user_msg: &str) -> Self {
        Self {
            intent: "other".to_string(),
            domain: "strategy".to_string(),
            idea_summary: Some(truncate_chars(user_msg, 100)),
            key_points: vec![truncate_chars(user_msg, 200)],
            constraints: None,
            assumptions: Vec::new(),
            key_facts: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.intent.is_empty() && !self.domain.is_empty()
    }
}

/// Compact structured verdict returned by a board persona.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: String,
    #[serde(default)]
    pub confidence: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Verdict {
    /// Parse raw model output, degrading instead of failing: non-JSON output
    /// becomes a `NO-DATA` verdict carrying a bounded raw prefix, JSON missing
    /// the critical fields becomes `INCOMPLETE` keeping whatever was present.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(mut fields) => {
                let has_verdict = fields.get("verdict").is_some_and(|v| v.is_string());
                let has_confidence = fields.get("confidence").is_some_and(Value::is_number);
                if has_verdict && has_confidence {
                    let verdict = fields
                        .remove("verdict")
                        .and_then(|v| v.as_str().map(str::to_owned))
                        .unwrap_or_default();
                    let confidence =
                        fields.remove("confidence").and_then(|v| v.as_i64()).unwrap_or(0);
                    Self { verdict, confidence, extra: fields }
                } else {
                    fields.insert("raw_response".to_string(), Value::String(raw.to_string()));
                    Self { verdict: "INCOMPLETE".to_string(), confidence: 0, extra: fields }
                }
            }
            Err(_) => Self::no_data(raw),
        }
    }

    pub fn no_data(raw: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("raw_response".to_string(), Value::String(truncate_chars(raw, 500)));
        Self { verdict: "NO-DATA".to_string(), confidence: 0, extra }
    }
}

/// Token and latency accounting for one provider call. Surfaced only in
/// debug responses, never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tokens_input: u32,
    pub tokens_output: u32,
    pub tokens_total: u32,
    pub latency_ms: u64,
}

impl UsageRecord {
    /// Combine the primary call's usage with the expander hop.
    pub fn combined(self, other: UsageRecord) -> UsageRecord {
        UsageRecord {
            tokens_input: self.tokens_input + other.tokens_input,
            tokens_output: self.tokens_output + other.tokens_output,
            tokens_total: self.tokens_total + other.tokens_total,
            latency_ms: self.latency_ms + other.latency_ms,
        }
    }
}

/// Usage plus the finish reason reported by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    #[serde(flatten)]
    pub usage: UsageRecord,
    pub finish_reason: Option<String>,
}

/// One persona's reply within a board invocation. Verdict and usage are only
/// populated in debug mode; they never replace the expanded text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CallMetrics>,
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_well_formed_json() {
        let raw = r#"{"verdict":"GO","confidence":72,"risks":["churn"]}"#;
        let verdict = Verdict::from_raw(raw);
        assert_eq!(verdict.verdict, "GO");
        assert_eq!(verdict.confidence, 72);
        assert_eq!(verdict.extra["risks"][0], "churn");
    }

    #[test]
    fn verdict_marks_missing_fields_incomplete() {
        let verdict = Verdict::from_raw(r#"{"arguments":["cheap"]}"#);
        assert_eq!(verdict.verdict, "INCOMPLETE");
        assert_eq!(verdict.confidence, 0);
        assert!(verdict.extra.contains_key("raw_response"));
        assert_eq!(verdict.extra["arguments"][0], "cheap");
    }

    #[test]
    fn verdict_degrades_non_json_to_no_data() {
        let verdict = Verdict::from_raw("I think this is a great idea!");
        assert_eq!(verdict.verdict, "NO-DATA");
        assert_eq!(verdict.extra["raw_response"], "I think this is a great idea!");
    }

    #[test]
    fn no_data_bounds_the_raw_prefix() {
        let long = "x".repeat(2000);
        let verdict = Verdict::no_data(&long);
        let stored = verdict.extra["raw_response"].as_str().unwrap();
        assert_eq!(stored.chars().count(), 500);
    }

    #[test]
    fn fallback_request_keeps_the_message_readable() {
        let compressed = CompressedRequest::fallback("Should we expand to LATAM?");
        assert!(compressed.is_complete());
        assert_eq!(compressed.intent, "other");
        assert_eq!(compressed.key_points, vec!["Should we expand to LATAM?".to_string()]);
    }

    #[test]
    fn usage_combines_across_pipeline_hops() {
        let primary = UsageRecord {
            tokens_input: 100,
            tokens_output: 50,
            tokens_total: 150,
            latency_ms: 800,
        };
        let expander =
            UsageRecord { tokens_input: 60, tokens_output: 90, tokens_total: 150, latency_ms: 650 };
        let total = primary.combined(expander);
        assert_eq!(total.tokens_total, 300);
        assert_eq!(total.latency_ms, 1450);
    }
}
