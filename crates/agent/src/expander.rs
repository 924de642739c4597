//! Response Expander: the second hop that turns a compact structured verdict
//! into prose for end-user display. A distinct pipeline stage with its own
//! sampling parameters, never conflated with the primary per-agent call.

use std::sync::Arc;

use boardroom_core::domain::{CallMetrics, Verdict};
use boardroom_core::errors::UpstreamError;
use boardroom_core::prompts::expander_context;
use boardroom_core::roles::EXPANDER_SPEC;

use crate::transport::ChatBackend;

#[derive(Clone)]
pub struct Expander {
    backend: Arc<dyn ChatBackend>,
}

impl Expander {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Expand `verdict` into prose, attributing it to the persona named by
    /// `title`. Failure semantics match the transport.
    pub async fn expand(
        &self,
        title: &str,
        verdict: &Verdict,
        correlation_id: &str,
    ) -> Result<(String, CallMetrics), UpstreamError> {
        let verdict_json = serde_json::to_string_pretty(verdict)
            .map_err(|error| UpstreamError::InvalidResponse(error.to_string()))?;
        let content = format!("{}\n\n{}", expander_context(title), verdict_json);
        self.backend.ask(&EXPANDER_SPEC, &content, correlation_id).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use boardroom_core::roles::AgentSpec;
    use std::sync::Mutex;

    use super::*;

    struct CapturingBackend {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatBackend for CapturingBackend {
        async fn ask(
            &self,
            spec: &AgentSpec,
            content: &str,
            _correlation_id: &str,
        ) -> Result<(String, CallMetrics), UpstreamError> {
            self.seen.lock().unwrap().push((spec.key.to_string(), content.to_string()));
            Ok(("The CFO recommends proceeding.".to_string(), CallMetrics::default()))
        }
    }

    #[tokio::test]
    async fn wraps_verdict_with_role_context_and_expander_params() {
        let backend = Arc::new(CapturingBackend { seen: Mutex::new(Vec::new()) });
        let expander = Expander::new(Arc::clone(&backend) as Arc<dyn ChatBackend>);

        let verdict = Verdict::from_raw(r#"{"verdict":"GO","confidence":70}"#);
        let (text, _) = expander
            .expand("Chief Financial Officer", &verdict, "corr-1")
            .await
            .expect("expand");
        assert_eq!(text, "The CFO recommends proceeding.");

        let seen = backend.seen.lock().unwrap();
        let (spec_key, content) = &seen[0];
        assert_eq!(spec_key, "expander");
        assert!(content.starts_with("The verdict below was produced by the Chief Financial Officer."));
        assert!(content.contains("\"verdict\": \"GO\""));
    }
}
