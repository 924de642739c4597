//! LLM Transport: chat-completion calls to the provider using the cached
//! bearer token. Extracts the assistant text plus usage metrics and logs each
//! call with a correlation identifier, never the token or the full content.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use boardroom_core::config::ProviderConfig;
use boardroom_core::domain::{truncate_chars, CallMetrics, UsageRecord};
use boardroom_core::errors::UpstreamError;
use boardroom_core::roles::AgentSpec;

use crate::token::ProviderTokens;

const ERROR_BODY_PREFIX: usize = 256;

/// Seam between the pipeline and the wire. The orchestrator, compressor, and
/// expander all speak through this trait so tests can script replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn ask(
        &self,
        spec: &AgentSpec,
        content: &str,
        correlation_id: &str,
    ) -> Result<(String, CallMetrics), UpstreamError>;
}

pub struct LlmClient {
    http: reqwest::Client,
    tokens: Arc<ProviderTokens>,
    config: ProviderConfig,
}

impl LlmClient {
    pub fn new(config: ProviderConfig) -> Self {
        let http = reqwest::Client::new();
        let tokens = Arc::new(ProviderTokens::new(http.clone(), config.clone()));
        Self { http, tokens, config }
    }

    pub fn with_tokens(config: ProviderConfig, tokens: Arc<ProviderTokens>) -> Self {
        Self { http: reqwest::Client::new(), tokens, config }
    }

    fn completions_url(&self) -> String {
        format!("{}/api/v1/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn ask(
        &self,
        spec: &AgentSpec,
        content: &str,
        correlation_id: &str,
    ) -> Result<(String, CallMetrics), UpstreamError> {
        let bearer = self.tokens.bearer().await?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": spec.system_prompt },
                { "role": "user", "content": content },
            ],
            "stream": false,
            "temperature": spec.temperature,
            "max_tokens": spec.max_tokens,
            "top_p": spec.top_p,
        });

        let started = Instant::now();
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(bearer)
            .json(&payload)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    UpstreamError::Timeout { timeout_secs: self.config.request_timeout_secs }
                } else {
                    UpstreamError::Connect(error.to_string())
                }
            })?;

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                correlation_id = %correlation_id,
                agent = spec.key,
                status = status.as_u16(),
                latency_ms,
                "provider call failed"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body_prefix: truncate_chars(&body, ERROR_BODY_PREFIX),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|error| UpstreamError::InvalidResponse(error.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::InvalidResponse("response carried no choices".into()))?;

        let usage = completion.usage.unwrap_or_default();
        let metrics = CallMetrics {
            usage: UsageRecord {
                tokens_input: usage.prompt_tokens,
                tokens_output: usage.completion_tokens,
                tokens_total: usage.total_tokens,
                latency_ms,
            },
            finish_reason: choice.finish_reason,
        };

        info!(
            correlation_id = %correlation_id,
            agent = spec.key,
            status = status.as_u16(),
            latency_ms,
            tokens_total = metrics.usage.tokens_total,
            "provider call completed"
        );

        Ok((choice.message.content.trim().to_string(), metrics))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use boardroom_core::roles::AgentRole;

    use super::*;

    fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            auth_url: format!("{}/oauth", server.uri()),
            api_base: server.uri(),
            scope: "GIGACHAT_API_PERS".to_string(),
            model: "GigaChat-2".to_string(),
            auth_key: "basic-credential".to_string().into(),
            request_timeout_secs: 5,
            token_cache_secs: 1500,
        }
    }

    async fn mount_auth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn sends_agent_parameters_and_unpacks_text_and_usage() {
        let server = MockServer::start().await;
        mount_auth(&server).await;

        let spec = AgentRole::Cfo.spec();
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_partial_json(serde_json::json!({
                "model": "GigaChat-2",
                "stream": false,
                "max_tokens": spec.max_tokens,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": { "content": "  {\"verdict\":\"GO\",\"confidence\":80}  " },
                    "finish_reason": "stop",
                }],
                "usage": { "prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(config(&server));
        let (text, metrics) = client.ask(spec, "question", "corr-1").await.expect("ask");

        assert_eq!(text, "{\"verdict\":\"GO\",\"confidence\":80}");
        assert_eq!(metrics.usage.tokens_input, 120);
        assert_eq!(metrics.usage.tokens_total, 160);
        assert_eq!(metrics.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_bounded_body() {
        let server = MockServer::start().await;
        mount_auth(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("y".repeat(4096)))
            .mount(&server)
            .await;

        let client = LlmClient::new(config(&server));
        match client.ask(AgentRole::Ceo.spec(), "question", "corr-2").await {
            Err(UpstreamError::Status { status, body_prefix }) => {
                assert_eq!(status, 503);
                assert_eq!(body_prefix.len(), ERROR_BODY_PREFIX);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_invalid_response() {
        let server = MockServer::start().await;
        mount_auth(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(config(&server));
        let error = client
            .ask(AgentRole::Ceo.spec(), "question", "corr-3")
            .await
            .expect_err("no choices must fail");
        assert!(matches!(error, UpstreamError::InvalidResponse(_)));
    }
}
