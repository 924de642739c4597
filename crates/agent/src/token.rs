//! Provider Token Cache: acquires a bearer token from the provider's OAuth
//! endpoint and shares it across all outbound calls in the process.
//!
//! Renewal follows the read-then-lock-then-read pattern: a `RwLock` fast path
//! for the common case, and a `tokio::sync::Mutex` renewal gate so at most
//! one acquisition is ever in flight. Waiters blocked on the gate re-check
//! the cache and pick up the freshly stored value instead of renewing again.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use boardroom_core::config::ProviderConfig;
use boardroom_core::domain::truncate_chars;
use boardroom_core::errors::UpstreamError;

const ERROR_BODY_PREFIX: usize = 256;

#[derive(Clone, Debug)]
struct CachedToken {
    bearer: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    // Provider-reported expiry (ms since epoch). Parsed for the log line,
    // but the cache trusts only the conservative configured TTL.
    #[serde(default)]
    expires_at: Option<i64>,
}

pub struct ProviderTokens {
    http: reqwest::Client,
    config: ProviderConfig,
    cached: RwLock<Option<CachedToken>>,
    renewal: tokio::sync::Mutex<()>,
}

impl ProviderTokens {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config, cached: RwLock::new(None), renewal: tokio::sync::Mutex::new(()) }
    }

    /// Returns the cached bearer token, acquiring a new one if absent or
    /// expired. Concurrent callers observe exactly one network acquisition.
    pub async fn bearer(&self) -> Result<String, UpstreamError> {
        if let Some(bearer) = self.fresh() {
            return Ok(bearer);
        }

        let _gate = self.renewal.lock().await;
        // Another caller may have renewed while we waited on the gate.
        if let Some(bearer) = self.fresh() {
            return Ok(bearer);
        }

        let token = self.acquire().await?;
        let bearer = token.bearer.clone();
        *self.cached.write().expect("token cache lock poisoned") = Some(token);
        Ok(bearer)
    }

    fn fresh(&self) -> Option<String> {
        let cached = self.cached.read().expect("token cache lock poisoned");
        cached
            .as_ref()
            .filter(|token| Instant::now() < token.expires_at)
            .map(|token| token.bearer.clone())
    }

    async fn acquire(&self) -> Result<CachedToken, UpstreamError> {
        let request_id = Uuid::new_v4();
        debug!(rquid = %request_id, "acquiring provider token");

        let response = self
            .http
            .post(&self.config.auth_url)
            .header("Authorization", format!("Basic {}", self.config.auth_key.expose_secret()))
            .header("RqUID", request_id.to_string())
            .header("Accept", "application/json")
            .form(&[("scope", self.config.scope.as_str())])
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
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Auth {
                status: status.as_u16(),
                body_prefix: truncate_chars(&body, ERROR_BODY_PREFIX),
            });
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|error| UpstreamError::InvalidResponse(error.to_string()))?;

        let ttl = Duration::from_secs(self.config.token_cache_secs);
        info!(
            cache_ttl_secs = self.config.token_cache_secs,
            provider_expires_at = auth.expires_at,
            "provider token acquired"
        );

        Ok(CachedToken { bearer: auth.access_token, expires_at: Instant::now() + ttl })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(auth_url: String) -> ProviderConfig {
        ProviderConfig {
            auth_url,
            api_base: "http://unused".to_string(),
            scope: "GIGACHAT_API_PERS".to_string(),
            model: "GigaChat-2".to_string(),
            auth_key: "basic-credential".to_string().into(),
            request_timeout_secs: 5,
            token_cache_secs: 1500,
        }
    }

    #[tokio::test]
    async fn concurrent_callers_trigger_exactly_one_acquisition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .and(header_exists("RqUID"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_at": 1_900_000_000_000i64,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(ProviderTokens::new(
            reqwest::Client::new(),
            config(format!("{}/oauth", server.uri())),
        ));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let tokens = Arc::clone(&tokens);
            handles.push(tokio::spawn(async move { tokens.bearer().await }));
        }

        for handle in handles {
            let bearer = handle.await.expect("join").expect("bearer");
            assert_eq!(bearer, "tok-1");
        }
    }

    #[tokio::test]
    async fn expired_token_is_replaced_on_next_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-fresh",
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut cfg = config(format!("{}/oauth", server.uri()));
        cfg.token_cache_secs = 1;
        let tokens = ProviderTokens::new(reqwest::Client::new(), cfg);

        assert_eq!(tokens.bearer().await.expect("first"), "tok-fresh");
        // Force expiry rather than sleeping out the TTL.
        tokens.cached.write().unwrap().as_mut().unwrap().expires_at =
            Instant::now() - Duration::from_secs(1);
        assert_eq!(tokens.bearer().await.expect("second"), "tok-fresh");
    }

    #[tokio::test]
    async fn auth_failure_propagates_with_bounded_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(ResponseTemplate::new(401).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let tokens =
            ProviderTokens::new(reqwest::Client::new(), config(format!("{}/oauth", server.uri())));

        match tokens.bearer().await {
            Err(UpstreamError::Auth { status, body_prefix }) => {
                assert_eq!(status, 401);
                assert_eq!(body_prefix.len(), ERROR_BODY_PREFIX);
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }
}
