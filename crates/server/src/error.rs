//! HTTP error mapping. Every failure in the pipeline surfaces here as one
//! status code plus a `{"detail": ...}` body; provider bodies and tokens
//! never reach the client.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use boardroom_auth::AuthError;
use boardroom_core::errors::{BoardError, UpstreamError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credentials were presented at all.
    #[error("authorization header is required")]
    MissingCredentials,
    /// Credentials were presented but did not verify.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Signing(message) => Self::Internal(message),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(error: BoardError) -> Self {
        match error {
            BoardError::Upstream(upstream) => Self::Upstream(upstream),
            validation => Self::Validation(validation.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::MissingCredentials => (StatusCode::FORBIDDEN, self.to_string()),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            Self::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message.clone()),
            Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Upstream(upstream) => {
                (StatusCode::BAD_GATEWAY, upstream.user_message().to_string())
            }
            Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
