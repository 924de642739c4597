//! HTTP surface.
//!
//! Public endpoints:
//! - `POST /api/login`: issue an access/refresh token pair
//! - `POST /api/refresh`: exchange a refresh token for a new access token
//!
//! Authenticated endpoints (`Authorization: Bearer <access_token>`; missing
//! header → 403, invalid/expired/wrong-kind token → 401):
//! - `POST /api/board`: fan a question out to the active board personas
//! - `POST /api/agent`: ask a single persona
//! - `POST /api/summary`: recompute the board summary from history
//! - `POST /api/therapy`: session-scoped dialogue with the therapist persona
//! - `DELETE /api/therapy/insights/{insight_id}`: soft-delete a captured insight

pub mod agent;
pub mod auth;
pub mod board;
pub mod therapy;

use axum::http::{header, HeaderMap};
use axum::routing::{delete, post};
use axum::Router;

use boardroom_auth::TokenKind;

use crate::bootstrap::AppState;
use crate::error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/board", post(board::board))
        .route("/api/summary", post(board::summary))
        .route("/api/agent", post(agent::ask))
        .route("/api/therapy", post(therapy::turn))
        .route("/api/therapy/insights/{insight_id}", delete(therapy::delete_insight))
        .with_state(state)
}

/// Extract and verify the bearer access token; returns the authenticated
/// subject. A missing header is a distinct failure from a bad token.
pub(crate) fn bearer_subject(headers: &HeaderMap, state: &AppState) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("authorization scheme must be Bearer".to_string()))?;

    Ok(state.sessions.verify(token, TokenKind::Access)?)
}
