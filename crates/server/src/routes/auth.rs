use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bootstrap::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 255
        && user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    if !valid_user_id(&request.user_id) {
        return Err(ApiError::Validation(
            "user_id must match [A-Za-z0-9_-]{1,255}".to_string(),
        ));
    }

    let pair = state.sessions.issue(&request.user_id)?;
    info!(user = %request.user_id, "session issued");

    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
        expires_in: state.sessions.access_ttl_secs(),
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let access_token = state.sessions.refresh(&request.refresh_token)?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.sessions.access_ttl_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::valid_user_id;

    #[test]
    fn user_id_charset_and_length_are_enforced() {
        assert!(valid_user_id("u1"));
        assert!(valid_user_id("User_Name-42"));
        assert!(valid_user_id(&"a".repeat(255)));

        assert!(!valid_user_id(""));
        assert!(!valid_user_id("has space"));
        assert!(!valid_user_id("émile"));
        assert!(!valid_user_id(&"a".repeat(256)));
    }
}
