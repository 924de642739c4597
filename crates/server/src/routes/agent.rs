//! Single-persona ask outside a full board round. Runs the same
//! compress → ask → expand pipeline as the board fan-out.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use boardroom_core::roles::AgentRole;

use crate::bootstrap::AppState;
use crate::error::ApiError;
use crate::limiter::LimitScope;
use crate::routes::bearer_subject;
use crate::routes::board::{DebugInfo, WireReply};

#[derive(Debug, Deserialize)]
pub struct AgentBody {
    pub agent: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentResponseBody {
    #[serde(flatten)]
    pub reply: WireReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

pub async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AgentBody>,
) -> Result<Json<AgentResponseBody>, ApiError> {
    let subject = bearer_subject(&headers, &state)?;
    state
        .limiter
        .check(&subject, LimitScope::Agent)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    let role = AgentRole::parse(&body.agent)
        .map_err(|error| ApiError::Validation(error.to_string()))?;

    let correlation_id = Uuid::new_v4().to_string();
    let (reply, compressed) = state
        .board
        .ask_single(
            role,
            body.message.as_deref(),
            &body.history,
            &subject,
            body.debug,
            &correlation_id,
        )
        .await?;

    Ok(Json(AgentResponseBody {
        reply: WireReply::from(reply),
        debug: body.debug.then_some(DebugInfo { correlation_id, compressed }),
    }))
}
