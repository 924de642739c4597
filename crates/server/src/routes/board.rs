//! Board fan-out and summary-recompute endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use boardroom_agent::{AgentFailure, BoardMode, BoardRequest};
use boardroom_core::domain::{AgentReply, CallMetrics, CompressedRequest, Verdict};
use boardroom_core::roles::AgentRole;

use crate::bootstrap::AppState;
use crate::error::ApiError;
use crate::limiter::LimitScope;
use crate::routes::bearer_subject;

#[derive(Debug, Deserialize)]
pub struct BoardBody {
    pub message: String,
    /// Omitted means the full board in canonical order.
    #[serde(default)]
    pub active_agents: Option<Vec<String>>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub mode: BoardMode,
    #[serde(default)]
    pub debug: bool,
}

/// One persona reply in wire shape.
#[derive(Debug, Serialize)]
pub struct WireReply {
    pub agent: String,
    pub role: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CallMetrics>,
}

impl From<AgentReply> for WireReply {
    fn from(reply: AgentReply) -> Self {
        Self {
            agent: reply.agent,
            role: reply.title,
            response: reply.text,
            verdict: reply.verdict,
            meta: reply.usage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DebugInfo {
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<CompressedRequest>,
}

#[derive(Debug, Serialize)]
pub struct BoardResponseBody {
    pub agents: Vec<WireReply>,
    pub summary: Option<String>,
    pub failed: Vec<AgentFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

pub async fn board(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BoardBody>,
) -> Result<Json<BoardResponseBody>, ApiError> {
    let subject = bearer_subject(&headers, &state)?;
    state
        .limiter
        .check(&subject, LimitScope::Board)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    if body.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    let active = parse_agents(body.active_agents)?;

    let correlation_id = Uuid::new_v4().to_string();
    let outcome = state
        .board
        .run(BoardRequest {
            user_id: subject,
            message: body.message,
            active,
            history: body.history,
            mode: body.mode,
            debug: body.debug,
            correlation_id: correlation_id.clone(),
        })
        .await?;

    let summary = outcome.summary.map(|reply| reply.text);
    Ok(Json(BoardResponseBody {
        agents: outcome.replies.into_iter().map(WireReply::from).collect(),
        summary,
        failed: outcome.failures,
        debug: body
            .debug
            .then_some(DebugInfo { correlation_id, compressed: outcome.compressed }),
    }))
}

fn parse_agents(requested: Option<Vec<String>>) -> Result<Vec<AgentRole>, ApiError> {
    match requested {
        None => Ok(AgentRole::BOARD_ORDER.to_vec()),
        Some(keys) => keys
            .iter()
            .map(|key| AgentRole::parse(key))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| ApiError::Validation(error.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryBody {
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponseBody {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CallMetrics>,
}

pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SummaryBody>,
) -> Result<Json<SummaryResponseBody>, ApiError> {
    let subject = bearer_subject(&headers, &state)?;
    state
        .limiter
        .check(&subject, LimitScope::Summary)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    let correlation_id = Uuid::new_v4().to_string();
    let reply = state.board.summarize_history(&body.history, body.debug, &correlation_id).await?;

    Ok(Json(SummaryResponseBody { summary: reply.text, meta: reply.usage }))
}
