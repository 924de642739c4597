//! Session-scoped dialogue with the therapist persona. Each turn the
//! therapist asks one clarifying question and may surface a key insight; once
//! insights exist, testable hypotheses are regenerated from them.
//!
//! Users can delete an insight they disagree with. Deletion is a soft flag:
//! the insight disappears from responses and hypothesis input, but stays
//! visible to the therapist as a sensitive topic.
//!
//! Sessions live in process memory only and are owned by the user that
//! started them.

use std::collections::HashMap;
use std::sync::RwLock;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use boardroom_core::roles::{HYPOTHESIS_SPEC, THERAPIST_SPEC};

use crate::bootstrap::AppState;
use crate::error::ApiError;
use crate::limiter::LimitScope;
use crate::routes::bearer_subject;

const CONTEXT_TURNS: usize = 10;
// Insights below this importance are treated as conversational noise.
const INSIGHT_IMPORTANCE_FLOOR: i64 = 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub text: String,
    #[serde(default)]
    pub confidence: i64,
    #[serde(default)]
    pub ready_for_board: bool,
}

#[derive(Clone, Debug)]
pub struct Insight {
    pub id: Uuid,
    pub text: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct WireInsight {
    pub id: Uuid,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct TherapySession {
    pub user_id: String,
    pub turns: Vec<String>,
    pub insights: Vec<Insight>,
    pub hypotheses: Vec<Hypothesis>,
}

impl TherapySession {
    fn new(user_id: &str) -> Self {
        Self { user_id: user_id.to_string(), ..Self::default() }
    }

    fn active_insights(&self) -> Vec<&Insight> {
        self.insights.iter().filter(|insight| !insight.deleted).collect()
    }

    fn deleted_insights(&self) -> Vec<&Insight> {
        self.insights.iter().filter(|insight| insight.deleted).collect()
    }
}

#[derive(Default)]
pub struct TherapyStore {
    sessions: RwLock<HashMap<Uuid, TherapySession>>,
}

impl TherapyStore {
    fn create(&self, user_id: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .expect("therapy store poisoned")
            .insert(id, TherapySession::new(user_id));
        id
    }

    /// Clone the session for `id` after checking ownership. Unknown and
    /// foreign sessions are indistinguishable to the caller.
    fn snapshot(&self, id: Uuid, user_id: &str) -> Result<TherapySession, ApiError> {
        let sessions = self.sessions.read().expect("therapy store poisoned");
        sessions
            .get(&id)
            .filter(|session| session.user_id == user_id)
            .cloned()
            .ok_or_else(|| ApiError::Validation(format!("unknown therapy session `{id}`")))
    }

    fn replace(&self, id: Uuid, session: TherapySession) {
        self.sessions.write().expect("therapy store poisoned").insert(id, session);
    }

    /// Soft-delete an insight across the user's sessions. Unknown and
    /// foreign insights are indistinguishable to the caller.
    fn delete_insight(&self, insight_id: Uuid, user_id: &str) -> Result<Uuid, ApiError> {
        let mut sessions = self.sessions.write().expect("therapy store poisoned");
        for (session_id, session) in sessions.iter_mut() {
            if session.user_id != user_id {
                continue;
            }
            if let Some(insight) =
                session.insights.iter_mut().find(|insight| insight.id == insight_id)
            {
                if insight.deleted {
                    break;
                }
                insight.deleted = true;
                return Ok(*session_id);
            }
        }
        Err(ApiError::Validation(format!("unknown insight `{insight_id}`")))
    }
}

#[derive(Debug, Deserialize)]
pub struct TherapyBody {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TherapyResponseBody {
    pub session_id: Uuid,
    pub question: String,
    pub insights: Vec<WireInsight>,
    pub hypotheses: Vec<Hypothesis>,
}

#[derive(Debug, Serialize)]
pub struct DeleteInsightResponse {
    pub status: &'static str,
    pub insight_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct TherapistTurn {
    question: String,
    #[serde(default)]
    key_insight: Option<String>,
    #[serde(default)]
    insight_importance: i64,
}

#[derive(Debug, Default, Deserialize)]
struct HypothesisBatch {
    #[serde(default)]
    hypotheses: Vec<Hypothesis>,
}

pub async fn turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TherapyBody>,
) -> Result<Json<TherapyResponseBody>, ApiError> {
    let subject = bearer_subject(&headers, &state)?;
    state
        .limiter
        .check(&subject, LimitScope::Agent)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    if body.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }

    let session_id = match body.session_id {
        Some(id) => id,
        None => state.therapy.create(&subject),
    };
    let mut session = state.therapy.snapshot(session_id, &subject)?;

    let correlation_id = Uuid::new_v4().to_string();
    let context = build_context(&session, &body.message);
    let raw = state.board.ask_stage_raw(&THERAPIST_SPEC, &context, &correlation_id).await?;

    let turn = parse_turn(&raw);
    session.turns.push(format!("user: {}", body.message));
    session.turns.push(format!("therapist: {}", turn.question));
    if let Some(text) = turn.key_insight {
        if turn.insight_importance >= INSIGHT_IMPORTANCE_FLOOR && !text.trim().is_empty() {
            session.insights.push(Insight { id: Uuid::new_v4(), text, deleted: false });
        }
    }

    let active: Vec<String> =
        session.active_insights().iter().map(|insight| insight.text.clone()).collect();
    if !active.is_empty() {
        let hypothesis_context = format!(
            "KEY INSIGHTS:\n{}\n\nRECENT DIALOGUE:\n{}",
            active.join("\n"),
            last_turns(&session.turns, CONTEXT_TURNS),
        );
        match state.board.ask_stage_raw(&HYPOTHESIS_SPEC, &hypothesis_context, &correlation_id).await
        {
            Ok(raw) => {
                session.hypotheses =
                    serde_json::from_str::<HypothesisBatch>(&raw).unwrap_or_default().hypotheses;
            }
            // Keep the previous hypotheses; the therapist turn itself succeeded.
            Err(error) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %error,
                    "hypothesis regeneration failed"
                );
            }
        }
    }

    let response = TherapyResponseBody {
        session_id,
        question: turn.question,
        insights: session
            .active_insights()
            .iter()
            .map(|insight| WireInsight { id: insight.id, text: insight.text.clone() })
            .collect(),
        hypotheses: session.hypotheses.clone(),
    };
    state.therapy.replace(session_id, session);
    Ok(Json(response))
}

pub async fn delete_insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(insight_id): Path<Uuid>,
) -> Result<Json<DeleteInsightResponse>, ApiError> {
    let subject = bearer_subject(&headers, &state)?;
    state
        .limiter
        .check(&subject, LimitScope::Agent)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    let session_id = state.therapy.delete_insight(insight_id, &subject)?;
    info!(
        session_id = %session_id,
        insight_id = %insight_id,
        "insight marked as deleted"
    );
    Ok(Json(DeleteInsightResponse { status: "deleted", insight_id }))
}

fn parse_turn(raw: &str) -> TherapistTurn {
    serde_json::from_str::<TherapistTurn>(raw).unwrap_or_else(|_| TherapistTurn {
        question: raw.trim().to_string(),
        key_insight: None,
        insight_importance: 0,
    })
}

fn build_context(session: &TherapySession, message: &str) -> String {
    let mut context = String::new();

    let active = session.active_insights();
    if !active.is_empty() {
        context.push_str("KEY INSIGHTS SO FAR:\n");
        for insight in active {
            context.push_str(&format!("- {}\n", insight.text));
        }
        context.push('\n');
    }

    // The user removed these on purpose. The therapist should know they
    // came up, and tread carefully instead of raising them again.
    let deleted = session.deleted_insights();
    if !deleted.is_empty() {
        context.push_str("PREVIOUSLY RAISED, DELETED BY THE USER (sensitive topics):\n");
        for insight in deleted {
            context.push_str(&format!("- {}\n", insight.text));
        }
        context.push('\n');
    }

    if !session.turns.is_empty() {
        context.push_str(&format!("DIALOGUE:\n{}\n", last_turns(&session.turns, CONTEXT_TURNS)));
    }
    context.push_str(&format!("user: {message}"));
    context
}

fn last_turns(turns: &[String], max: usize) -> String {
    let skip = turns.len().saturating_sub(max);
    turns[skip..].join("\n")
}
