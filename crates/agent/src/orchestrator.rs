//! Board Orchestrator: fans a compressed user request out to the active
//! personas, isolates per-agent failures, and synthesizes a summary.
//!
//! Agents are independent by contract, so the fan-out runs concurrently
//! under a semaphore cap; replies are re-assembled in the requester's order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use boardroom_core::domain::{AgentReply, CompressedRequest, Verdict};
use boardroom_core::errors::{BoardError, UpstreamError};
use boardroom_core::roles::{AgentRole, AgentSpec, SUMMARY_SPEC};

use crate::compressor::{compress_history, Compressor};
use crate::expander::Expander;
use crate::transport::ChatBackend;

const HISTORY_EXCERPT_TURNS: usize = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
    #[default]
    Initial,
    Refresh,
}

#[derive(Clone, Debug)]
pub struct BoardRequest {
    pub user_id: String,
    pub message: String,
    pub active: Vec<AgentRole>,
    pub history: Vec<String>,
    pub mode: BoardMode,
    pub debug: bool,
    pub correlation_id: String,
}

/// One agent whose upstream call failed; reported distinctly from the
/// replies that succeeded. Carries only user-safe text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentFailure {
    pub agent: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BoardOutcome {
    pub replies: Vec<AgentReply>,
    pub summary: Option<AgentReply>,
    pub failures: Vec<AgentFailure>,
    /// Populated only in debug mode; additive to the normal reply.
    pub compressed: Option<CompressedRequest>,
}

pub struct Board {
    backend: Arc<dyn ChatBackend>,
    compressor: Arc<Compressor>,
    expander: Expander,
    concurrency: usize,
}

impl Board {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        compressor: Arc<Compressor>,
        concurrency: usize,
    ) -> Self {
        let expander = Expander::new(Arc::clone(&backend));
        Self { backend, compressor, expander, concurrency }
    }

    pub async fn run(&self, request: BoardRequest) -> Result<BoardOutcome, BoardError> {
        match request.mode {
            BoardMode::Initial => self.run_initial(request).await,
            BoardMode::Refresh => self.run_refresh(request).await,
        }
    }

    async fn run_initial(&self, request: BoardRequest) -> Result<BoardOutcome, BoardError> {
        if request.active.is_empty() {
            return Err(BoardError::NoAgents);
        }

        let compressed = self
            .compressor
            .compress(&request.message, &request.user_id, &request.correlation_id)
            .await?;
        let agent_input = build_agent_input(&compressed, &request.history);

        info!(
            correlation_id = %request.correlation_id,
            agents = ?request.active.iter().map(AgentRole::key).collect::<Vec<_>>(),
            intent = %compressed.intent,
            "dispatching board fan-out"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        for (index, role) in request.active.iter().copied().enumerate() {
            let backend = Arc::clone(&self.backend);
            let expander = self.expander.clone();
            let semaphore = Arc::clone(&semaphore);
            let input = agent_input.clone();
            let correlation_id = request.correlation_id.clone();
            let debug = request.debug;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let result =
                    ask_and_expand(&*backend, &expander, role.spec(), &input, &correlation_id, debug)
                        .await;
                (index, role, result)
            });
        }

        let mut slots: Vec<Option<(AgentReply, Verdict)>> = vec![None; request.active.len()];
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, role, result) = joined.expect("board task panicked");
            match result {
                Ok(reply_and_verdict) => slots[index] = Some(reply_and_verdict),
                Err(error) => {
                    warn!(
                        correlation_id = %request.correlation_id,
                        agent = role.key(),
                        error = %error,
                        "board agent failed"
                    );
                    failures.push(AgentFailure {
                        agent: role.key().to_string(),
                        error: error.user_message().to_string(),
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.agent.cmp(&b.agent));

        let mut replies = Vec::new();
        let mut verdicts = Vec::new();
        for (role, slot) in request.active.iter().zip(slots) {
            if let Some((reply, verdict)) = slot {
                replies.push(reply);
                verdicts.push((*role, verdict));
            }
        }

        let summary = if verdicts.is_empty() {
            None
        } else {
            let summary_input = build_summary_input(&compressed, &verdicts);
            match self
                .call_agent(&SUMMARY_SPEC, &summary_input, &request.correlation_id, request.debug)
                .await
            {
                Ok(reply) => Some(reply),
                Err(error) => {
                    warn!(
                        correlation_id = %request.correlation_id,
                        error = %error,
                        "summary synthesis failed"
                    );
                    failures.push(AgentFailure {
                        agent: SUMMARY_SPEC.key.to_string(),
                        error: error.user_message().to_string(),
                    });
                    None
                }
            }
        };

        info!(
            correlation_id = %request.correlation_id,
            replies = replies.len(),
            failures = failures.len(),
            "board fan-out complete"
        );

        Ok(BoardOutcome {
            replies,
            summary,
            failures,
            compressed: request.debug.then_some(compressed),
        })
    }

    /// Recompute only the synthesized summary from accumulated history,
    /// without repeating the per-agent calls.
    async fn run_refresh(&self, request: BoardRequest) -> Result<BoardOutcome, BoardError> {
        let reply = self
            .summarize_history(&request.history, request.debug, &request.correlation_id)
            .await?;
        Ok(BoardOutcome { summary: Some(reply), ..BoardOutcome::default() })
    }

    /// Summary recompute shared by `mode=refresh` and the summary endpoint.
    pub async fn summarize_history(
        &self,
        history: &[String],
        debug: bool,
        correlation_id: &str,
    ) -> Result<AgentReply, BoardError> {
        let excerpt = compress_history(history, HISTORY_EXCERPT_TURNS);
        if excerpt.is_empty() {
            return Err(BoardError::EmptyHistory);
        }

        let input = format!(
            "Discussion history excerpt (last {HISTORY_EXCERPT_TURNS} turns):\n\n{excerpt}\n\n\
             Recompute the board summary from this history."
        );
        Ok(self.call_agent(&SUMMARY_SPEC, &input, correlation_id, debug).await?)
    }

    /// Single-agent ask outside a full board round.
    pub async fn ask_single(
        &self,
        role: AgentRole,
        message: Option<&str>,
        history: &[String],
        user_id: &str,
        debug: bool,
        correlation_id: &str,
    ) -> Result<(AgentReply, Option<CompressedRequest>), BoardError> {
        let mut parts = Vec::new();
        let mut compressed = None;

        if let Some(message) = message {
            let request = self.compressor.compress(message, user_id, correlation_id).await?;
            parts.push(format!(
                "COMPRESSED USER REQUEST (JSON):\n{}",
                serde_json::to_string_pretty(&request).unwrap_or_default()
            ));
            compressed = Some(request);
        }

        let excerpt = compress_history(history, HISTORY_EXCERPT_TURNS);
        if !excerpt.is_empty() {
            parts.push(format!(
                "HISTORY EXCERPT (last {HISTORY_EXCERPT_TURNS} turns):\n{excerpt}"
            ));
        }
        if parts.is_empty() {
            parts.push(
                "Analyze the situation and contribute one concrete idea or concern from your role."
                    .to_string(),
            );
        }

        let input = parts.join("\n\n");
        let reply = self.call_agent(role.spec(), &input, correlation_id, debug).await?;
        Ok((reply, if debug { compressed } else { None }))
    }

    /// Raw single call for stages whose output shape is caller-defined
    /// (therapist and hypothesis turns).
    pub async fn ask_stage_raw(
        &self,
        spec: &AgentSpec,
        content: &str,
        correlation_id: &str,
    ) -> Result<String, UpstreamError> {
        let (raw, _metrics) = self.backend.ask(spec, content, correlation_id).await?;
        Ok(raw)
    }

    async fn call_agent(
        &self,
        spec: &'static AgentSpec,
        input: &str,
        correlation_id: &str,
        debug: bool,
    ) -> Result<AgentReply, UpstreamError> {
        let (reply, _verdict) =
            ask_and_expand(&*self.backend, &self.expander, spec, input, correlation_id, debug)
                .await?;
        Ok(reply)
    }
}

/// Primary call plus expansion for one persona. Debug fields are additive:
/// the expanded text is always present.
async fn ask_and_expand(
    backend: &dyn ChatBackend,
    expander: &Expander,
    spec: &'static AgentSpec,
    input: &str,
    correlation_id: &str,
    debug: bool,
) -> Result<(AgentReply, Verdict), UpstreamError> {
    let (raw, primary_metrics) = backend.ask(spec, input, correlation_id).await?;
    let verdict = Verdict::from_raw(&raw);

    let (text, expander_metrics) = expander.expand(spec.title, &verdict, correlation_id).await?;

    let reply = AgentReply {
        agent: spec.key.to_string(),
        title: spec.title.to_string(),
        text,
        verdict: debug.then(|| verdict.clone()),
        usage: debug.then(|| boardroom_core::domain::CallMetrics {
            usage: primary_metrics.usage.combined(expander_metrics.usage),
            finish_reason: primary_metrics.finish_reason.clone(),
        }),
    };
    Ok((reply, verdict))
}

fn build_agent_input(compressed: &CompressedRequest, history: &[String]) -> String {
    let mut parts = vec![format!(
        "COMPRESSED USER REQUEST (JSON):\n{}",
        serde_json::to_string_pretty(compressed).unwrap_or_default()
    )];

    let excerpt = compress_history(history, HISTORY_EXCERPT_TURNS);
    if !excerpt.is_empty() {
        parts.push(format!("HISTORY EXCERPT (last {HISTORY_EXCERPT_TURNS} turns):\n{excerpt}"));
    }

    parts.join("\n\n")
}

fn build_summary_input(
    compressed: &CompressedRequest,
    verdicts: &[(AgentRole, Verdict)],
) -> String {
    let mut parts = vec![
        format!(
            "COMPRESSED USER REQUEST (JSON):\n{}",
            serde_json::to_string_pretty(compressed).unwrap_or_default()
        ),
        "BOARD VERDICTS (JSON):".to_string(),
    ];
    for (role, verdict) in verdicts {
        parts.push(format!(
            "{}:\n{}",
            role.key(),
            serde_json::to_string_pretty(verdict).unwrap_or_default()
        ));
    }
    parts.join("\n\n")
}
