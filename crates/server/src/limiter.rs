//! Sliding-window rate limiting per authenticated user. Each endpoint family
//! has its own budget; timestamps outside the window are discarded on every
//! check, so idle entries decay naturally.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use boardroom_core::config::LimitsConfig;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimitScope {
    Board,
    Agent,
    Summary,
}

#[derive(Debug, Default)]
struct WindowEntry {
    requests: Vec<Instant>,
}

impl WindowEntry {
    /// Drop timestamps outside the window, then admit or reject. On
    /// rejection returns the seconds until the oldest in-window request
    /// leaves the window.
    fn admit(&mut self, limit: u32) -> Result<(), u64> {
        let now = Instant::now();
        // `Instant` arithmetic panics on underflow; within the first minute
        // of a fresh clock every recorded request is still in the window.
        if let Some(window_start) = now.checked_sub(WINDOW) {
            self.requests.retain(|&t| t > window_start);
        }

        if self.requests.len() >= limit as usize {
            let oldest = self.requests[0];
            let retry_after = WINDOW.saturating_sub(now - oldest).as_secs().max(1);
            return Err(retry_after);
        }
        self.requests.push(now);
        Ok(())
    }
}

pub struct ApiLimiter {
    entries: Mutex<HashMap<(String, LimitScope), WindowEntry>>,
    board_per_minute: u32,
    agent_per_minute: u32,
    summary_per_minute: u32,
}

impl ApiLimiter {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            board_per_minute: limits.board_per_minute,
            agent_per_minute: limits.agent_per_minute,
            summary_per_minute: limits.summary_per_minute,
        }
    }

    /// Admit one request for `user` in `scope`, or return the retry-after
    /// delay in seconds.
    pub fn check(&self, user: &str, scope: LimitScope) -> Result<(), u64> {
        let limit = match scope {
            LimitScope::Board => self.board_per_minute,
            LimitScope::Agent => self.agent_per_minute,
            LimitScope::Summary => self.summary_per_minute,
        };

        let mut entries = self.entries.lock().expect("limiter lock poisoned");
        entries.entry((user.to_string(), scope)).or_default().admit(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ApiLimiter {
        ApiLimiter::new(&LimitsConfig {
            board_per_minute: 2,
            agent_per_minute: 3,
            summary_per_minute: 1,
            board_concurrency: 3,
        })
    }

    #[test]
    fn requests_over_the_budget_are_rejected_with_retry_after() {
        let limiter = limiter();
        assert!(limiter.check("u1", LimitScope::Board).is_ok());
        assert!(limiter.check("u1", LimitScope::Board).is_ok());

        let retry_after = limiter.check("u1", LimitScope::Board).expect_err("third must fail");
        assert!((1..=60).contains(&retry_after));
    }

    #[test]
    fn scopes_have_independent_budgets() {
        let limiter = limiter();
        assert!(limiter.check("u1", LimitScope::Summary).is_ok());
        assert!(limiter.check("u1", LimitScope::Summary).is_err());

        // Board budget for the same user is untouched.
        assert!(limiter.check("u1", LimitScope::Board).is_ok());
    }

    #[test]
    fn users_do_not_share_budgets() {
        let limiter = limiter();
        assert!(limiter.check("u1", LimitScope::Summary).is_ok());
        assert!(limiter.check("u2", LimitScope::Summary).is_ok());
    }
}
