//! Request/History Compressor. Free-text user messages are distilled into
//! `CompressedRequest` through one provider call; results are cached
//! content-addressed by `(user_id, sha256(message) prefix)` so identical
//! input never recomputes. The cache is bounded: when it outgrows
//! `max_items` the oldest entries are dropped down to `trim_to`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use boardroom_core::config::CacheConfig;
use boardroom_core::domain::{truncate_chars, CompressedRequest};
use boardroom_core::errors::UpstreamError;
use boardroom_core::roles::COMPRESSOR_SPEC;

use crate::transport::ChatBackend;

/// Bounded insertion-ordered cache. Writes are last-writer-wins, which is
/// sound because entries are idempotent for identical keys.
struct ContentCache {
    entries: HashMap<String, CompressedRequest>,
    order: VecDeque<String>,
    max_items: usize,
    trim_to: usize,
}

impl ContentCache {
    fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_items: config.max_items,
            trim_to: config.trim_to,
        }
    }

    fn get(&self, key: &str) -> Option<CompressedRequest> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: CompressedRequest) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > self.max_items {
            while self.entries.len() > self.trim_to {
                let Some(oldest) = self.order.pop_front() else { break };
                self.entries.remove(&oldest);
            }
            info!(remaining = self.entries.len(), "compressor cache trimmed");
        }
    }
}

pub struct Compressor {
    backend: Arc<dyn ChatBackend>,
    cache: RwLock<ContentCache>,
}

impl Compressor {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &CacheConfig) -> Self {
        Self { backend, cache: RwLock::new(ContentCache::new(config)) }
    }

    /// Compress a user message, short-circuiting through the cache. Output is
    /// idempotent for identical `(user_id, message)` pairs within the cache's
    /// validity window.
    pub async fn compress(
        &self,
        user_msg: &str,
        user_id: &str,
        correlation_id: &str,
    ) -> Result<CompressedRequest, UpstreamError> {
        let key = cache_key(user_id, user_msg);
        if let Some(cached) = self.cache.read().expect("compressor cache poisoned").get(&key) {
            info!(
                correlation_id = %correlation_id,
                user = user_id,
                "compressor cache hit"
            );
            return Ok(cached);
        }

        debug!(
            correlation_id = %correlation_id,
            user = user_id,
            message_prefix = %truncate_chars(user_msg, 50),
            "compressing new message"
        );
        let (raw, _metrics) =
            self.backend.ask(&COMPRESSOR_SPEC, user_msg, correlation_id).await?;

        let compressed = match serde_json::from_str::<CompressedRequest>(&raw) {
            Ok(parsed) if parsed.is_complete() => parsed,
            Ok(_) => {
                warn!(correlation_id = %correlation_id, "compressor returned incomplete JSON");
                CompressedRequest::fallback(user_msg)
            }
            Err(_) => {
                warn!(correlation_id = %correlation_id, "compressor returned non-JSON output");
                CompressedRequest::fallback(user_msg)
            }
        };

        self.cache
            .write()
            .expect("compressor cache poisoned")
            .insert(key, compressed.clone());
        Ok(compressed)
    }
}

/// Reduce prior conversation turns to the last `max_items`, joined for
/// inclusion in an agent context. Pure and cheap; no caching needed.
pub fn compress_history(history: &[String], max_items: usize) -> String {
    if history.is_empty() {
        return String::new();
    }
    let skip = history.len().saturating_sub(max_items);
    history[skip..].join("\n")
}

fn cache_key(user_id: &str, message: &str) -> String {
    let digest = Sha256::digest(message.as_bytes());
    // 8 bytes of the digest is plenty for a per-user dedup key.
    let mut hash_prefix = String::with_capacity(16);
    for byte in &digest[..8] {
        hash_prefix.push_str(&format!("{byte:02x}"));
    }
    format!("{user_id}:{hash_prefix}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use boardroom_core::domain::CallMetrics;
    use boardroom_core::roles::AgentSpec;

    use super::*;

    struct CountingBackend {
        calls: AtomicUsize,
        reply: String,
    }

    impl CountingBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), reply: reply.to_string() })
        }
    }

    #[async_trait]
    impl ChatBackend for CountingBackend {
        async fn ask(
            &self,
            _spec: &AgentSpec,
            _content: &str,
            _correlation_id: &str,
        ) -> Result<(String, CallMetrics), UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((self.reply.clone(), CallMetrics::default()))
        }
    }

    fn cache_config() -> CacheConfig {
        CacheConfig { max_items: 1000, trim_to: 500 }
    }

    #[tokio::test]
    async fn identical_input_recomputes_only_once() {
        let backend = CountingBackend::new(r#"{"intent":"plan","domain":"finance"}"#);
        let compressor =
            Compressor::new(Arc::clone(&backend) as Arc<dyn ChatBackend>, &cache_config());

        let first = compressor.compress("message", "u1", "corr").await.expect("first");
        let second = compressor.compress("message", "u1", "corr").await.expect("second");

        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_is_scoped_per_user_and_message() {
        let backend = CountingBackend::new(r#"{"intent":"plan","domain":"finance"}"#);
        let compressor =
            Compressor::new(Arc::clone(&backend) as Arc<dyn ChatBackend>, &cache_config());

        compressor.compress("message", "u1", "corr").await.expect("u1");
        compressor.compress("message", "u2", "corr").await.expect("u2");
        compressor.compress("other message", "u1", "corr").await.expect("u1 other");

        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_json_output_falls_back_and_still_caches() {
        let backend = CountingBackend::new("sorry, I cannot produce JSON today");
        let compressor =
            Compressor::new(Arc::clone(&backend) as Arc<dyn ChatBackend>, &cache_config());

        let compressed = compressor.compress("expand to LATAM?", "u1", "corr").await.expect("ok");
        assert_eq!(compressed.intent, "other");
        assert_eq!(compressed.domain, "strategy");

        compressor.compress("expand to LATAM?", "u1", "corr").await.expect("cached");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_trims_oldest_entries_when_full() {
        let backend = CountingBackend::new(r#"{"intent":"plan","domain":"finance"}"#);
        let compressor = Compressor::new(
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            &CacheConfig { max_items: 4, trim_to: 2 },
        );

        for i in 0..5 {
            compressor.compress(&format!("message {i}"), "u1", "corr").await.expect("ok");
        }
        // message 0..=2 were evicted; message 0 recomputes.
        compressor.compress("message 0", "u1", "corr").await.expect("ok");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);

        // message 4 survived the trim.
        compressor.compress("message 4", "u1", "corr").await.expect("ok");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn history_keeps_only_the_most_recent_turns() {
        let history: Vec<String> = (1..=7).map(|i| format!("turn {i}")).collect();
        let compressed = compress_history(&history, 5);
        assert_eq!(compressed, "turn 3\nturn 4\nturn 5\nturn 6\nturn 7");
        assert_eq!(compress_history(&[], 5), "");
    }
}
