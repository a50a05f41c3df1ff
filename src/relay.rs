//! Unified request facade
//!
//! The single entry point callers use: consults the cache, dispatches the
//! fallback chain on a miss, records cache and usage, and optionally wraps
//! the answer in the typing stream. Cache and tracker are injected once at
//! construction; there is no hidden global state.

use crate::cache::{ResponseCache, SWEEP_INTERVAL_SECS};
use crate::config::Config;
use crate::error::RelayError;
use crate::message::{Attachment, ConversationMessage, NormalizedResponse, Role};
use crate::persona::{Complexity, ModelTier, Persona};
use crate::providers::{self, ChatRequest, ProviderAdapter, ProviderKind};
use crate::router;
use crate::store::{KvStore, MemoryStore, SqliteStore};
use crate::stream::{typing_stream, ALL_PROVIDERS_FAILED, ATTACHMENT_NOTICE};
use crate::usage::{UsageStats, UsageTracker};
use futures_util::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Multi-provider request orchestrator.
pub struct Relay {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    /// Deployment-wide backup chain, attempted after (or instead of) the
    /// persona's assigned provider.
    fallback: Vec<ProviderKind>,
    cache: ResponseCache,
    tracker: UsageTracker,
}

impl Relay {
    pub fn new(
        adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
        fallback: Vec<ProviderKind>,
        cache: ResponseCache,
        tracker: UsageTracker,
    ) -> Self {
        Self {
            adapters,
            fallback,
            cache,
            tracker,
        }
    }

    /// Wire up the full stack from resolved configuration. A store that
    /// fails to open degrades to in-memory persistence rather than failing
    /// the process.
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn KvStore> = match SqliteStore::open(&config.db_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    "cannot open store at {}: {}; continuing without persistence",
                    config.db_path.display(),
                    e
                );
                Arc::new(MemoryStore::new())
            }
        };

        let cache = ResponseCache::new(store.clone(), config.cache_ttl_secs, config.cache_enabled);
        let tracker = UsageTracker::new(store);
        let adapters = providers::build_adapters(config);

        Self::new(adapters, config.fallback_chain.clone(), cache, tracker)
    }

    /// Persona-chat path: cache lookup, then the persona's provider followed
    /// by the deployment backups.
    pub async fn ask(
        &self,
        history: &[ConversationMessage],
        persona: &Persona,
        attachment: Option<&Attachment>,
    ) -> Result<NormalizedResponse, RelayError> {
        let question = last_user_message(history)?;

        if let Some(hit) = self.cache.get(&persona.id, question) {
            info!("cache hit for persona {}: zero cost", persona.id);
            let response = NormalizedResponse::from_cache(hit.response, persona.provider);
            self.tracker.record(&response);
            return Ok(response);
        }

        let chain = self.chain_for(Some(persona.provider));
        let req = ChatRequest {
            history,
            message: question,
            system_instruction: &persona.system_instruction,
            tier: persona.tier,
            max_output_tokens: persona.complexity.max_output_tokens(),
            attachment,
        };

        let response = router::dispatch(&chain, req).await?;

        self.cache
            .set(&persona.id, question, &response.content, response.cost);
        self.tracker.record(&response);
        Ok(response)
    }

    /// Plain-chat path: deployment chain only, no persona identity, so no
    /// response caching.
    pub async fn ask_plain(
        &self,
        history: &[ConversationMessage],
        system_instruction: &str,
        attachment: Option<&Attachment>,
    ) -> Result<NormalizedResponse, RelayError> {
        let question = last_user_message(history)?;

        let chain = self.chain_for(None);
        let req = ChatRequest {
            history,
            message: question,
            system_instruction,
            tier: ModelTier::Standard,
            max_output_tokens: Complexity::Medium.max_output_tokens(),
            attachment,
        };

        let response = router::dispatch(&chain, req).await?;
        self.tracker.record(&response);
        Ok(response)
    }

    /// Persona-chat path with typing simulation. Provider exhaustion becomes
    /// the fixed troubleshooting message; a dropped attachment prepends the
    /// degraded-mode notice. Only `InvalidRequest` surfaces as an error.
    pub async fn ask_streaming(
        &self,
        history: &[ConversationMessage],
        persona: &Persona,
        attachment: Option<&Attachment>,
    ) -> Result<impl Stream<Item = String> + Send, RelayError> {
        match self.ask(history, persona, attachment).await {
            Ok(response) => {
                let notice = response.attachment_ignored.then_some(ATTACHMENT_NOTICE);
                Ok(typing_stream(&response.content, notice))
            }
            Err(RelayError::AllProvidersExhausted { .. }) => {
                Ok(typing_stream(ALL_PROVIDERS_FAILED, None))
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of session usage for display.
    pub fn stats(&self) -> UsageStats {
        self.tracker.stats()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Background sweep of expired cache entries, every 30 minutes. Abort
    /// the returned handle to stop it.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(SWEEP_INTERVAL_SECS);
            // Wait a full period before the first pass
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                cache.sweep();
            }
        })
    }

    /// Resolve the adapter chain for one call: optional primary first, then
    /// the deployment backups, skipping duplicates.
    fn chain_for(&self, primary: Option<ProviderKind>) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut kinds: Vec<ProviderKind> = Vec::with_capacity(self.fallback.len() + 1);
        if let Some(kind) = primary {
            kinds.push(kind);
        }
        for kind in &self.fallback {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        kinds
            .into_iter()
            .filter_map(|kind| self.adapters.get(&kind).cloned())
            .collect()
    }
}

fn last_user_message(history: &[ConversationMessage]) -> Result<&str, RelayError> {
    history
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .ok_or_else(|| RelayError::InvalidRequest("no user message in history".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_user_message() {
        let history = vec![
            ConversationMessage::user("first"),
            ConversationMessage::assistant("reply"),
            ConversationMessage::user("second"),
            ConversationMessage::assistant("another reply"),
        ];
        assert_eq!(last_user_message(&history).unwrap(), "second");
    }

    #[test]
    fn test_empty_history_is_invalid() {
        assert!(matches!(
            last_user_message(&[]),
            Err(RelayError::InvalidRequest(_))
        ));

        let only_assistant = vec![ConversationMessage::assistant("hello")];
        assert!(last_user_message(&only_assistant).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_waits_a_full_interval() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(store.clone(), crate::cache::DEFAULT_TTL_SECS, true);
        let tracker = UsageTracker::new(store);
        let relay = Relay::new(HashMap::new(), Vec::new(), cache, tracker);

        let stale = chrono::Utc::now().timestamp() - crate::cache::DEFAULT_TTL_SECS * 2;
        relay
            .cache()
            .insert_with_timestamp("p1", "old question", "old answer", stale);

        let sweeper = relay.spawn_sweeper();
        tokio::task::yield_now().await;

        // No sweep at startup; the first pass comes a full interval in
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(relay.cache().len(), 1);

        tokio::time::advance(Duration::from_secs(SWEEP_INTERVAL_SECS)).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(relay.cache().len(), 0);

        sweeper.abort();
    }
}
