//! Response cache
//!
//! Keyed by (persona id, normalized question text) so a repeated identical
//! question costs nothing. Entries expire after a fixed TTL and are purged
//! lazily on access or in bulk by `sweep()`. The full map is snapshotted to
//! the durable store after every mutation and reloaded at startup.

use crate::store::KvStore;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed entry lifetime: one hour.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Sweep cadence used by the facade's background task.
pub const SWEEP_INTERVAL_SECS: u64 = 1800;

const STORE_KEY: &str = "ai_response_cache";

/// One cached exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: String,
    /// Cost at generation time, kept for savings reporting.
    pub cost: f64,
    /// Unix seconds at insertion.
    pub timestamp: i64,
}

/// Value returned on a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub response: String,
    pub cost: f64,
}

/// TTL response cache shared across requests. Cloning shares state.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    store: Arc<dyn KvStore>,
    ttl_secs: i64,
    enabled: bool,
}

impl ResponseCache {
    /// Create a cache backed by `store`, reloading any persisted entries.
    pub fn new(store: Arc<dyn KvStore>, ttl_secs: i64, enabled: bool) -> Self {
        let entries = match store.get(STORE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(map) => {
                    debug!("loaded {} cached responses", map.len());
                    map
                }
                Err(e) => {
                    warn!("discarding unreadable cache snapshot: {}", e);
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("failed to load cache from store: {}", e);
                HashMap::new()
            }
        };

        Self {
            entries: Arc::new(Mutex::new(entries)),
            store,
            ttl_secs,
            enabled,
        }
    }

    /// Cache key: persona id + normalized question. Normalization must be
    /// identical on read and write so questions differing only by case,
    /// punctuation, or spacing share one entry.
    pub fn cache_key(persona_id: &str, question: &str) -> String {
        let normalized: String = question
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '؟' | '?' | '!' | '.' | ',' | '،'))
            .collect();
        let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{}:{}", persona_id, collapsed)
    }

    /// Look up a response. A stale entry behaves as a miss and is removed.
    pub fn get(&self, persona_id: &str, question: &str) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }

        let key = Self::cache_key(persona_id, question);
        let now = Utc::now().timestamp();

        let mut entries = self.entries.lock();
        let entry = entries.get(&key)?;

        if now - entry.timestamp > self.ttl_secs {
            entries.remove(&key);
            drop(entries);
            self.persist();
            debug!("cache entry expired: {}", key);
            return None;
        }

        debug!("cache hit: {}", key);
        Some(CachedValue {
            response: entry.response.clone(),
            cost: entry.cost,
        })
    }

    /// Store a freshly generated response.
    pub fn set(&self, persona_id: &str, question: &str, response: &str, cost: f64) {
        if !self.enabled {
            return;
        }

        let key = Self::cache_key(persona_id, question);
        self.entries.lock().insert(
            key,
            CacheEntry {
                response: response.to_string(),
                cost,
                timestamp: Utc::now().timestamp(),
            },
        );
        self.persist();
    }

    /// Remove every entry older than the TTL. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now().timestamp();
        let removed = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| now - entry.timestamp <= self.ttl_secs);
            before - entries.len()
        };

        if removed > 0 {
            debug!("swept {} expired cache entries", removed);
            self.persist();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot the map to the durable store. Store failures are logged and
    /// swallowed; the cache keeps serving from memory.
    fn persist(&self) {
        let snapshot = {
            let entries = self.entries.lock();
            serde_json::to_string(&*entries)
        };
        match snapshot {
            Ok(raw) => {
                if let Err(e) = self.store.set(STORE_KEY, &raw) {
                    warn!("failed to persist cache: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize cache: {}", e),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_with_timestamp(
        &self,
        persona_id: &str,
        question: &str,
        response: &str,
        ts: i64,
    ) {
        let key = Self::cache_key(persona_id, question);
        self.entries.lock().insert(
            key,
            CacheEntry {
                response: response.to_string(),
                cost: 0.0,
                timestamp: ts,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_cache() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryStore::new()), DEFAULT_TTL_SECS, true)
    }

    #[test]
    fn test_key_normalization() {
        let base = ResponseCache::cache_key("p1", "how do i budget");

        assert_eq!(ResponseCache::cache_key("p1", "How do I budget?"), base);
        assert_eq!(ResponseCache::cache_key("p1", "  how do i budget!  "), base);
        assert_eq!(ResponseCache::cache_key("p1", "how  do\ti   budget."), base);
        // Arabic question mark and comma strip the same way
        assert_eq!(ResponseCache::cache_key("p1", "how do i budget؟"), base);
        assert_eq!(ResponseCache::cache_key("p1", "how، do i budget"), base);

        // Different persona, different entry
        assert_ne!(ResponseCache::cache_key("p2", "how do i budget"), base);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = test_cache();
        assert!(cache.get("p1", "hello").is_none());

        cache.set("p1", "Hello?", "hi there", 0.002);
        let hit = cache.get("p1", "  hello ").unwrap();
        assert_eq!(hit.response, "hi there");
        assert!((hit.cost - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ttl_boundary() {
        let cache = test_cache();
        let now = Utc::now().timestamp();

        // Just inside the TTL: still a hit
        cache.insert_with_timestamp("p1", "fresh", "ok", now - (DEFAULT_TTL_SECS - 1));
        assert!(cache.get("p1", "fresh").is_some());

        // Just past the TTL: miss, and the entry is gone
        cache.insert_with_timestamp("p1", "stale", "old", now - (DEFAULT_TTL_SECS + 1));
        assert!(cache.get("p1", "stale").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_expired() {
        let cache = test_cache();
        let now = Utc::now().timestamp();

        cache.insert_with_timestamp("p1", "a", "x", now - (DEFAULT_TTL_SECS * 2));
        cache.insert_with_timestamp("p1", "b", "y", now - (DEFAULT_TTL_SECS * 2));
        cache.insert_with_timestamp("p1", "c", "z", now);

        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("p1", "c").is_some());
    }

    #[test]
    fn test_persists_across_instances() {
        let store = Arc::new(MemoryStore::new());

        let cache = ResponseCache::new(store.clone(), DEFAULT_TTL_SECS, true);
        cache.set("p1", "question", "answer", 0.01);

        let reloaded = ResponseCache::new(store, DEFAULT_TTL_SECS, true);
        let hit = reloaded.get("p1", "question").unwrap();
        assert_eq!(hit.response, "answer");
    }

    #[test]
    fn test_disabled_cache() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new()), DEFAULT_TTL_SECS, false);
        cache.set("p1", "q", "a", 0.0);
        assert!(cache.get("p1", "q").is_none());
        assert!(cache.is_empty());
    }
}
