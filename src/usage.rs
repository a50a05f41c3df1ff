//! Usage tracking
//!
//! Accumulates call counts, spend, and cache statistics across the session
//! and persists the running totals to the durable store after every record,
//! so the numbers survive process restarts.

use crate::message::NormalizedResponse;
use crate::store::KvStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Average cost of a single uncached light-model call, used to estimate
/// what the cache saved.
const AVG_SINGLE_CALL_COST: f64 = 0.015;

const STORE_KEY: &str = "usage_stats";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct UsageState {
    total_cost: f64,
    call_count: u64,
    model_usage: BTreeMap<String, u64>,
    provider_usage: BTreeMap<String, u64>,
    cache_hits: u64,
    cache_misses: u64,
}

/// Point-in-time snapshot returned to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub total_calls: u64,
    pub total_cost: f64,
    pub average_cost: f64,
    pub model_usage: BTreeMap<String, u64>,
    pub provider_usage: BTreeMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percentage of calls served from cache, 0 when no calls yet.
    pub cache_hit_rate: f64,
    pub cost_saved_by_cache: f64,
}

/// Session usage accumulator. Cloning shares state.
#[derive(Clone)]
pub struct UsageTracker {
    state: Arc<Mutex<UsageState>>,
    store: Arc<dyn KvStore>,
}

impl UsageTracker {
    /// Create a tracker backed by `store`, restoring persisted totals.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let state = match store.get(STORE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("discarding unreadable usage snapshot: {}", e);
                UsageState::default()
            }),
            Ok(None) => UsageState::default(),
            Err(e) => {
                warn!("failed to load usage stats from store: {}", e);
                UsageState::default()
            }
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
        }
    }

    /// Record one completed request, cached or not. Called exactly once per
    /// request by the facade.
    pub fn record(&self, response: &NormalizedResponse) {
        {
            let mut state = self.state.lock();
            state.call_count += 1;

            if response.cached {
                state.cache_hits += 1;
            } else {
                state.cache_misses += 1;
                state.total_cost += response.cost;
                *state
                    .model_usage
                    .entry(response.model_used.clone())
                    .or_insert(0) += 1;
                *state
                    .provider_usage
                    .entry(response.provider.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        self.persist();
    }

    /// Snapshot current totals with derived rates.
    pub fn stats(&self) -> UsageStats {
        let state = self.state.lock();

        let cache_hit_rate = if state.call_count > 0 {
            (state.cache_hits as f64 / state.call_count as f64) * 100.0
        } else {
            0.0
        };
        let average_cost = if state.call_count > 0 {
            state.total_cost / state.call_count as f64
        } else {
            0.0
        };

        UsageStats {
            total_calls: state.call_count,
            total_cost: state.total_cost,
            average_cost,
            model_usage: state.model_usage.clone(),
            provider_usage: state.provider_usage.clone(),
            cache_hits: state.cache_hits,
            cache_misses: state.cache_misses,
            cache_hit_rate,
            cost_saved_by_cache: state.cache_hits as f64 * AVG_SINGLE_CALL_COST,
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        *self.state.lock() = UsageState::default();
        self.persist();
    }

    fn persist(&self) {
        let snapshot = {
            let state = self.state.lock();
            serde_json::to_string(&*state)
        };
        match snapshot {
            Ok(raw) => {
                if let Err(e) = self.store.set(STORE_KEY, &raw) {
                    warn!("failed to persist usage stats: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize usage stats: {}", e),
        }
    }
}
