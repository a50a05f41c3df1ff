//! Error taxonomy
//!
//! Provider-level failures (`ProviderError`) are absorbed by the fallback
//! router; only `InvalidRequest` and `AllProvidersExhausted` are meant to
//! reach the caller.

use thiserror::Error;

/// A single provider attempt failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Invalid or missing credential. Advances the chain, but flagged in
    /// logs as a configuration problem rather than a transient failure.
    #[error("{provider}: authentication failed: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },

    /// 429 from upstream. Triggers fallback.
    #[error("{provider}: rate limited: {message}")]
    RateLimit {
        provider: &'static str,
        message: String,
    },

    /// 5xx, unexpected 4xx, or a payload we could not parse.
    #[error("{provider}: upstream error ({status}): {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("{provider}: network error: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Auth { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Network { provider, .. } => provider,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Terminal outcome of a relayed request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed caller input. No provider contacted, no state mutated.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every provider in the chain failed. The facade surfaces this as a
    /// fixed troubleshooting message, never as a raw error.
    #[error("all {attempted} provider(s) in the chain failed")]
    AllProvidersExhausted { attempted: usize },
}
