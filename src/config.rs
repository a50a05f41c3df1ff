//! Configuration management
//!
//! All environment reads happen here, once, at startup; adapters and stores
//! receive resolved values. Missing provider credentials are not an error at
//! load time: the affected adapter surfaces `Auth` when the chain reaches it.

use crate::cache::DEFAULT_TTL_SECS;
use crate::providers::openai_compat::DEEPSEEK_API_URL;
use crate::providers::ProviderKind;
use anyhow::Result;
use std::path::PathBuf;

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credentials (optional, per provider)
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub together_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    /// DeepSeek endpoint (overridable for gateway deployments)
    pub deepseek_api_url: String,

    /// Together model id override
    pub together_model: Option<String>,

    /// SQLite path for cache + usage persistence
    pub db_path: PathBuf,

    /// Enable response caching
    pub cache_enabled: bool,

    /// Cache TTL in seconds
    pub cache_ttl_secs: i64,

    /// Deployment-wide fallback chain, attempted in order
    pub fallback_chain: Vec<ProviderKind>,

    /// Optional TOML file of personas; builtin panel when absent
    pub persona_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("MAJLIS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("majlis.db"));

        let cache_enabled = std::env::var("MAJLIS_CACHE_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let cache_ttl_secs = std::env::var("MAJLIS_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);

        let fallback_chain = match std::env::var("MAJLIS_FALLBACK_CHAIN") {
            Ok(raw) => Self::parse_chain(&raw)?,
            Err(_) => vec![
                ProviderKind::Gemini,
                ProviderKind::DeepSeek,
                ProviderKind::Together,
            ],
        };

        Ok(Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            deepseek_api_key: std::env::var("DEEPSEEK_API_KEY").ok(),
            together_api_key: std::env::var("TOGETHER_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            deepseek_api_url: std::env::var("DEEPSEEK_API_URL")
                .unwrap_or_else(|_| DEEPSEEK_API_URL.to_string()),
            together_model: std::env::var("TOGETHER_MODEL_ID").ok(),
            db_path,
            cache_enabled,
            cache_ttl_secs,
            fallback_chain,
            persona_file: std::env::var("MAJLIS_PERSONA_FILE").ok().map(PathBuf::from),
        })
    }

    fn parse_chain(raw: &str) -> Result<Vec<ProviderKind>> {
        raw.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<ProviderKind>()
                    .map_err(|e| anyhow::anyhow!("MAJLIS_FALLBACK_CHAIN: {}", e))
            })
            .collect()
    }
}
