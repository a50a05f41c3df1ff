//! Provider adapters
//!
//! One adapter per upstream LLM API. Each adapter translates the normalized
//! conversation into its provider's wire schema, maps HTTP failures onto the
//! error taxonomy, and prices the answer from the static rate table.

pub mod anthropic;
pub mod gemini;
pub mod openai_compat;

use crate::config::Config;
use crate::error::ProviderError;
use crate::message::{Attachment, ConversationMessage, NormalizedResponse};
use crate::persona::ModelTier;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai_compat::OpenAiCompatAdapter;

/// Identity of an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Anthropic,
    DeepSeek,
    Together,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Together => "together",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "together" => Ok(ProviderKind::Together),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-million-token pricing for one model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

/// Static per-model rate table (USD per million tokens). Models absent from
/// the table price at zero, which is how free-tier providers report.
static MODEL_RATES: Lazy<HashMap<&'static str, ModelRates>> = Lazy::new(|| {
    HashMap::from([
        ("claude-3-haiku-20240307", ModelRates { input: 0.25, output: 1.25 }),
        ("claude-3-5-sonnet-20240620", ModelRates { input: 3.0, output: 15.0 }),
        ("claude-3-opus-20240229", ModelRates { input: 15.0, output: 75.0 }),
        ("gemini-1.5-pro", ModelRates { input: 1.25, output: 5.0 }),
        ("deepseek-chat", ModelRates { input: 0.14, output: 0.28 }),
        ("gpt-4o-mini", ModelRates { input: 0.15, output: 0.6 }),
        ("gpt-4o", ModelRates { input: 2.5, output: 10.0 }),
    ])
});

pub fn rates_for(model: &str) -> ModelRates {
    MODEL_RATES.get(model).copied().unwrap_or_default()
}

/// Price a call from reported token counts. Zero usage metadata yields 0.
pub fn compute_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let rates = rates_for(model);
    (input_tokens as f64 / 1_000_000.0) * rates.input
        + (output_tokens as f64 / 1_000_000.0) * rates.output
}

/// Normalized request handed to every adapter.
#[derive(Clone, Copy)]
pub struct ChatRequest<'a> {
    pub history: &'a [ConversationMessage],
    pub message: &'a str,
    pub system_instruction: &'a str,
    pub tier: ModelTier,
    pub max_output_tokens: u32,
    pub attachment: Option<&'a Attachment>,
}

/// Translation seam between the normalized model and one upstream API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether binary attachments can be forwarded inline. Adapters that
    /// return false ignore the payload; the router flags the response so
    /// the streaming layer can surface a notice.
    fn supports_attachments(&self) -> bool {
        false
    }

    async fn send(&self, req: ChatRequest<'_>) -> Result<NormalizedResponse, ProviderError>;
}

/// Map a non-2xx upstream status onto the error taxonomy.
pub(crate) fn classify_status(
    provider: &'static str,
    status: u16,
    message: String,
) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth { provider, message },
        429 => ProviderError::RateLimit { provider, message },
        _ => ProviderError::Upstream {
            provider,
            status,
            message,
        },
    }
}

/// Construct every adapter from the resolved configuration. Adapters with a
/// missing credential are still built; they surface `Auth` at send time so
/// the chain can advance past them.
pub fn build_adapters(config: &Config) -> HashMap<ProviderKind, Arc<dyn ProviderAdapter>> {
    let mut adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>> = HashMap::new();

    adapters.insert(
        ProviderKind::Gemini,
        Arc::new(GeminiAdapter::new(config.gemini_api_key.clone())),
    );
    adapters.insert(
        ProviderKind::Anthropic,
        Arc::new(AnthropicAdapter::new(config.anthropic_api_key.clone())),
    );
    adapters.insert(
        ProviderKind::DeepSeek,
        Arc::new(OpenAiCompatAdapter::deepseek(
            config.deepseek_api_key.clone(),
            config.deepseek_api_url.clone(),
        )),
    );
    adapters.insert(
        ProviderKind::Together,
        Arc::new(OpenAiCompatAdapter::together(
            config.together_api_key.clone(),
            config.together_model.clone(),
        )),
    );
    adapters.insert(
        ProviderKind::OpenAi,
        Arc::new(OpenAiCompatAdapter::openai(config.openai_api_key.clone())),
    );

    adapters
}
