//! Majlis - multi-provider AI request orchestration
//!
//! Routes chat messages to one of several LLM providers, selecting a
//! provider and model per expert persona, caching responses, falling back
//! across providers on failure, and tracking cost and usage.
//!
//! # Architecture
//!
//! ```text
//! caller ──► Relay (facade) ──► ResponseCache ── hit ──► cached answer
//!               │                    │miss
//!               │                    ▼
//!               │              Fallback Router ──► Gemini / Anthropic /
//!               │                    │             DeepSeek / Together /
//!               │                    │             OpenAI
//!               │                    ▼
//!               ├── UsageTracker (cost + cache stats, persisted)
//!               └── typing_stream (word fragments, jittered delay)
//! ```
//!
//! Cache entries and usage totals persist across restarts through a small
//! SQLite key-value store; both degrade to in-memory on storage failure
//! rather than failing a request.

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod persona;
pub mod providers;
pub mod relay;
pub mod router;
pub mod store;
pub mod stream;
pub mod usage;

pub use cache::{CachedValue, ResponseCache};
pub use config::Config;
pub use error::{ProviderError, RelayError};
pub use message::{Attachment, ConversationMessage, NormalizedResponse, Role};
pub use persona::{Complexity, ModelTier, Persona, PersonaRegistry};
pub use providers::{ChatRequest, ProviderAdapter, ProviderKind};
pub use relay::Relay;
pub use store::{KvStore, MemoryStore, SqliteStore};
pub use stream::{typing_stream, ALL_PROVIDERS_FAILED, ATTACHMENT_NOTICE};
pub use usage::{UsageStats, UsageTracker};
