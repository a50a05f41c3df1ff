//! Conversation data model
//!
//! Normalized message and response types shared by all provider adapters.

use crate::providers::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Binary payload attached to a user turn (image, PDF, ...).
///
/// The core carries raw bytes; adapters base64-encode at the wire.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One turn in the dialogue history. Ordering is insertion order and is
/// the history sent upstream; the core never mutates the caller's slice.
#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment: None,
            timestamp: Utc::now(),
        }
    }
}

/// Provider-agnostic result of one completed request.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub content: String,
    pub provider: ProviderKind,
    pub model_used: String,
    /// 0 when the provider reports no usage metadata.
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub cached: bool,
    /// Set when an attachment was supplied but the provider that actually
    /// answered cannot accept one; the streaming layer surfaces a notice.
    pub attachment_ignored: bool,
}

impl NormalizedResponse {
    /// Build the zero-cost response for a cache hit.
    pub fn from_cache(content: String, provider: ProviderKind) -> Self {
        Self {
            content,
            provider,
            model_used: "cached".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            cached: true,
            attachment_ignored: false,
        }
    }
}
