//! Anthropic Claude adapter
//!
//! Messages API client. The persona instruction goes in the dedicated
//! `system` field; image attachments are forwarded as base64 content blocks.

use crate::error::ProviderError;
use crate::message::{Attachment, NormalizedResponse, Role};
use crate::persona::ModelTier;
use crate::providers::{classify_status, compute_cost, ChatRequest, ProviderAdapter, ProviderKind};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: Client,
    api_key: Option<String>,
}

/// Message content: plain text, or blocks when an image rides along.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    r#type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: &'static str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    r#type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn model_id(tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Light => "claude-3-haiku-20240307",
            ModelTier::Standard => "claude-3-5-sonnet-20240620",
            ModelTier::Heavy => "claude-3-opus-20240229",
        }
    }

    fn content_for(text: &str, attachment: Option<&Attachment>) -> MessageContent {
        match attachment {
            Some(att) if att.mime_type.starts_with("image/") => MessageContent::Blocks(vec![
                ContentBlock::Text {
                    text: text.to_string(),
                },
                ContentBlock::Image {
                    source: ImageSource {
                        r#type: "base64",
                        media_type: att.mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(&att.data),
                    },
                },
            ]),
            // Non-image payloads are not accepted by the Messages API
            _ => MessageContent::Text(text.to_string()),
        }
    }

    fn build_messages(req: &ChatRequest<'_>) -> Vec<Message> {
        let mut messages: Vec<Message> = req
            .history
            .iter()
            .map(|msg| Message {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: Self::content_for(&msg.content, msg.attachment.as_ref()),
            })
            .collect();

        messages.push(Message {
            role: "user",
            content: Self::content_for(req.message, req.attachment),
        });

        messages
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn supports_attachments(&self) -> bool {
        true
    }

    async fn send(&self, req: ChatRequest<'_>) -> Result<NormalizedResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::Auth {
            provider: "anthropic",
            message: "ANTHROPIC_API_KEY not set".to_string(),
        })?;

        let model = Self::model_id(req.tier);
        let body = MessageRequest {
            model,
            max_tokens: req.max_output_tokens,
            system: req.system_instruction.to_string(),
            messages: Self::build_messages(&req),
        };

        debug!("calling anthropic: model={}, turns={}", model, body.messages.len());

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: "anthropic",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("anthropic", status.as_u16(), text));
        }

        let parsed: MessageResponse =
            response.json().await.map_err(|e| ProviderError::Upstream {
                provider: "anthropic",
                status: status.as_u16(),
                message: format!("malformed payload: {}", e),
            })?;

        let content = parsed
            .content
            .into_iter()
            .filter_map(|b| if b.r#type == "text" { b.text } else { None })
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(ProviderError::Upstream {
                provider: "anthropic",
                status: status.as_u16(),
                message: "response contained no text blocks".to_string(),
            });
        }

        let input_tokens = parsed.usage.input_tokens;
        let output_tokens = parsed.usage.output_tokens;
        let cost = compute_cost(model, input_tokens, output_tokens);

        info!(
            "anthropic response: model={}, in={}, out={}, cost=${:.5}",
            model, input_tokens, output_tokens, cost
        );

        Ok(NormalizedResponse {
            content,
            provider: ProviderKind::Anthropic,
            model_used: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
            cached: false,
            attachment_ignored: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ConversationMessage;

    #[test]
    fn test_role_translation() {
        let history = vec![
            ConversationMessage::user("question"),
            ConversationMessage::assistant("answer"),
        ];
        let req = ChatRequest {
            history: &history,
            message: "follow-up",
            system_instruction: "sys",
            tier: ModelTier::Light,
            max_output_tokens: 800,
            attachment: None,
        };

        let messages = AnthropicAdapter::build_messages(&req);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
    }

    #[test]
    fn test_image_attachment_becomes_blocks() {
        let attachment = Attachment {
            name: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8],
        };
        let content = AnthropicAdapter::content_for("look at this", Some(&attachment));
        match content {
            MessageContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            MessageContent::Text(_) => panic!("expected block content"),
        }
    }

    #[test]
    fn test_non_image_attachment_stays_text() {
        let attachment = Attachment {
            name: "doc.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            data: vec![1],
        };
        let content = AnthropicAdapter::content_for("summarize", Some(&attachment));
        assert!(matches!(content, MessageContent::Text(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let adapter = AnthropicAdapter::new(None);
        let req = ChatRequest {
            history: &[],
            message: "hi",
            system_instruction: "sys",
            tier: ModelTier::Standard,
            max_output_tokens: 1200,
            attachment: None,
        };
        assert!(adapter.send(req).await.unwrap_err().is_auth());
    }
}
