//! OpenAI-compatible chat-completions adapter
//!
//! DeepSeek, Together AI, and OpenAI all speak the same chat-completions
//! wire format, so one client covers the three; each instance differs only
//! in endpoint, credential, and model lineup. None of these endpoints take
//! binary attachments here, so `supports_attachments` stays false and the
//! router flags the degraded mode.

use crate::error::ProviderError;
use crate::message::{NormalizedResponse, Role};
use crate::persona::ModelTier;
use crate::providers::{classify_status, compute_cost, ChatRequest, ProviderAdapter, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";
const TOGETHER_API_URL: &str = "https://api.together.xyz/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_TOGETHER_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo";

pub struct OpenAiCompatAdapter {
    client: Client,
    kind: ProviderKind,
    url: String,
    api_key: Option<String>,
    /// Model ids for Light / Standard / Heavy.
    models: [String; 3],
    key_env_hint: &'static str,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiCompatAdapter {
    pub fn deepseek(api_key: Option<String>, api_url: String) -> Self {
        Self {
            client: Client::new(),
            kind: ProviderKind::DeepSeek,
            url: api_url,
            api_key,
            models: [
                "deepseek-chat".to_string(),
                "deepseek-chat".to_string(),
                "deepseek-reasoner".to_string(),
            ],
            key_env_hint: "DEEPSEEK_API_KEY",
        }
    }

    pub fn together(api_key: Option<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_TOGETHER_MODEL.to_string());
        Self {
            client: Client::new(),
            kind: ProviderKind::Together,
            url: TOGETHER_API_URL.to_string(),
            api_key,
            models: [model.clone(), model.clone(), model],
            key_env_hint: "TOGETHER_API_KEY",
        }
    }

    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            kind: ProviderKind::OpenAi,
            url: OPENAI_API_URL.to_string(),
            api_key,
            models: [
                "gpt-4o-mini".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-4o".to_string(),
            ],
            key_env_hint: "OPENAI_API_KEY",
        }
    }

    fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Light => &self.models[0],
            ModelTier::Standard => &self.models[1],
            ModelTier::Heavy => &self.models[2],
        }
    }

    fn build_messages(req: &ChatRequest<'_>) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(req.history.len() + 2);

        messages.push(WireMessage {
            role: "system",
            content: req.system_instruction.to_string(),
        });

        for msg in req.history {
            messages.push(WireMessage {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: msg.content.clone(),
            });
        }

        messages.push(WireMessage {
            role: "user",
            content: req.message.to_string(),
        });

        messages
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, req: ChatRequest<'_>) -> Result<NormalizedResponse, ProviderError> {
        let provider = self.kind.as_str();
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::Auth {
            provider: self.kind.as_str(),
            message: format!("{} not set", self.key_env_hint),
        })?;

        let model = self.model_id(req.tier);
        let body = CompletionRequest {
            model,
            messages: Self::build_messages(&req),
            temperature: 0.7,
            max_tokens: req.max_output_tokens,
            top_p: 0.95,
            stream: false,
        };

        debug!("calling {}: model={}, turns={}", provider, model, body.messages.len());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: self.kind.as_str(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(self.kind.as_str(), status.as_u16(), text));
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| ProviderError::Upstream {
                provider: self.kind.as_str(),
                status: status.as_u16(),
                message: format!("malformed payload: {}", e),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::Upstream {
                provider: self.kind.as_str(),
                status: status.as_u16(),
                message: "response contained no choices".to_string(),
            });
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        let cost = compute_cost(model, input_tokens, output_tokens);

        info!(
            "{} response: model={}, in={}, out={}, cost=${:.5}",
            provider, model, input_tokens, output_tokens, cost
        );

        Ok(NormalizedResponse {
            content,
            provider: self.kind,
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
    fn test_system_message_leads() {
        let history = vec![
            ConversationMessage::user("q1"),
            ConversationMessage::assistant("a1"),
        ];
        let req = ChatRequest {
            history: &history,
            message: "q2",
            system_instruction: "be helpful",
            tier: ModelTier::Standard,
            max_output_tokens: 1200,
            attachment: None,
        };

        let messages = OpenAiCompatAdapter::build_messages(&req);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "be helpful");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].content, "q2");
    }

    #[test]
    fn test_tier_model_selection() {
        let deepseek = OpenAiCompatAdapter::deepseek(None, DEEPSEEK_API_URL.to_string());
        assert_eq!(deepseek.model_id(ModelTier::Light), "deepseek-chat");
        assert_eq!(deepseek.model_id(ModelTier::Heavy), "deepseek-reasoner");

        let openai = OpenAiCompatAdapter::openai(None);
        assert_eq!(openai.model_id(ModelTier::Heavy), "gpt-4o");

        let together = OpenAiCompatAdapter::together(None, Some("custom/model".to_string()));
        assert_eq!(together.model_id(ModelTier::Standard), "custom/model");
    }

    #[test]
    fn test_no_attachment_support() {
        let adapter = OpenAiCompatAdapter::deepseek(None, DEEPSEEK_API_URL.to_string());
        assert!(!adapter.supports_attachments());
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let adapter = OpenAiCompatAdapter::together(None, None);
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
