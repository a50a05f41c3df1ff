//! Google Gemini adapter
//!
//! Speaks the Generative Language `generateContent` REST endpoint. The
//! persona instruction is prepended as the first user turn (works on every
//! model revision regardless of systemInstruction support), and attachments
//! travel as inline base64 parts.

use crate::error::ProviderError;
use crate::message::{Attachment, NormalizedResponse, Role};
use crate::persona::ModelTier;
use crate::providers::{classify_status, compute_cost, ChatRequest, ProviderAdapter, ProviderKind};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiAdapter {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl RequestPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(attachment: &Attachment) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: attachment.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    top_p: f64,
    top_k: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn model_id(tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Light => "gemini-1.5-flash-8b-latest",
            ModelTier::Standard => "gemini-1.5-flash",
            ModelTier::Heavy => "gemini-1.5-pro",
        }
    }

    fn build_contents(req: &ChatRequest<'_>) -> Vec<Content> {
        let mut contents = Vec::with_capacity(req.history.len() + 2);

        // No dedicated system channel in this request shape; the
        // instruction rides as the opening user turn.
        contents.push(Content {
            role: "user",
            parts: vec![RequestPart::text(format!(
                "SYSTEM INSTRUCTIONS:\n{}",
                req.system_instruction
            ))],
        });

        for msg in req.history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let mut parts = vec![RequestPart::text(msg.content.clone())];
            if let Some(attachment) = &msg.attachment {
                parts.push(RequestPart::inline(attachment));
            }
            contents.push(Content { role, parts });
        }

        let mut parts = vec![RequestPart::text(req.message.to_string())];
        if let Some(attachment) = req.attachment {
            parts.push(RequestPart::inline(attachment));
        }
        contents.push(Content {
            role: "user",
            parts,
        });

        contents
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn supports_attachments(&self) -> bool {
        true
    }

    async fn send(&self, req: ChatRequest<'_>) -> Result<NormalizedResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::Auth {
            provider: "gemini",
            message: "GEMINI_API_KEY not set".to_string(),
        })?;

        let model = Self::model_id(req.tier);
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, model);

        let body = GenerateRequest {
            contents: Self::build_contents(&req),
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: req.max_output_tokens,
                top_p: 0.95,
                top_k: 40,
            },
        };

        debug!("calling gemini: model={}, turns={}", model, body.contents.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: "gemini",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("gemini", status.as_u16(), text));
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::Upstream {
                provider: "gemini",
                status: status.as_u16(),
                message: format!("malformed payload: {}", e),
            })?;

        let content: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::Upstream {
                provider: "gemini",
                status: status.as_u16(),
                message: "response contained no text candidates".to_string(),
            });
        }

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));
        let cost = compute_cost(model, input_tokens, output_tokens);

        info!(
            "gemini response: model={}, in={}, out={}, cost=${:.5}",
            model, input_tokens, output_tokens, cost
        );

        Ok(NormalizedResponse {
            content,
            provider: ProviderKind::Gemini,
            model_used: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
            cached: false,
            attachment_ignored: false,
        })
    }
}
