//! Fallback router
//!
//! Attempts providers strictly in chain order, one attempt each, advancing
//! on any failure. Auth failures advance too but are logged as configuration
//! problems so they stand out from transient upstream trouble.

use crate::error::{ProviderError, RelayError};
use crate::message::NormalizedResponse;
use crate::providers::{ChatRequest, ProviderAdapter};
use std::sync::Arc;
use tracing::{error, warn};

/// Try each adapter in order until one answers.
///
/// On success the response is flagged when an attachment was supplied but
/// the answering provider cannot accept one, so the streaming layer can
/// surface the degraded-mode notice. Exhaustion is a typed terminal outcome,
/// never a panic.
pub async fn dispatch(
    chain: &[Arc<dyn ProviderAdapter>],
    req: ChatRequest<'_>,
) -> Result<NormalizedResponse, RelayError> {
    for adapter in chain {
        match adapter.send(req).await {
            Ok(mut response) => {
                if req.attachment.is_some() && !adapter.supports_attachments() {
                    response.attachment_ignored = true;
                }
                return Ok(response);
            }
            Err(e) => log_failure(&e),
        }
    }

    Err(RelayError::AllProvidersExhausted {
        attempted: chain.len(),
    })
}

fn log_failure(e: &ProviderError) {
    if e.is_auth() {
        // Credential problems need operator attention, not a retry later
        error!("provider {} misconfigured, advancing chain: {}", e.provider(), e);
    } else {
        warn!("provider {} failed, advancing chain: {}", e.provider(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::ModelTier;
    use crate::providers::ProviderKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedAdapter {
        kind: ProviderKind,
        fail_with: Option<fn(&'static str) -> ProviderError>,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn ok(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail_with: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(kind: ProviderKind, f: fn(&'static str) -> ProviderError) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail_with: Some(f),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn send(
            &self,
            _req: ChatRequest<'_>,
        ) -> Result<NormalizedResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(f) = self.fail_with {
                return Err(f(self.kind.as_str()));
            }
            Ok(NormalizedResponse {
                content: format!("answer from {}", self.kind),
                provider: self.kind,
                model_used: "mock".to_string(),
                input_tokens: 10,
                output_tokens: 5,
                cost: 0.001,
                cached: false,
                attachment_ignored: false,
            })
        }
    }

    fn request<'a>() -> ChatRequest<'a> {
        ChatRequest {
            history: &[],
            message: "hello",
            system_instruction: "sys",
            tier: ModelTier::Standard,
            max_output_tokens: 1200,
            attachment: None,
        }
    }

    fn rate_limited(provider: &'static str) -> ProviderError {
        ProviderError::RateLimit {
            provider,
            message: "429".to_string(),
        }
    }

    fn auth_failed(provider: &'static str) -> ProviderError {
        ProviderError::Auth {
            provider,
            message: "bad key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fallback_ordering() {
        let first = ScriptedAdapter::failing(ProviderKind::Gemini, rate_limited);
        let second = ScriptedAdapter::ok(ProviderKind::DeepSeek);
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![first.clone(), second.clone()];

        let response = dispatch(&chain, request()).await.unwrap();
        assert_eq!(response.provider, ProviderKind::DeepSeek);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let first = ScriptedAdapter::ok(ProviderKind::Gemini);
        let second = ScriptedAdapter::ok(ProviderKind::DeepSeek);
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![first.clone(), second.clone()];

        let response = dispatch(&chain, request()).await.unwrap();
        assert_eq!(response.provider, ProviderKind::Gemini);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_error_still_advances() {
        let first = ScriptedAdapter::failing(ProviderKind::Anthropic, auth_failed);
        let second = ScriptedAdapter::ok(ProviderKind::Together);
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![first.clone(), second.clone()];

        let response = dispatch(&chain, request()).await.unwrap();
        assert_eq!(response.provider, ProviderKind::Together);
        // One attempt only, no same-provider retry
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_fail_is_terminal() {
        let first = ScriptedAdapter::failing(ProviderKind::Gemini, rate_limited);
        let second = ScriptedAdapter::failing(ProviderKind::DeepSeek, rate_limited);
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![first, second];

        match dispatch(&chain, request()).await {
            Err(RelayError::AllProvidersExhausted { attempted }) => assert_eq!(attempted, 2),
            other => panic!("expected exhaustion, got {:?}", other.map(|r| r.content)),
        }
    }

    #[tokio::test]
    async fn test_attachment_flagged_on_degraded_provider() {
        use crate::message::Attachment;

        let text_only = ScriptedAdapter::failing(ProviderKind::Gemini, rate_limited);
        let backup = ScriptedAdapter::ok(ProviderKind::DeepSeek);
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![text_only, backup];

        let attachment = Attachment {
            name: "img.png".to_string(),
            mime_type: "image/png".to_string(),
            data: vec![0],
        };
        let mut req = request();
        req.attachment = Some(&attachment);

        let response = dispatch(&chain, req).await.unwrap();
        assert!(response.attachment_ignored);
    }
}
