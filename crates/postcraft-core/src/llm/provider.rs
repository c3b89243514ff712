//! LLM provider trait and request/response types.
//!
//! Defines the interface that every vendor client implements. Vendor
//! asymmetries (inline base64 vs. remote upload, which sampling knobs are
//! honoured, streaming) stay behind this trait.

use crate::error::{ProviderError, ProviderResult, Stage};
use crate::types::{ChatMessage, ImageSlot, Provider};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Image payload for a provider request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Original file name, used for MIME inference and upload display names
    pub filename: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl ImageInput {
    /// Copy an uploaded slot into a request payload.
    pub fn from_slot(slot: &ImageSlot) -> Self {
        Self {
            filename: slot.filename.clone(),
            media_type: slot.mime_type.clone(),
            bytes: slot.raw_bytes.clone(),
        }
    }

    /// Base64-encoded image bytes.
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64())
    }
}

/// A single generation request, with or without an image.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The image to analyze; `None` for text-only generation
    pub image: Option<ImageInput>,
    /// Text prompt for the model
    pub prompt: String,
    /// Vendor model identifier
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature, for providers that take it
    pub temperature: Option<f32>,
    /// Nucleus sampling, for providers that take it
    pub top_p: Option<f32>,
    /// Fires when the caller gives up on the request
    pub cancel: CancellationToken,
}

impl LlmRequest {
    /// Build a text-only request.
    pub fn text(prompt: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            image: None,
            prompt: prompt.into(),
            model: model.into(),
            max_tokens,
            temperature: None,
            top_p: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an image to the request.
    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    /// Set sampling parameters.
    pub fn with_sampling(mut self, temperature: Option<f32>, top_p: Option<f32>) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    /// Use the given cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A chat-style request over the full role-tagged history.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub cancel: CancellationToken,
}

/// The response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` in the dispatcher table).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identity for logging and error context.
    fn provider(&self) -> Provider;

    /// Generate text for the given request.
    async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse>;

    /// Continue a role-tagged conversation, reporting each text delta as it
    /// arrives. Providers without a chat surface reject the call.
    async fn chat(
        &self,
        _request: &ChatRequest,
        _on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> ProviderResult<LlmResponse> {
        Err(ProviderError::UnsupportedInput {
            provider: self.provider(),
            input: "chat history",
        })
    }

    /// Upper bound for one whole call to this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Map a reqwest transport error into a provider error for the given stage.
pub(crate) fn transport_error(provider: Provider, stage: Stage, e: reqwest::Error) -> ProviderError {
    ProviderError::http(provider, stage, format!("request failed: {e}"))
}

/// Send a request unless the caller cancels first.
pub(crate) async fn send_or_cancel(
    provider: Provider,
    stage: Stage,
    cancel: &CancellationToken,
    builder: reqwest::RequestBuilder,
) -> ProviderResult<reqwest::Response> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ProviderError::Cancelled { provider, stage }),
        resp = builder.send() => resp.map_err(|e| transport_error(provider, stage, e)),
    }
}

/// Turn a non-success response into a provider error, keeping the body text.
pub(crate) async fn status_error(
    provider: Provider,
    stage: Stage,
    resp: reqwest::Response,
) -> ProviderError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    ProviderError::Http {
        provider,
        stage,
        message: format!("HTTP {status}: {text}"),
        status_code: Some(status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlotIndex;

    fn slot(filename: &str, mime: &str) -> ImageSlot {
        ImageSlot {
            index: SlotIndex::new(1).unwrap(),
            raw_bytes: vec![1, 2, 3],
            filename: filename.to_string(),
            mime_type: mime.to_string(),
        }
    }

    #[test]
    fn test_image_input_from_slot() {
        let input = ImageInput::from_slot(&slot("a.png", "image/png"));
        assert_eq!(input.media_type, "image/png");
        assert_eq!(input.filename, "a.png");
        assert_eq!(input.base64(), "AQID");
    }

    #[test]
    fn test_image_input_data_url() {
        let input = ImageInput::from_slot(&slot("a.jpg", "image/jpeg"));
        assert_eq!(input.data_url(), "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn test_text_request_has_no_image_or_sampling() {
        let request = LlmRequest::text("hello", "gpt-4o", 300);
        assert!(request.image.is_none());
        assert!(request.temperature.is_none());
        assert!(!request.cancel.is_cancelled());
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }
}
