//! Groq provider (OpenAI-compatible streaming chat).
//!
//! Text only. Tokens arrive as server-sent events and are accumulated into a
//! single reply while each delta is handed to the caller.

use super::provider::{
    send_or_cancel, status_error, transport_error, ChatRequest, LlmProvider, LlmRequest, LlmResponse,
};
use super::sse::SseParser;
use crate::error::{ProviderError, ProviderResult, Stage};
use crate::types::{ChatMessage, ChatRole, Provider};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// System message sent ahead of single-prompt requests.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Groq provider streaming from the Chat Completions endpoint.
pub struct GroqProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GroqProvider {
    /// Create a provider against an API base URL (e.g. `https://api.groq.com/openai/v1`).
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct StreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

// --- Stream chunk types ---

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    model: Option<String>,
    x_groq: Option<GroqExtra>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GroqExtra {
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// The history as sent: a default system message goes first unless the
/// caller already supplied one.
fn with_system_prompt(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if messages.first().map(|m| m.role) != Some(ChatRole::System) {
        out.push(ChatMessage::new(ChatRole::System, DEFAULT_SYSTEM_PROMPT));
    }
    out.extend_from_slice(messages);
    out
}

/// Drain the longest valid UTF-8 prefix from `pending`.
///
/// A multi-byte character split across network chunks stays buffered until
/// its remaining bytes arrive.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(s) => {
            let out = s.to_string();
            pending.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let out = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            out
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn provider(&self) -> Provider {
        Provider::Groq
    }

    async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse> {
        if request.image.is_some() {
            return Err(ProviderError::UnsupportedInput {
                provider: Provider::Groq,
                input: "image",
            });
        }

        let chat = ChatRequest {
            messages: vec![
                ChatMessage::new(ChatRole::System, DEFAULT_SYSTEM_PROMPT),
                ChatMessage::new(ChatRole::User, request.prompt.clone()),
            ],
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            cancel: request.cancel.clone(),
        };
        self.chat(&chat, &mut |_: &str| {}).await
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> ProviderResult<LlmResponse> {
        let start = Instant::now();
        let messages = with_system_prompt(&request.messages);
        let body = StreamRequest {
            model: &request.model,
            messages: &messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: true,
        };

        let builder = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(self.timeout());
        let resp =
            send_or_cancel(Provider::Groq, Stage::Generate, &request.cancel, builder).await?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::Groq, Stage::Generate, resp).await);
        }

        let mut stream = resp.bytes_stream();
        let mut parser = SseParser::new();
        let mut pending = Vec::new();
        let mut full = String::new();
        let mut model = request.model.clone();
        let mut tokens_used = None;

        'stream: loop {
            let next = tokio::select! {
                _ = request.cancel.cancelled() => {
                    return Err(ProviderError::Cancelled {
                        provider: Provider::Groq,
                        stage: Stage::Stream,
                    });
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| transport_error(Provider::Groq, Stage::Stream, e))?;
            pending.extend_from_slice(&chunk);
            let text = take_utf8(&mut pending);

            for event in parser.feed(&text) {
                if event.name.as_deref() == Some("error") {
                    return Err(ProviderError::http(Provider::Groq, Stage::Stream, event.data));
                }
                if event.data == "[DONE]" {
                    break 'stream;
                }
                let parsed: StreamChunk = serde_json::from_str(&event.data).map_err(|e| {
                    ProviderError::http(
                        Provider::Groq,
                        Stage::Stream,
                        format!("failed to parse stream chunk: {e}"),
                    )
                })?;
                if let Some(m) = parsed.model {
                    model = m;
                }
                if let Some(usage) = parsed.x_groq.and_then(|x| x.usage) {
                    tokens_used = Some(usage.total_tokens);
                }
                for choice in parsed.choices {
                    if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                        on_delta(&delta);
                        full.push_str(&delta);
                    }
                }
            }
        }

        if full.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: Provider::Groq,
            });
        }

        Ok(LlmResponse {
            text: full,
            model,
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }
}
