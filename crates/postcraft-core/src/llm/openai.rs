//! OpenAI provider using the Chat Completions API.
//!
//! Stateless: the image travels inline as a base64 data URL in the user
//! message content array.

use super::provider::{send_or_cancel, status_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::{ProviderError, ProviderResult, Stage};
use crate::types::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI provider using Chat Completions API.
pub struct OpenAiProvider {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    /// Create a provider against an API base URL (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

fn build_body(request: &LlmRequest) -> ChatRequest {
    let mut content = vec![ChatContent::Text {
        text: request.prompt.clone(),
    }];
    if let Some(image) = &request.image {
        content.push(ChatContent::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        });
    }

    // temperature/top_p are not forwarded to this provider
    ChatRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens,
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content,
        }],
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse> {
        let start = Instant::now();
        let body = build_body(request);

        tracing::debug!(model = %request.model, "Sending request to OpenAI");
        let builder = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout());
        let resp =
            send_or_cancel(Provider::OpenAi, Stage::Generate, &request.cancel, builder).await?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::OpenAi, Stage::Generate, resp).await);
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::http(
                Provider::OpenAi,
                Stage::Generate,
                format!("failed to parse response: {e}"),
            )
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::EmptyResponse {
                provider: Provider::OpenAi,
            })?;

        Ok(LlmResponse {
            text,
            model: chat_resp.model,
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
