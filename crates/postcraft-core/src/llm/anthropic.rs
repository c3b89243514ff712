//! Claude provider using the Anthropic Messages API.
//!
//! Sends image + prompt with a base64 image content block. The media type is
//! inferred from the uploaded file name.

use super::provider::{send_or_cancel, status_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::{ProviderError, ProviderResult, Stage};
use crate::types::{mime_type_for_filename, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Claude provider using the Messages API.
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider against an API base URL (e.g. `https://api.anthropic.com`).
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

/// Media type Claude receives for an uploaded file name.
pub fn media_type_for_filename(filename: &str) -> String {
    mime_type_for_filename(filename)
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    model: String,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

fn build_body(request: &LlmRequest) -> MessagesRequest {
    let mut content = Vec::with_capacity(2);
    if let Some(image) = &request.image {
        content.push(ContentBlock::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: media_type_for_filename(&image.filename),
                data: image.base64(),
            },
        });
    }
    content.push(ContentBlock::Text {
        text: request.prompt.clone(),
    });

    MessagesRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens,
        messages: vec![Message {
            role: "user".to_string(),
            content,
        }],
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse> {
        let start = Instant::now();
        let body = build_body(request);

        let builder = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout());
        let resp =
            send_or_cancel(Provider::Claude, Stage::Generate, &request.cancel, builder).await?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::Claude, Stage::Generate, resp).await);
        }

        let messages_resp: MessagesResponse = resp.json().await.map_err(|e| {
            ProviderError::http(
                Provider::Claude,
                Stage::Generate,
                format!("failed to parse response: {e}"),
            )
        })?;

        // Only the first content block carries the answer
        let text = messages_resp
            .content
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::EmptyResponse {
                provider: Provider::Claude,
            })?;

        Ok(LlmResponse {
            text,
            model: messages_resp.model,
            tokens_used: messages_resp
                .usage
                .map(|u| u.input_tokens + u.output_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ImageInput;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image(filename: &str) -> ImageInput {
        ImageInput {
            filename: filename.to_string(),
            media_type: "application/octet-stream".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[test]
    fn test_media_type_jpg_maps_to_jpeg() {
        assert_eq!(media_type_for_filename("holiday.jpg"), "image/jpeg");
    }

    #[test]
    fn test_media_type_png() {
        assert_eq!(media_type_for_filename("holiday.png"), "image/png");
    }

    #[test]
    fn test_body_uses_filename_media_type() {
        let request = LlmRequest::text("Describe", "claude-3-5-sonnet-20240620", 1024)
            .with_image(image("holiday.jpg"))
            .with_sampling(Some(0.5), None);
        let body = serde_json::to_value(build_body(&request)).unwrap();

        assert!(body.get("temperature").is_none());
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[1]["text"], "Describe");
    }

    #[tokio::test]
    async fn test_generate_returns_first_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-3-5-sonnet-20240620",
                "content": [
                    {"type": "text", "text": "A lighthouse at dusk."},
                    {"type": "text", "text": "Second block"}
                ],
                "usage": {"input_tokens": 1200, "output_tokens": 12}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("test-key", &server.uri());
        let request = LlmRequest::text("Describe", "claude-3-5-sonnet-20240620", 1024)
            .with_image(image("light.png"));
        let response = provider.generate(&request).await.unwrap();

        assert_eq!(response.text, "A lighthouse at dusk.");
        assert_eq!(response.tokens_used, Some(1212));
    }
}
