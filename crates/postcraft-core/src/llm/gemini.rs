//! Gemini provider using the Files API plus `generateContent`.
//!
//! Images are not sent inline. The bytes are staged to a local temporary
//! file, uploaded to the vendor file store, polled until the file leaves the
//! `PROCESSING` state, and then referenced by URI from the generation call.
//! The remote file is deleted afterwards on a best-effort basis.
//!
//! The poll is bounded by a wait budget and honours the request's
//! cancellation token.

use super::provider::{
    send_or_cancel, status_error, transport_error, ImageInput, LlmProvider, LlmRequest, LlmResponse,
};
use crate::config::GeminiConfig;
use crate::error::{ProviderError, ProviderResult, Stage};
use crate::types::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Upload and polling knobs for [`GeminiProvider`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub request_timeout: Duration,
    pub staging_dir: PathBuf,
}

impl From<&GeminiConfig> for GeminiSettings {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
            request_timeout: config.request_timeout(),
            staging_dir: config.staging_dir(),
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self::from(&GeminiConfig::default())
    }
}

/// Gemini provider with remote file upload.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider against an API host (e.g. `https://generativelanguage.googleapis.com`).
    pub fn new(api_key: &str, base_url: &str, settings: GeminiSettings) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Write the image to a temporary file that is removed when dropped.
    fn stage(&self, image: &ImageInput) -> ProviderResult<NamedTempFile> {
        let staging = |source| ProviderError::Staging {
            provider: Provider::Gemini,
            source,
        };
        let suffix = image
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("postcraft-upload-")
            .suffix(&suffix)
            .tempfile_in(&self.settings.staging_dir)
            .map_err(staging)?;
        file.write_all(&image.bytes).map_err(staging)?;
        file.flush().map_err(staging)?;

        tracing::debug!("Image staged temporarily at {}", file.path().display());
        Ok(file)
    }

    /// Upload the staged file using the raw upload protocol.
    async fn upload(&self, staged: &NamedTempFile, image: &ImageInput) -> ProviderResult<RemoteFile> {
        let bytes = tokio::fs::read(staged.path()).await.map_err(|source| {
            ProviderError::Staging {
                provider: Provider::Gemini,
                source,
            }
        })?;

        let resp = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", image.media_type.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Gemini, Stage::Upload, e))?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::Gemini, Stage::Upload, resp).await);
        }

        let uploaded: UploadResponse = resp.json().await.map_err(|e| {
            ProviderError::http(
                Provider::Gemini,
                Stage::Upload,
                format!("failed to parse upload response: {e}"),
            )
        })?;
        tracing::debug!(file = %uploaded.file.name, "Image uploaded to Gemini file store");
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> ProviderResult<RemoteFile> {
        let resp = self
            .client
            .get(format!("{}/v1beta/{name}", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Gemini, Stage::Poll, e))?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::Gemini, Stage::Poll, resp).await);
        }

        resp.json().await.map_err(|e| {
            ProviderError::http(
                Provider::Gemini,
                Stage::Poll,
                format!("failed to parse file state: {e}"),
            )
        })
    }

    /// Poll until the file leaves `PROCESSING`, the budget runs out, or the
    /// caller cancels.
    async fn wait_until_ready(
        &self,
        mut file: RemoteFile,
        cancel: &CancellationToken,
    ) -> ProviderResult<RemoteFile> {
        let started = Instant::now();
        loop {
            match file.state {
                FileState::Processing => {}
                FileState::Failed => {
                    return Err(ProviderError::RemoteFailed {
                        provider: Provider::Gemini,
                        file: file.name,
                    })
                }
                FileState::Active | FileState::Unspecified => return Ok(file),
            }

            if started.elapsed() >= self.settings.max_wait {
                return Err(ProviderError::PollTimeout {
                    provider: Provider::Gemini,
                    file: file.name,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ProviderError::Cancelled {
                        provider: Provider::Gemini,
                        stage: Stage::Poll,
                    });
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }

            tracing::debug!(file = %file.name, "Gemini file still processing");
            file = self.get_file(&file.name).await?;
        }
    }

    async fn generate_content(
        &self,
        request: &LlmRequest,
        file: Option<&RemoteFile>,
    ) -> ProviderResult<LlmResponse> {
        let start = Instant::now();

        let mut parts = Vec::with_capacity(2);
        if let Some(file) = file {
            parts.push(Part::FileData {
                file_data: FileData {
                    mime_type: file.mime_type.clone(),
                    file_uri: file.uri.clone(),
                },
            });
        }
        parts.push(Part::Text {
            text: request.prompt.clone(),
        });

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        };

        let builder = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(self.settings.request_timeout);
        let resp =
            send_or_cancel(Provider::Gemini, Stage::Generate, &request.cancel, builder).await?;

        if !resp.status().is_success() {
            return Err(status_error(Provider::Gemini, Stage::Generate, resp).await);
        }

        let generated: GenerateResponse = resp.json().await.map_err(|e| {
            ProviderError::http(
                Provider::Gemini,
                Stage::Generate,
                format!("failed to parse response: {e}"),
            )
        })?;

        let text = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::EmptyResponse {
                provider: Provider::Gemini,
            })?;

        Ok(LlmResponse {
            text,
            model: generated
                .model_version
                .unwrap_or_else(|| request.model.clone()),
            tokens_used: generated.usage_metadata.and_then(|u| u.total_token_count),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Best-effort removal of an uploaded file. Failures are only logged.
    async fn delete_file(&self, name: &str) {
        let result = self
            .client
            .delete(format!("{}/v1beta/{name}", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(file = name, "Uploaded image deleted from Gemini file store");
            }
            Ok(resp) => {
                tracing::warn!(file = name, status = %resp.status(), "Could not delete uploaded image");
            }
            Err(e) => {
                tracing::warn!(file = name, "Could not delete uploaded image: {e}");
            }
        }
    }
}

// --- Files API types ---

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: FileState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum FileState {
    Processing,
    Active,
    Failed,
    #[default]
    #[serde(other, rename = "STATE_UNSPECIFIED")]
    Unspecified,
}

// --- generateContent types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse> {
        let Some(image) = &request.image else {
            return self.generate_content(request, None).await;
        };

        tracing::info!(
            model = %request.model,
            temperature = ?request.temperature,
            top_p = ?request.top_p,
            max_tokens = request.max_tokens,
            "Starting image processing with Gemini"
        );

        // Dropping `staged` removes the local file on every path below
        let staged = self.stage(image)?;
        let file = self.upload(&staged, image).await?;

        let result = match self.wait_until_ready(file.clone(), &request.cancel).await {
            Ok(ready) => {
                tracing::info!(file = %ready.name, "Image processed by Gemini file store");
                self.generate_content(request, Some(&ready)).await
            }
            Err(e) => Err(e),
        };

        self.delete_file(&file.name).await;
        drop(staged);
        tracing::debug!("Temporary staging file removed");
        result
    }

    fn timeout(&self) -> Duration {
        // Upload + bounded poll + generation
        self.settings.max_wait + self.settings.request_timeout + Duration::from_secs(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(staging_dir: &std::path::Path) -> GeminiSettings {
        GeminiSettings {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            staging_dir: staging_dir.to_path_buf(),
        }
    }

    fn image() -> ImageInput {
        ImageInput {
            filename: "coast.png".to_string(),
            media_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A],
        }
    }

    fn request() -> LlmRequest {
        LlmRequest::text("Describe the mood", "gemini-1.5-flash", 2000)
            .with_image(image())
            .with_sampling(Some(1.0), Some(0.94))
    }

    fn staged_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    async fn mount_upload(server: &MockServer, state: &str) {
        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("X-Goog-Upload-Protocol", "raw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "file": {
                    "name": "files/abc123",
                    "uri": "https://example.test/files/abc123",
                    "mimeType": "image/png",
                    "state": state
                }
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_file_state_parsing() {
        let file: RemoteFile =
            serde_json::from_value(json!({"name": "files/x", "state": "ACTIVE"})).unwrap();
        assert_eq!(file.state, FileState::Active);
        let file: RemoteFile =
            serde_json::from_value(json!({"name": "files/x", "state": "SOMETHING_NEW"})).unwrap();
        assert_eq!(file.state, FileState::Unspecified);
        let file: RemoteFile = serde_json::from_value(json!({"name": "files/x"})).unwrap();
        assert_eq!(file.state, FileState::Unspecified);
    }

    #[test]
    fn test_generation_config_is_camel_case() {
        let config = GenerationConfig {
            temperature: Some(1.0),
            top_p: Some(0.5),
            max_output_tokens: 2000,
        };
        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["topP"], 0.5);
        assert_eq!(value["maxOutputTokens"], 2000);
    }

    #[tokio::test]
    async fn test_failed_state_is_failure_and_cleans_staging() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        mount_upload(&server, "FAILED").await;
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key", &server.uri(), settings(staging.path()));
        let err = provider.generate(&request()).await.unwrap_err();

        assert!(matches!(err, ProviderError::RemoteFailed { .. }));
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_polls_until_active_then_generates_and_deletes() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        mount_upload(&server, "PROCESSING").await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "files/abc123",
                "uri": "https://example.test/files/abc123",
                "mimeType": "image/png",
                "state": "ACTIVE"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {"maxOutputTokens": 2000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Calm "}, {"text": "harbour."}]}}],
                "usageMetadata": {"totalTokenCount": 300},
                "modelVersion": "gemini-1.5-flash-002"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key", &server.uri(), settings(staging.path()));
        let response = provider.generate(&request()).await.unwrap();

        assert_eq!(response.text, "Calm harbour.");
        assert_eq!(response.tokens_used, Some(300));
        assert_eq!(response.model, "gemini-1.5-flash-002");
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_generate_failure_still_deletes_remote_file() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        mount_upload(&server, "ACTIVE").await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key", &server.uri(), settings(staging.path()));
        let err = provider.generate(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Http {
                stage: Stage::Generate,
                status_code: Some(500),
                ..
            }
        ));
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_staging_without_delete() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key", &server.uri(), settings(staging.path()));
        let err = provider.generate(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Http {
                stage: Stage::Upload,
                status_code: Some(503),
                ..
            }
        ));
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_poll_gives_up_after_wait_budget() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        mount_upload(&server, "PROCESSING").await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "files/abc123",
                "state": "PROCESSING"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut settings = settings(staging.path());
        settings.max_wait = Duration::from_millis(50);
        let provider = GeminiProvider::new("g-key", &server.uri(), settings);
        let err = provider.generate(&request()).await.unwrap_err();

        assert!(matches!(err, ProviderError::PollTimeout { .. }));
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_poll() {
        let server = MockServer::start().await;
        let staging = tempfile::tempdir().unwrap();
        mount_upload(&server, "PROCESSING").await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut settings = settings(staging.path());
        settings.poll_interval = Duration::from_secs(30);
        let provider = GeminiProvider::new("g-key", &server.uri(), settings);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider
            .generate(&request().with_cancel(cancel))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Cancelled {
                stage: Stage::Poll,
                ..
            }
        ));
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn test_text_only_skips_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Final post"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key", &server.uri(), GeminiSettings::default());
        let response = provider
            .generate(&LlmRequest::text("Compose", "gemini-1.5-pro", 500))
            .await
            .unwrap();
        assert_eq!(response.text, "Final post");
        assert_eq!(response.model, "gemini-1.5-pro");
    }
}
