//! Orchestration of the authoring workflow.
//!
//! The workbench is what a front end drives: it gates calls on credentials
//! and prompts, routes analyses through the dispatcher into the session,
//! composes final posts and records them.

use crate::composer::PostComposer;
use crate::config::Config;
use crate::error::{ConfigError, RecordError};
use crate::intake::{ImageIntake, UploadOutcome};
use crate::llm::{Dispatcher, GenerationOptions};
use crate::recorder::Recorder;
use crate::session::SessionStore;
use crate::types::{
    AnalysisRequest, AnalysisResult, ChatMessage, ChatRole, PersistedPost, Provider, SlotIndex,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// What happened to an analyze request that passed the credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeOutcome {
    /// The analysis was stored for the slot
    Stored(String),
    /// No prompt was given; nothing was sent
    MissingPrompt,
    /// The slot has no image; nothing was sent
    EmptySlot,
    /// The provider produced no usable text
    NoResult,
}

/// Front-end facing entry point over dispatcher, composer and recorder.
pub struct Workbench {
    dispatcher: Dispatcher,
    intake: ImageIntake,
    composer: PostComposer,
    recorder: Recorder,
}

impl Workbench {
    pub fn new(dispatcher: Dispatcher, config: &Config) -> Self {
        Self {
            dispatcher,
            intake: ImageIntake::new(config.upload.clone()),
            composer: PostComposer::new(config.composer.clone()),
            recorder: Recorder::new(config.recorder_path()),
        }
    }

    /// Workbench with one client per configured provider.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Dispatcher::from_config(config), config)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn composer(&self) -> &PostComposer {
        &self.composer
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Validate image files and load the accepted ones into the session.
    pub fn load_images<P: AsRef<Path>>(&self, session: &mut SessionStore, paths: &[P]) -> UploadOutcome {
        let outcome = self.intake.load_paths(paths);
        apply_upload(session, &outcome);
        outcome
    }

    /// Same as [`Workbench::load_images`] for uploads already in memory.
    pub fn load_uploads(
        &self,
        session: &mut SessionStore,
        uploads: Vec<(String, Vec<u8>)>,
    ) -> UploadOutcome {
        let outcome = self.intake.load_bytes(uploads);
        apply_upload(session, &outcome);
        outcome
    }

    /// Analyze one slot's image and store the result, replacing any earlier
    /// analysis.
    ///
    /// A missing credential is an error and nothing is sent. An empty prompt
    /// or an empty slot is reported without a network call.
    pub async fn analyze(
        &self,
        session: &mut SessionStore,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalyzeOutcome, ConfigError> {
        self.dispatcher.require(request.provider)?;

        let slot = request.slot_index;
        session.set_prompt(slot, request.prompt.clone());
        if request.prompt.trim().is_empty() {
            tracing::warn!(slot = %slot, "Please enter a prompt for the image.");
            return Ok(AnalyzeOutcome::MissingPrompt);
        }
        let Some(image) = session.image(slot) else {
            tracing::warn!(slot = %slot, "No image loaded in this slot");
            return Ok(AnalyzeOutcome::EmptySlot);
        };

        let mut options = GenerationOptions::from_settings(self.dispatcher.settings(request.provider))
            .with_model(request.model_name.clone())
            .with_max_tokens(request.max_tokens)
            .with_cancel(cancel);
        options.temperature = request.temperature.or(options.temperature);
        options.top_p = request.top_p.or(options.top_p);

        let text = self
            .dispatcher
            .process_with(request.provider, Some(image), &request.prompt, &options)
            .await;

        Ok(match text {
            Some(text) => {
                session.store_analysis(AnalysisResult {
                    slot_index: slot,
                    text: text.clone(),
                });
                AnalyzeOutcome::Stored(text)
            }
            None => AnalyzeOutcome::NoResult,
        })
    }

    /// Compose a final post for a slot and keep it in the session.
    pub async fn compose(
        &self,
        session: &mut SessionStore,
        slot: SlotIndex,
        provider: Provider,
        options: &GenerationOptions,
    ) -> Result<Option<String>, ConfigError> {
        self.dispatcher.require(provider)?;

        let composed = self
            .composer
            .compose(&self.dispatcher, session, slot, provider, options)
            .await;
        if let Some(text) = &composed {
            session.set_composed(slot, text.clone());
        }
        Ok(composed)
    }

    /// Record a slot's post with the given description.
    ///
    /// Returns `false` without writing when the slot has no image.
    pub fn record(
        &self,
        session: &SessionStore,
        slot: SlotIndex,
        description: &str,
    ) -> Result<bool, RecordError> {
        let Some(image) = session.image(slot) else {
            tracing::warn!(slot = %slot, "Nothing to save: no image loaded in this slot");
            return Ok(false);
        };

        self.recorder.append(&PersistedPost {
            image_filename: image.filename.clone(),
            description: description.to_string(),
            caption: session.caption(slot).to_string(),
            hashtags: session.hashtags(slot).to_string(),
        })?;
        Ok(true)
    }

    /// Send a chat turn to Groq and stream the reply.
    ///
    /// Both turns are added to the session history when a reply arrives; a
    /// failed call leaves the history unchanged.
    pub async fn chat(
        &self,
        session: &mut SessionStore,
        message: &str,
        role: ChatRole,
        options: &GenerationOptions,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Option<String>, ConfigError> {
        self.dispatcher.require(Provider::Groq)?;

        session.push_chat(ChatMessage::new(role, message));
        let reply = self
            .dispatcher
            .chat(session.chat_history(), options, on_delta)
            .await;

        match &reply {
            Some(text) => session.push_chat(ChatMessage::new(ChatRole::Assistant, text.clone())),
            None => {
                session.pop_chat();
            }
        }
        Ok(reply)
    }

    pub fn clear_slot(&self, session: &mut SessionStore, slot: SlotIndex) {
        session.clear_slot(slot);
        tracing::info!(slot = %slot, "Slot cleared");
    }

    pub fn clear_all(&self, session: &mut SessionStore) {
        session.clear_all();
        tracing::info!("Session cleared");
    }
}

/// Replace the session's images with an upload's accepted slots.
///
/// An upload where every file was rejected leaves the session as it was.
fn apply_upload(session: &mut SessionStore, outcome: &UploadOutcome) {
    if outcome.slots.is_empty() && !outcome.rejected.is_empty() {
        tracing::warn!(
            rejected = outcome.rejected.len(),
            "No usable images in upload, keeping current session"
        );
        return;
    }
    session.set_images(outcome.slots.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use crate::error::ProviderResult;
    use crate::llm::{ChatRequest, LlmProvider, LlmRequest, LlmResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Mock provider that replies with a queue of texts, one per call.
    struct MockProvider {
        provider: Provider,
        replies: Mutex<Vec<&'static str>>,
        call_count: Arc<AtomicU32>,
    }

    impl MockProvider {
        fn new(provider: Provider, replies: &[&'static str]) -> (Self, Arc<AtomicU32>) {
            let call_count = Arc::new(AtomicU32::new(0));
            let mut replies = replies.to_vec();
            replies.reverse();
            (
                Self {
                    provider,
                    replies: Mutex::new(replies),
                    call_count: call_count.clone(),
                },
                call_count,
            )
        }

        fn next_reply(&self, model: &str) -> ProviderResult<LlmResponse> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let text = self.replies.lock().unwrap().pop().unwrap_or("");
            Ok(LlmResponse {
                text: text.to_string(),
                model: model.to_string(),
                tokens_used: None,
                latency_ms: 0,
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn generate(&self, request: &LlmRequest) -> ProviderResult<LlmResponse> {
            self.next_reply(&request.model)
        }

        async fn chat(
            &self,
            request: &ChatRequest,
            on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
        ) -> ProviderResult<LlmResponse> {
            let response = self.next_reply(&request.model)?;
            on_delta(&response.text);
            Ok(response)
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn slot(n: u8) -> SlotIndex {
        SlotIndex::new(n).unwrap()
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.recorder.path = dir.join("content.csv").to_string_lossy().into_owned();
        config
    }

    fn workbench(dir: &Path, provider: MockProvider) -> Workbench {
        let dispatcher = Dispatcher::new(ProvidersConfig::default()).with_provider(Arc::new(provider));
        Workbench::new(dispatcher, &config_in(dir))
    }

    fn request(provider: Provider, prompt: &str) -> AnalysisRequest {
        AnalysisRequest {
            slot_index: slot(1),
            prompt: prompt.to_string(),
            provider,
            model_name: "test-model".to_string(),
            temperature: None,
            top_p: None,
            max_tokens: 256,
        }
    }

    fn loaded_session(bench: &Workbench) -> SessionStore {
        let mut session = SessionStore::new();
        bench.load_uploads(&mut session, vec![("pier.png".to_string(), PNG.to_vec())]);
        session
    }

    #[tokio::test]
    async fn test_missing_credential_blocks_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, calls) = MockProvider::new(Provider::OpenAi, &["unused"]);
        let bench = workbench(dir.path(), mock);
        let mut session = loaded_session(&bench);

        let err = bench
            .analyze(&mut session, &request(Provider::Claude, "Describe"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::MissingCredential {
                provider: Provider::Claude,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.analysis(slot(1)).is_none());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, calls) = MockProvider::new(Provider::Gemini, &["unused"]);
        let bench = workbench(dir.path(), mock);
        let mut session = loaded_session(&bench);

        let outcome = bench
            .analyze(&mut session, &request(Provider::Gemini, "  "), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, AnalyzeOutcome::MissingPrompt);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_slot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, calls) = MockProvider::new(Provider::Gemini, &["unused"]);
        let bench = workbench(dir.path(), mock);
        let mut session = SessionStore::new();

        let outcome = bench
            .analyze(&mut session, &request(Provider::Gemini, "Describe"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, AnalyzeOutcome::EmptySlot);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reanalysis_overwrites_stored_result() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, calls) = MockProvider::new(Provider::Gemini, &["First look", "Second look"]);
        let bench = workbench(dir.path(), mock);
        let mut session = loaded_session(&bench);
        let req = request(Provider::Gemini, "Describe");

        bench.analyze(&mut session, &req, CancellationToken::new()).await.unwrap();
        let outcome = bench.analyze(&mut session, &req, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, AnalyzeOutcome::Stored("Second look".to_string()));
        assert_eq!(session.analysis(slot(1)).unwrap().text, "Second look");
        assert_eq!(session.prompt(slot(1)), "Describe");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_result_leaves_previous_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &["Kept", ""]);
        let bench = workbench(dir.path(), mock);
        let mut session = loaded_session(&bench);
        let req = request(Provider::Gemini, "Describe");

        bench.analyze(&mut session, &req, CancellationToken::new()).await.unwrap();
        let outcome = bench.analyze(&mut session, &req, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, AnalyzeOutcome::NoResult);
        assert_eq!(session.analysis(slot(1)).unwrap().text, "Kept");
    }

    #[tokio::test]
    async fn test_analyze_compose_record_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &["Pier at dawn", "Final: pier #sea"]);
        let bench = workbench(dir.path(), mock);
        let mut session = loaded_session(&bench);
        session.set_caption(slot(1), "Early start");
        session.set_hashtags(slot(1), "#sea");

        bench
            .analyze(&mut session, &request(Provider::Gemini, "Describe"), CancellationToken::new())
            .await
            .unwrap();
        let options = bench.dispatcher().options_for(Provider::Gemini);
        let composed = bench
            .compose(&mut session, slot(1), Provider::Gemini, &options)
            .await
            .unwrap();
        assert_eq!(composed.as_deref(), Some("Final: pier #sea"));
        assert_eq!(session.composed(slot(1)), Some("Final: pier #sea"));

        assert!(bench.record(&session, slot(1), "Pier at dawn").unwrap());
        let rows = bench.recorder().read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].image_filename, "pier.png");
        assert_eq!(rows[0].caption, "Early start");
        assert_eq!(rows[0].hashtags, "#sea");
    }

    #[tokio::test]
    async fn test_record_without_image_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &[]);
        let bench = workbench(dir.path(), mock);
        let session = SessionStore::new();

        assert!(!bench.record(&session, slot(2), "desc").unwrap());
        assert!(!bench.recorder().path().exists());
    }

    #[tokio::test]
    async fn test_chat_appends_both_turns() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Groq, &["Hello!", ""]);
        let bench = workbench(dir.path(), mock);
        let mut session = SessionStore::new();
        let options = bench.dispatcher().options_for(Provider::Groq);

        let mut streamed = String::new();
        let reply = bench
            .chat(&mut session, "Hi", ChatRole::User, &options, &mut |d: &str| {
                streamed.push_str(d)
            })
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Hello!"));
        assert_eq!(streamed, "Hello!");
        assert_eq!(session.chat_history().len(), 2);
        assert_eq!(session.chat_history()[1].role, ChatRole::Assistant);

        let reply = bench
            .chat(&mut session, "Again", ChatRole::User, &options, &mut |_: &str| {})
            .await
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(session.chat_history().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_requires_groq_key() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &[]);
        let bench = workbench(dir.path(), mock);
        let mut session = SessionStore::new();
        let options = bench.dispatcher().options_for(Provider::Groq);

        let err = bench
            .chat(&mut session, "Hi", ChatRole::User, &options, &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert!(session.chat_history().is_empty());
    }

    #[test]
    fn test_load_uploads_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &[]);
        let bench = workbench(dir.path(), mock);
        let mut session = SessionStore::new();
        let uploads = (0..4).map(|i| (format!("{i}.png"), PNG.to_vec())).collect();

        let outcome = bench.load_uploads(&mut session, uploads);
        assert_eq!(outcome.truncated, 1);
        assert_eq!(session.image_count(), 3);
    }

    #[test]
    fn test_rejected_reload_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = MockProvider::new(Provider::Gemini, &[]);
        let bench = workbench(dir.path(), mock);
        let mut session = SessionStore::new();
        bench.load_uploads(&mut session, vec![("a.png".to_string(), PNG.to_vec())]);
        let slot = SlotIndex::new(1).unwrap();
        session.store_analysis(AnalysisResult {
            slot_index: slot,
            text: "Boats at dusk.".to_string(),
        });

        let outcome = bench.load_images(&mut session, &[dir.path().join("typo.png")]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(session.image_count(), 1);
        assert_eq!(session.analysis(slot).unwrap().text, "Boats at dusk.");
    }
}
