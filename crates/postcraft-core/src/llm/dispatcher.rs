//! Provider dispatch and response normalization.
//!
//! The dispatcher owns one client per provider, selected through a single
//! table keyed by [`Provider`]. Every vendor failure is logged here with
//! provider, model and stage context and turned into `None`; nothing past
//! this boundary sees a [`ProviderError`].

use super::anthropic::AnthropicProvider;
use super::gemini::{GeminiProvider, GeminiSettings};
use super::groq::GroqProvider;
use super::openai::OpenAiProvider;
use super::provider::{resolve_env_var, ChatRequest, ImageInput, LlmProvider, LlmRequest, LlmResponse};
use crate::config::{Config, ProviderSettings, ProvidersConfig};
use crate::error::{ConfigError, ProviderError, ProviderResult};
use crate::types::{ChatMessage, ImageSlot, Provider};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call generation parameters.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: u32,
    pub cancel: CancellationToken,
}

impl GenerationOptions {
    /// Options taken from a provider's configured defaults.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            model: settings.default_model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Routes requests to provider clients and normalizes their results.
pub struct Dispatcher {
    table: HashMap<Provider, Arc<dyn LlmProvider>>,
    /// Providers without a usable key, mapped to the variable that would supply it
    missing: HashMap<Provider, String>,
    settings: ProvidersConfig,
}

impl Dispatcher {
    /// Dispatcher with no clients registered.
    pub fn new(settings: ProvidersConfig) -> Self {
        Self {
            table: HashMap::new(),
            missing: Provider::ALL
                .iter()
                .map(|p| (*p, credential_source(settings.get(*p), *p)))
                .collect(),
            settings,
        }
    }

    /// Build one client per provider whose API key resolves.
    pub fn from_config(config: &Config) -> Self {
        let mut dispatcher = Self::new(config.providers.clone());

        for provider in Provider::ALL {
            let settings = config.providers.get(provider);
            let Some(api_key) = resolve_env_var(&settings.api_key) else {
                tracing::debug!("{} API key not set, provider disabled", provider.label());
                continue;
            };

            let client: Arc<dyn LlmProvider> = match provider {
                Provider::Gemini => Arc::new(GeminiProvider::new(
                    &api_key,
                    &settings.endpoint,
                    GeminiSettings::from(&config.gemini),
                )),
                Provider::OpenAi => Arc::new(OpenAiProvider::new(&api_key, &settings.endpoint)),
                Provider::Claude => Arc::new(AnthropicProvider::new(&api_key, &settings.endpoint)),
                Provider::Groq => Arc::new(GroqProvider::new(&api_key, &settings.endpoint)),
            };
            dispatcher = dispatcher.with_provider(client);
        }

        dispatcher
    }

    /// Register (or replace) the client for the provider it reports.
    pub fn with_provider(mut self, client: Arc<dyn LlmProvider>) -> Self {
        let provider = client.provider();
        self.missing.remove(&provider);
        self.table.insert(provider, client);
        self
    }

    /// Fail with a configuration error when the provider has no client.
    pub fn require(&self, provider: Provider) -> Result<(), ConfigError> {
        match self.missing.get(&provider) {
            Some(env_var) => Err(ConfigError::MissingCredential {
                provider,
                env_var: env_var.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Whether a client is registered for the provider.
    pub fn is_available(&self, provider: Provider) -> bool {
        self.table.contains_key(&provider)
    }

    /// Configured defaults for a provider.
    pub fn settings(&self, provider: Provider) -> &ProviderSettings {
        self.settings.get(provider)
    }

    /// Generation options seeded from a provider's defaults.
    pub fn options_for(&self, provider: Provider) -> GenerationOptions {
        GenerationOptions::from_settings(self.settings(provider))
    }

    /// Analyze an image (or generate from text alone) with the provider
    /// named by `provider_tag`.
    ///
    /// Returns `None` for an unknown tag, a missing credential, any vendor
    /// failure, or an empty reply.
    pub async fn process(
        &self,
        image: Option<&ImageSlot>,
        prompt: &str,
        provider_tag: &str,
        options: &GenerationOptions,
    ) -> Option<String> {
        match provider_tag.parse::<Provider>() {
            Ok(provider) => self.process_with(provider, image, prompt, options).await,
            Err(e) => {
                tracing::error!(model = %options.model, "Unsupported provider: {e}");
                None
            }
        }
    }

    /// Same as [`Dispatcher::process`] with an already-parsed provider.
    pub async fn process_with(
        &self,
        provider: Provider,
        image: Option<&ImageSlot>,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Option<String> {
        let client = self.client(provider)?;

        let mut request = LlmRequest::text(prompt, &options.model, self.clamp_tokens(provider, options))
            .with_cancel(options.cancel.clone());
        if let Some(slot) = image {
            request = request.with_image(ImageInput::from_slot(slot));
        }
        // Providers that ignore sampling knobs never see them
        if provider.supports_sampling() {
            request = request.with_sampling(options.temperature, options.top_p);
        }

        tracing::info!(
            provider = %provider,
            model = %options.model,
            image = image.map(|s| s.filename.as_str()),
            "Sending request"
        );

        let result = bounded(provider, client.timeout(), client.generate(&request)).await;
        normalize(provider, &options.model, result)
    }

    /// Continue a chat history with Groq, passing each delta to `on_delta`.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Option<String> {
        let provider = Provider::Groq;
        let client = self.client(provider)?;

        let request = ChatRequest {
            messages: messages.to_vec(),
            model: options.model.clone(),
            max_tokens: self.clamp_tokens(provider, options),
            temperature: options.temperature,
            top_p: options.top_p,
            cancel: options.cancel.clone(),
        };

        tracing::info!(provider = %provider, model = %options.model, turns = messages.len(), "Sending chat");
        let result = bounded(provider, client.timeout(), client.chat(&request, on_delta)).await;
        normalize(provider, &options.model, result)
    }

    fn client(&self, provider: Provider) -> Option<&Arc<dyn LlmProvider>> {
        let client = self.table.get(&provider);
        if client.is_none() {
            let env_var = self
                .missing
                .get(&provider)
                .map(String::as_str)
                .unwrap_or(provider.env_var());
            tracing::error!(
                provider = %provider,
                "{} API key not set. Set the {env_var} environment variable.",
                provider.label()
            );
        }
        client
    }

    fn clamp_tokens(&self, provider: Provider, options: &GenerationOptions) -> u32 {
        let limit = self.settings(provider).max_tokens_limit;
        if options.max_tokens > limit {
            tracing::warn!(
                provider = %provider,
                "max_tokens {} above limit, using {limit}",
                options.max_tokens
            );
        }
        options.max_tokens.min(limit).max(1)
    }
}

/// Name of the variable a provider's key is read from.
fn credential_source(settings: &ProviderSettings, provider: Provider) -> String {
    settings
        .api_key
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(provider.env_var())
        .to_string()
}

/// Run a provider call under its overall timeout.
async fn bounded<F>(provider: Provider, timeout: Duration, call: F) -> ProviderResult<LlmResponse>
where
    F: Future<Output = ProviderResult<LlmResponse>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::Timeout {
                provider,
                timeout_ms: timeout.as_millis() as u64,
            })
        })
}

/// Collapse a provider result into trimmed, non-empty text.
fn normalize(provider: Provider, model: &str, result: ProviderResult<LlmResponse>) -> Option<String> {
    match result {
        Ok(response) => {
            let text = response.text.trim();
            if text.is_empty() {
                tracing::error!(provider = %provider, model, "Provider returned empty text");
                return None;
            }
            tracing::info!(
                provider = %provider,
                model = %response.model,
                latency_ms = response.latency_ms,
                tokens = ?response.tokens_used,
                "Response received"
            );
            Some(text.to_string())
        }
        Err(e) => {
            tracing::error!(
                provider = %provider,
                model,
                stage = %e.stage(),
                "Error during processing: {e}"
            );
            None
        }
    }
}
