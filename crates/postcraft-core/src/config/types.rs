//! Sub-configuration structs with their defaults.

use crate::types::Provider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one hosted provider.
///
/// This is the single canonical table of per-provider defaults; callers pick
/// overrides on top of it instead of carrying their own literals.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSettings {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// API base URL
    pub endpoint: String,

    /// Models offered in menus
    pub models: Vec<String>,

    /// Model used when none is chosen
    pub default_model: String,

    /// Sampling temperature (only sent to providers that take it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling (only sent to providers that take it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Default output token budget
    pub max_tokens: u32,

    /// Upper bound for user-chosen token budgets
    pub max_tokens_limit: u32,
}

/// Partial provider settings as written in the config file.
///
/// Missing fields fall back to that provider's built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub models: Option<Vec<String>>,
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tokens_limit: Option<u32>,
}

impl ProviderOverrides {
    fn apply(self, provider: Provider) -> ProviderSettings {
        let defaults = ProvidersConfig::defaults_for(provider);
        ProviderSettings {
            api_key: self.api_key.unwrap_or(defaults.api_key),
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            models: self.models.unwrap_or(defaults.models),
            default_model: self.default_model.unwrap_or(defaults.default_model),
            temperature: self.temperature.or(defaults.temperature),
            top_p: self.top_p.or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_tokens_limit: self.max_tokens_limit.unwrap_or(defaults.max_tokens_limit),
        }
    }
}

/// `[providers]` section as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProvidersConfig {
    pub gemini: ProviderOverrides,
    pub openai: ProviderOverrides,
    pub claude: ProviderOverrides,
    pub groq: ProviderOverrides,
}

/// Per-provider settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawProvidersConfig")]
pub struct ProvidersConfig {
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
    pub claude: ProviderSettings,
    pub groq: ProviderSettings,
}

impl From<RawProvidersConfig> for ProvidersConfig {
    fn from(raw: RawProvidersConfig) -> Self {
        Self {
            gemini: raw.gemini.apply(Provider::Gemini),
            openai: raw.openai.apply(Provider::OpenAi),
            claude: raw.claude.apply(Provider::Claude),
            groq: raw.groq.apply(Provider::Groq),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        RawProvidersConfig::default().into()
    }
}

impl ProvidersConfig {
    /// Settings for one provider.
    pub fn get(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::OpenAi => &self.openai,
            Provider::Claude => &self.claude,
            Provider::Groq => &self.groq,
        }
    }

    /// Mutable settings for one provider.
    pub fn get_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::Gemini => &mut self.gemini,
            Provider::OpenAi => &mut self.openai,
            Provider::Claude => &mut self.claude,
            Provider::Groq => &mut self.groq,
        }
    }

    /// Built-in defaults for a provider.
    pub fn defaults_for(provider: Provider) -> ProviderSettings {
        let api_key = format!("${{{}}}", provider.env_var());
        match provider {
            Provider::Gemini => ProviderSettings {
                api_key,
                endpoint: "https://generativelanguage.googleapis.com".to_string(),
                models: vec!["gemini-1.5-flash".to_string(), "gemini-1.5-pro".to_string()],
                default_model: "gemini-1.5-flash".to_string(),
                temperature: Some(1.0),
                top_p: Some(0.94),
                max_tokens: 2000,
                max_tokens_limit: 8192,
            },
            Provider::OpenAi => ProviderSettings {
                api_key,
                endpoint: "https://api.openai.com/v1".to_string(),
                models: vec![
                    "gpt-4o".to_string(),
                    "gpt-4o-mini".to_string(),
                    "gpt-4-turbo".to_string(),
                ],
                default_model: "gpt-4o".to_string(),
                temperature: None,
                top_p: None,
                max_tokens: 300,
                max_tokens_limit: 4096,
            },
            Provider::Claude => ProviderSettings {
                api_key,
                endpoint: "https://api.anthropic.com".to_string(),
                models: vec![
                    "claude-3-5-sonnet-20240620".to_string(),
                    "claude-3-opus-20240229".to_string(),
                ],
                default_model: "claude-3-5-sonnet-20240620".to_string(),
                temperature: None,
                top_p: None,
                max_tokens: 1024,
                max_tokens_limit: 4096,
            },
            Provider::Groq => ProviderSettings {
                api_key,
                endpoint: "https://api.groq.com/openai/v1".to_string(),
                models: vec!["llama3-70b-8192".to_string()],
                default_model: "llama3-70b-8192".to_string(),
                temperature: Some(1.0),
                top_p: Some(1.0),
                max_tokens: 1024,
                max_tokens_limit: 4096,
            },
        }
    }
}

/// Gemini file-upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Delay between file-state polls in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting for an uploaded file after this many seconds
    pub max_wait_secs: u64,

    /// Timeout for the generation request in seconds
    pub request_timeout_secs: u64,

    /// Directory for the local staging copy (empty = system temp dir)
    pub staging_dir: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_wait_secs: 300,
            request_timeout_secs: 120,
            staging_dir: String::new(),
        }
    }
}

impl GeminiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved staging directory (with ~ expansion).
    pub fn staging_dir(&self) -> PathBuf {
        if self.staging_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(shellexpand::tilde(&self.staging_dir).into_owned())
        }
    }
}

/// Image intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Number of images kept per session (1..=3)
    pub max_slots: usize,

    /// Accepted file extensions (lowercase, no dot)
    pub accepted_extensions: Vec<String>,

    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_slots: crate::types::MAX_SLOTS,
            accepted_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            max_file_size_mb: 20,
        }
    }
}

/// Post recorder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// CSV file that finished posts are appended to
    pub path: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            path: "data/content.csv".to_string(),
        }
    }
}

/// Post composition limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Hashtags allowed in a final post
    pub max_hashtags: usize,

    /// Character limit for the composed post
    pub max_post_chars: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_hashtags: 30,
            max_post_chars: 2200,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
