//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::types::{Provider, MAX_SLOTS};

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for provider in Provider::ALL {
            let settings = self.providers.get(provider);
            if settings.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{provider}.max_tokens must be > 0"
                )));
            }
            if settings.max_tokens > settings.max_tokens_limit {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{provider}.max_tokens must not exceed max_tokens_limit ({})",
                    settings.max_tokens_limit
                )));
            }
            if let Some(t) = settings.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{provider}.temperature must be between 0.0 and 2.0"
                    )));
                }
            }
            if let Some(p) = settings.top_p {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{provider}.top_p must be between 0.0 and 1.0"
                    )));
                }
            }
            if settings.default_model.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{provider}.default_model must not be empty"
                )));
            }
        }
        if self.gemini.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gemini.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.gemini.max_wait_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gemini.max_wait_secs must be > 0".into(),
            ));
        }
        if self.gemini.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gemini.request_timeout_secs must be > 0".into(),
            ));
        }
        if self.upload.max_slots == 0 || self.upload.max_slots > MAX_SLOTS {
            return Err(ConfigError::ValidationError(format!(
                "upload.max_slots must be between 1 and {MAX_SLOTS}"
            )));
        }
        if self.upload.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.recorder.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "recorder.path must not be empty".into(),
            ));
        }
        if self.composer.max_post_chars == 0 {
            return Err(ConfigError::ValidationError(
                "composer.max_post_chars must be > 0".into(),
            ));
        }
        Ok(())
    }
}
