//! Error types for Postcraft.
//!
//! Errors are grouped by the layer that raises them so callers can tell a
//! configuration failure (surfaced to the user, blocks the action) apart from
//! a vendor failure (logged at the dispatcher, turned into "no result").

use crate::types::Provider;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Postcraft operations.
#[derive(Error, Debug)]
pub enum PostcraftError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider call errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Image intake errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Post recorder errors
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The selected provider has no API key
    #[error("{provider} API key not set. Set the {env_var} environment variable.")]
    MissingCredential { provider: Provider, env_var: String },
}

/// The step of a provider call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing the image to a local staging file
    Staging,
    /// Uploading bytes to the vendor file store
    Upload,
    /// Polling the uploaded file's processing state
    Poll,
    /// The generation request itself
    Generate,
    /// Reading a streamed response
    Stream,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Staging => "staging",
            Stage::Upload => "upload",
            Stage::Poll => "poll",
            Stage::Generate => "generate",
            Stage::Stream => "stream",
        };
        f.write_str(name)
    }
}

/// Errors raised inside a provider client.
///
/// These never escape the dispatcher: it logs them and reports absence of a
/// result instead.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure, non-success status, or an unparseable body
    #[error("{provider} {stage} failed: {message}")]
    Http {
        provider: Provider,
        stage: Stage,
        message: String,
        status_code: Option<u16>,
    },

    /// The vendor marked an uploaded file as failed
    #[error("{provider} reported uploaded file {file} as FAILED")]
    RemoteFailed { provider: Provider, file: String },

    /// The uploaded file never left the processing state within the wait budget
    #[error("{provider} file {file} still processing after {waited_ms}ms")]
    PollTimeout {
        provider: Provider,
        file: String,
        waited_ms: u64,
    },

    /// The caller cancelled the request
    #[error("{provider} request cancelled during {stage}")]
    Cancelled { provider: Provider, stage: Stage },

    /// The whole call exceeded the provider's timeout
    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout { provider: Provider, timeout_ms: u64 },

    /// The provider cannot take this kind of input
    #[error("{provider} does not accept {input} input")]
    UnsupportedInput {
        provider: Provider,
        input: &'static str,
    },

    /// The vendor answered but produced no text
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: Provider },

    /// Local staging file could not be written
    #[error("Failed to stage image for {provider}: {source}")]
    Staging {
        provider: Provider,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    /// The call stage this error belongs to, for log context.
    pub fn stage(&self) -> Stage {
        match self {
            ProviderError::Http { stage, .. } | ProviderError::Cancelled { stage, .. } => *stage,
            ProviderError::RemoteFailed { .. } | ProviderError::PollTimeout { .. } => Stage::Poll,
            ProviderError::Staging { .. } => Stage::Staging,
            ProviderError::Timeout { .. }
            | ProviderError::UnsupportedInput { .. }
            | ProviderError::EmptyResponse { .. } => Stage::Generate,
        }
    }

    /// Shorthand for an HTTP-layer failure.
    pub(crate) fn http(provider: Provider, stage: Stage, message: impl Into<String>) -> Self {
        ProviderError::Http {
            provider,
            stage,
            message: message.into(),
            status_code: None,
        }
    }
}

/// Image intake errors.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Extension is not one of the accepted image types
    #[error("Unsupported file type for {name}: .{extension}")]
    UnsupportedExtension { name: String, extension: String },

    /// File contents do not look like an image
    #[error("Not a valid image: {name} ({message})")]
    InvalidImage { name: String, message: String },

    /// File exceeds size limit
    #[error("File too large: {name} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        name: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// File could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Post recorder errors.
#[derive(Error, Debug)]
pub enum RecordError {
    /// CSV encoding or decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Postcraft results.
pub type Result<T> = std::result::Result<T, PostcraftError>;

/// Convenience type alias for provider call results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
