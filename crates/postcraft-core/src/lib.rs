//! Postcraft Core - image analysis and social post authoring library.
//!
//! Postcraft loads up to three images, sends each one with a prompt to a
//! hosted vision model, keeps the results in a session, composes a final
//! post from an analysis plus the author's caption and hashtags, and appends
//! finished posts to a CSV table.
//!
//! # Architecture
//!
//! ```text
//! Workbench → Dispatcher → LlmProvider (Gemini | OpenAI | Claude | Groq)
//!     ↓            ↓
//! SessionStore   None on any vendor failure
//!     ↓
//! PostComposer → Dispatcher (text only) → Recorder (CSV)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use postcraft_core::{AnalysisRequest, Config, Provider, SessionStore, SlotIndex, Workbench};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> postcraft_core::Result<()> {
//!     let config = Config::load()?;
//!     let bench = Workbench::from_config(&config);
//!     let mut session = SessionStore::new();
//!     bench.load_images(&mut session, &["./beach.jpg"]);
//!
//!     let request = AnalysisRequest {
//!         slot_index: SlotIndex::new(1).unwrap(),
//!         prompt: "Describe the mood of this photo".to_string(),
//!         provider: Provider::Gemini,
//!         model_name: "gemini-1.5-flash".to_string(),
//!         temperature: None,
//!         top_p: None,
//!         max_tokens: 2000,
//!     };
//!     let outcome = bench.analyze(&mut session, &request, CancellationToken::new()).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod composer;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod recorder;
pub mod session;
pub mod types;
pub mod workbench;

// Re-exports for convenient access
pub use composer::PostComposer;
pub use config::Config;
pub use error::{
    ConfigError, PostcraftError, ProviderError, ProviderResult, RecordError, Result, Stage,
    UploadError,
};
pub use intake::{ImageIntake, UploadOutcome};
pub use llm::{Dispatcher, GenerationOptions, LlmProvider};
pub use recorder::Recorder;
pub use session::SessionStore;
pub use types::{
    AnalysisRequest, AnalysisResult, ChatMessage, ChatRole, ImageSlot, PersistedPost, PostDraft,
    Provider, SlotIndex, MAX_SLOTS,
};
pub use workbench::{AnalyzeOutcome, Workbench};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_workbench_from_default_config() {
        let config = Config::default();
        let bench = Workbench::from_config(&config);
        assert_eq!(
            bench.dispatcher().settings(Provider::Gemini).default_model,
            "gemini-1.5-flash"
        );
    }
}
