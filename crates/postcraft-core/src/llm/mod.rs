//! LLM integration for image analysis and post composition.
//!
//! Provides a provider abstraction over four hosted backends (Gemini, OpenAI,
//! Claude, Groq) and a dispatcher that routes by provider tag and reduces
//! every outcome to "text or nothing".

pub(crate) mod anthropic;
pub(crate) mod dispatcher;
pub(crate) mod gemini;
pub(crate) mod groq;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod sse;

pub use anthropic::{media_type_for_filename, AnthropicProvider};
pub use dispatcher::{Dispatcher, GenerationOptions};
pub use gemini::{GeminiProvider, GeminiSettings};
pub use groq::{GroqProvider, DEFAULT_SYSTEM_PROMPT};
pub use openai::OpenAiProvider;
pub use provider::{resolve_env_var, ChatRequest, ImageInput, LlmProvider, LlmRequest, LlmResponse};
