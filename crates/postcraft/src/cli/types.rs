//! CLI enum types: provider and chat role choices.

use clap::ValueEnum;
use postcraft_core::{ChatRole, Provider};

/// Supported providers.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum ProviderArg {
    /// Google Gemini (file upload API)
    #[default]
    Gemini,
    /// OpenAI Vision (Chat Completions)
    #[value(alias = "openai-vision")]
    Openai,
    /// Anthropic Claude (Messages API)
    #[value(alias = "anthropic")]
    Claude,
    /// Groq (text only, streaming)
    Groq,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Gemini => Provider::Gemini,
            ProviderArg::Openai => Provider::OpenAi,
            ProviderArg::Claude => Provider::Claude,
            ProviderArg::Groq => Provider::Groq,
        }
    }
}

/// Role of a chat message sent from the command line.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum RoleArg {
    #[default]
    User,
    System,
}

impl From<RoleArg> for ChatRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => ChatRole::User,
            RoleArg::System => ChatRole::System,
        }
    }
}
