//! Core data types shared across the library.
//!
//! Slots, analyses, drafts and persisted posts, plus the provider tag that
//! the dispatcher routes on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of images a session holds at once.
pub const MAX_SLOTS: usize = 3;

/// Hosted generation APIs Postcraft can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    Claude,
    Groq,
}

impl Provider {
    /// Every provider, in menu order.
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::OpenAi,
        Provider::Claude,
        Provider::Groq,
    ];

    /// Environment variable that holds this provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// Human-readable name for menus and messages.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAi => "OpenAI Vision",
            Provider::Claude => "Claude",
            Provider::Groq => "Groq",
        }
    }

    /// Whether temperature and top_p are forwarded to this provider.
    pub fn supports_sampling(&self) -> bool {
        matches!(self, Provider::Gemini | Provider::Groq)
    }

    /// Whether the provider can take an image in the request.
    pub fn accepts_images(&self) -> bool {
        !matches!(self, Provider::Groq)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Claude => "claude",
            Provider::Groq => "groq",
        };
        f.write_str(tag)
    }
}

/// Error returned when a provider tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    /// Parse a provider tag. "OpenAI" and "OpenAI Vision" name the same provider.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" | "openai vision" => Ok(Provider::OpenAi),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "groq" => Ok(Provider::Groq),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// One of the three per-session image positions, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// All slot positions in display order.
    pub const ALL: [SlotIndex; MAX_SLOTS] = [SlotIndex(1), SlotIndex(2), SlotIndex(3)];

    /// Build a slot index, returning `None` outside `1..=3`.
    pub fn new(index: u8) -> Option<Self> {
        (1..=MAX_SLOTS as u8).contains(&index).then_some(Self(index))
    }

    /// Slot for the n-th uploaded file (0-based position).
    pub fn from_position(position: usize) -> Option<Self> {
        u8::try_from(position + 1).ok().and_then(Self::new)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("slot index must be 1..={MAX_SLOTS}, got {value}"))
    }
}

impl From<SlotIndex> for u8 {
    fn from(slot: SlotIndex) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded image held in a session slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub index: SlotIndex,
    pub raw_bytes: Vec<u8>,
    /// Original file name as uploaded
    pub filename: String,
    /// MIME type inferred from the file name (e.g., "image/png")
    pub mime_type: String,
}

/// A user request to analyze one slot's image.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub slot_index: SlotIndex,
    pub prompt: String,
    pub provider: Provider,
    pub model_name: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: u32,
}

/// The live analysis for a slot. At most one per slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub slot_index: SlotIndex,
    pub text: String,
}

/// User caption and hashtags layered over an existing analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub slot_index: SlotIndex,
    pub analysis_text: String,
    pub caption: String,
    pub hashtags: String,
}

/// One row of the persisted post table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPost {
    #[serde(rename = "Image")]
    pub image_filename: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Caption")]
    pub caption: String,
    #[serde(rename = "Hashtags")]
    pub hashtags: String,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role-tagged message in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// MIME type for an image file name, keyed on its extension.
///
/// `.jpg` maps to `image/jpeg`; any other extension `ext` maps to `image/ext`.
pub fn mime_type_for_filename(filename: &str) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" => "image/jpeg".to_string(),
        "" => {
            tracing::warn!("No extension on '{filename}', defaulting to image/jpeg");
            "image/jpeg".to_string()
        }
        other => format!("image/{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tag_aliases() {
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Gemini));
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("OpenAI Vision".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("openai-vision".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("Claude".parse::<Provider>(), Ok(Provider::Claude));
        assert_eq!("anthropic".parse::<Provider>(), Ok(Provider::Claude));
        assert_eq!(" groq ".parse::<Provider>(), Ok(Provider::Groq));
    }

    #[test]
    fn test_unknown_provider_tag() {
        let err = "Meta-Llama".parse::<Provider>().unwrap_err();
        assert_eq!(err, UnknownProvider("Meta-Llama".to_string()));
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn test_sampling_support() {
        assert!(Provider::Gemini.supports_sampling());
        assert!(!Provider::OpenAi.supports_sampling());
        assert!(!Provider::Claude.supports_sampling());
        assert!(!Provider::Groq.accepts_images());
    }

    #[test]
    fn test_slot_index_bounds() {
        assert!(SlotIndex::new(0).is_none());
        assert_eq!(SlotIndex::new(1).map(|s| s.get()), Some(1));
        assert_eq!(SlotIndex::new(3).map(|s| s.get()), Some(3));
        assert!(SlotIndex::new(4).is_none());
        assert_eq!(SlotIndex::from_position(0), SlotIndex::new(1));
        assert!(SlotIndex::from_position(3).is_none());
    }

    #[test]
    fn test_mime_type_for_filename() {
        assert_eq!(mime_type_for_filename("beach.jpg"), "image/jpeg");
        assert_eq!(mime_type_for_filename("BEACH.JPG"), "image/jpeg");
        assert_eq!(mime_type_for_filename("sunset.png"), "image/png");
        assert_eq!(mime_type_for_filename("city.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for_filename("noext"), "image/jpeg");
    }
}
