//! Final post synthesis from an analysis plus the user's caption and hashtags.

use crate::config::ComposerConfig;
use crate::llm::{Dispatcher, GenerationOptions};
use crate::session::SessionStore;
use crate::types::{PostDraft, Provider, SlotIndex};

/// Builds the synthesis prompt and sends it as a text-only request.
pub struct PostComposer {
    config: ComposerConfig,
}

impl PostComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Compose a final post for a slot.
    ///
    /// Returns `None` when the slot has no analysis yet or the provider gave
    /// nothing back. The session is only read.
    pub async fn compose(
        &self,
        dispatcher: &Dispatcher,
        session: &SessionStore,
        slot: SlotIndex,
        provider: Provider,
        options: &GenerationOptions,
    ) -> Option<String> {
        let Some(draft) = session.draft(slot) else {
            tracing::warn!(slot = %slot, "Analyze the image before composing a post");
            return None;
        };

        let prompt = self.build_prompt(&draft);
        let text = dispatcher.process_with(provider, None, &prompt, options).await?;
        Some(self.enforce_length(text))
    }

    /// The instruction sent to the model for one draft.
    pub fn build_prompt(&self, draft: &PostDraft) -> String {
        let hashtags = self.hashtag_list(&draft.hashtags);
        let max_tags = self.config.max_hashtags;
        let max_chars = self.config.max_post_chars;

        let caption = match draft.caption.trim() {
            "" => "The author did not supply a caption.".to_string(),
            caption => format!("Author's caption:\n{caption}"),
        };
        let tags = if hashtags.is_empty() {
            "The author did not supply hashtags.".to_string()
        } else {
            format!("Author's hashtags: {}", hashtags.join(" "))
        };

        format!(
            "You are a social media copywriter. Write the final post for the image described below.\n\n\
             Image analysis:\n{analysis}\n\n\
             {caption}\n\
             {tags}\n\n\
             Respond with:\n\
             1. A final caption that keeps the author's voice.\n\
             2. A list of relevant hashtags, at most {max_tags}, including the author's.\n\
             3. A short explanation of how the analysis and the author's input were combined.\n\
             Keep the whole response under {max_chars} characters.",
            analysis = draft.analysis_text.trim(),
        )
    }

    /// Normalize free-form hashtag input.
    ///
    /// Splits on whitespace and commas, adds a missing `#`, drops duplicates
    /// (case-insensitive, first spelling wins) and keeps at most the
    /// configured number.
    pub fn hashtag_list(&self, raw: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        raw.split(|c: char| c.is_whitespace() || c == ',')
            .map(|tag| tag.trim_start_matches('#'))
            .filter(|tag| !tag.is_empty())
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .take(self.config.max_hashtags)
            .map(|tag| format!("#{tag}"))
            .collect()
    }

    fn enforce_length(&self, text: String) -> String {
        let max = self.config.max_post_chars;
        match text.char_indices().nth(max) {
            Some((cut, _)) => {
                tracing::warn!(
                    "Composed post longer than {max} characters, truncating"
                );
                text[..cut].trim_end().to_string()
            }
            None => text,
        }
    }
}
