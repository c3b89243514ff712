//! Per-session state, keyed by slot.
//!
//! The store is a plain value that callers own and pass by `&mut`; nothing
//! in it is global. Each slot keeps its image, prompt, latest analysis,
//! caption, hashtags and composed post. The chat history is session-wide.

use crate::types::{
    AnalysisResult, ChatMessage, ImageSlot, PostDraft, SlotIndex, MAX_SLOTS,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct SlotEntry {
    image: Option<ImageSlot>,
    prompt: String,
    analysis: Option<AnalysisResult>,
    caption: String,
    hashtags: String,
    composed: Option<String>,
}

impl SlotEntry {
    fn reset_results(&mut self) {
        self.analysis = None;
        self.composed = None;
    }
}

/// Session-scoped store for up to three image slots.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    slots: BTreeMap<SlotIndex, SlotEntry>,
    chat: Vec<ChatMessage>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded images, numbering them by position.
    ///
    /// Images past the third are dropped; the number dropped is returned.
    /// A slot whose image is unchanged keeps its analysis. A slot whose image
    /// changed or went away loses its analysis and composed post but keeps
    /// the text the user typed.
    pub fn set_images(&mut self, images: Vec<ImageSlot>) -> usize {
        let truncated = images.len().saturating_sub(MAX_SLOTS);
        if truncated > 0 {
            tracing::warn!(
                "{} images uploaded, only the first {MAX_SLOTS} are kept",
                images.len()
            );
        }

        let mut incoming: BTreeMap<SlotIndex, ImageSlot> = images
            .into_iter()
            .take(MAX_SLOTS)
            .enumerate()
            .filter_map(|(position, mut image)| {
                let index = SlotIndex::from_position(position)?;
                image.index = index;
                Some((index, image))
            })
            .collect();

        for index in SlotIndex::ALL {
            let next = incoming.remove(&index);
            let entry = self.slots.entry(index).or_default();
            let unchanged = match (&entry.image, &next) {
                (Some(old), Some(new)) => {
                    old.filename == new.filename && old.raw_bytes == new.raw_bytes
                }
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                entry.reset_results();
                entry.image = next;
            }
        }

        truncated
    }

    /// Image loaded in a slot.
    pub fn image(&self, slot: SlotIndex) -> Option<&ImageSlot> {
        self.slots.get(&slot).and_then(|e| e.image.as_ref())
    }

    /// Loaded images in slot order.
    pub fn images(&self) -> impl Iterator<Item = &ImageSlot> {
        self.slots.values().filter_map(|e| e.image.as_ref())
    }

    pub fn image_count(&self) -> usize {
        self.images().count()
    }

    pub fn set_prompt(&mut self, slot: SlotIndex, prompt: impl Into<String>) {
        self.slots.entry(slot).or_default().prompt = prompt.into();
    }

    pub fn prompt(&self, slot: SlotIndex) -> &str {
        self.slots.get(&slot).map(|e| e.prompt.as_str()).unwrap_or("")
    }

    pub fn set_caption(&mut self, slot: SlotIndex, caption: impl Into<String>) {
        self.slots.entry(slot).or_default().caption = caption.into();
    }

    pub fn caption(&self, slot: SlotIndex) -> &str {
        self.slots.get(&slot).map(|e| e.caption.as_str()).unwrap_or("")
    }

    pub fn set_hashtags(&mut self, slot: SlotIndex, hashtags: impl Into<String>) {
        self.slots.entry(slot).or_default().hashtags = hashtags.into();
    }

    pub fn hashtags(&self, slot: SlotIndex) -> &str {
        self.slots.get(&slot).map(|e| e.hashtags.as_str()).unwrap_or("")
    }

    /// Store an analysis, replacing any earlier one for the same slot.
    ///
    /// A composed post built on the old analysis is discarded.
    pub fn store_analysis(&mut self, result: AnalysisResult) {
        let entry = self.slots.entry(result.slot_index).or_default();
        entry.composed = None;
        entry.analysis = Some(result);
    }

    pub fn analysis(&self, slot: SlotIndex) -> Option<&AnalysisResult> {
        self.slots.get(&slot).and_then(|e| e.analysis.as_ref())
    }

    /// Draft for composition. `None` until the slot has an analysis.
    pub fn draft(&self, slot: SlotIndex) -> Option<PostDraft> {
        let entry = self.slots.get(&slot)?;
        let analysis = entry.analysis.as_ref()?;
        Some(PostDraft {
            slot_index: slot,
            analysis_text: analysis.text.clone(),
            caption: entry.caption.clone(),
            hashtags: entry.hashtags.clone(),
        })
    }

    pub fn set_composed(&mut self, slot: SlotIndex, text: impl Into<String>) {
        self.slots.entry(slot).or_default().composed = Some(text.into());
    }

    pub fn composed(&self, slot: SlotIndex) -> Option<&str> {
        self.slots.get(&slot).and_then(|e| e.composed.as_deref())
    }

    /// Forget everything about one slot, including its image.
    pub fn clear_slot(&mut self, slot: SlotIndex) {
        self.slots.remove(&slot);
    }

    /// Forget all slots and the chat history.
    pub fn clear_all(&mut self) {
        self.slots.clear();
        self.chat.clear();
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    /// Drop the most recent chat turn.
    pub fn pop_chat(&mut self) -> Option<ChatMessage> {
        self.chat.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;

    fn image(name: &str, byte: u8) -> ImageSlot {
        ImageSlot {
            index: SlotIndex::new(1).unwrap(),
            raw_bytes: vec![byte; 4],
            filename: name.to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    fn slot(n: u8) -> SlotIndex {
        SlotIndex::new(n).unwrap()
    }

    #[test]
    fn test_four_images_keep_three() {
        let mut session = SessionStore::new();
        let dropped = session.set_images(vec![
            image("a.png", 1),
            image("b.png", 2),
            image("c.png", 3),
            image("d.png", 4),
        ]);
        assert_eq!(dropped, 1);
        assert_eq!(session.image_count(), 3);
        assert_eq!(session.image(slot(3)).unwrap().filename, "c.png");
        assert_eq!(session.image(slot(3)).unwrap().index, slot(3));
    }

    #[test]
    fn test_zero_to_three_images_kept_exactly() {
        for n in 0..=3u8 {
            let mut session = SessionStore::new();
            let images = (0..n).map(|i| image(&format!("{i}.png"), i)).collect();
            assert_eq!(session.set_images(images), 0);
            assert_eq!(session.image_count(), n as usize);
        }
    }

    #[test]
    fn test_reanalysis_overwrites() {
        let mut session = SessionStore::new();
        session.set_images(vec![image("a.png", 1)]);
        session.store_analysis(AnalysisResult {
            slot_index: slot(1),
            text: "first".to_string(),
        });
        session.set_composed(slot(1), "post");
        session.store_analysis(AnalysisResult {
            slot_index: slot(1),
            text: "second".to_string(),
        });
        assert_eq!(session.analysis(slot(1)).unwrap().text, "second");
        assert!(session.composed(slot(1)).is_none());
    }

    #[test]
    fn test_same_upload_keeps_analysis_new_upload_resets() {
        let mut session = SessionStore::new();
        session.set_images(vec![image("a.png", 1), image("b.png", 2)]);
        session.set_prompt(slot(2), "mood?");
        for n in [1, 2] {
            session.store_analysis(AnalysisResult {
                slot_index: slot(n),
                text: format!("analysis {n}"),
            });
        }

        session.set_images(vec![image("a.png", 1), image("z.png", 9)]);
        assert!(session.analysis(slot(1)).is_some());
        assert!(session.analysis(slot(2)).is_none());
        assert_eq!(session.prompt(slot(2)), "mood?");
    }

    #[test]
    fn test_draft_requires_analysis() {
        let mut session = SessionStore::new();
        session.set_images(vec![image("a.png", 1)]);
        session.set_caption(slot(1), "Golden hour");
        session.set_hashtags(slot(1), "#sun");
        assert!(session.draft(slot(1)).is_none());

        session.store_analysis(AnalysisResult {
            slot_index: slot(1),
            text: "Warm light".to_string(),
        });
        let draft = session.draft(slot(1)).unwrap();
        assert_eq!(draft.analysis_text, "Warm light");
        assert_eq!(draft.caption, "Golden hour");
        assert_eq!(draft.hashtags, "#sun");
    }

    #[test]
    fn test_slots_are_independent() {
        let mut session = SessionStore::new();
        session.set_prompt(slot(1), "one");
        session.set_prompt(slot(2), "two");
        session.clear_slot(slot(1));
        assert_eq!(session.prompt(slot(1)), "");
        assert_eq!(session.prompt(slot(2)), "two");
    }

    #[test]
    fn test_clear_all() {
        let mut session = SessionStore::new();
        session.set_images(vec![image("a.png", 1)]);
        session.push_chat(ChatMessage::new(ChatRole::User, "hi"));
        session.clear_all();
        assert_eq!(session.image_count(), 0);
        assert!(session.chat_history().is_empty());
    }
}
