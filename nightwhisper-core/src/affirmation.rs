//! Saved night affirmations.
use serde::{Deserialize, Serialize};

use crate::constants::KEY_AFFIRMATIONS;
use crate::store::{Store, StoreExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffirmationRecord {
    pub id: String,
    pub card_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_image: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub text: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub cover: bool,
}

/// The affirmation currently on screen, saved or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffirmationDraft {
    pub id: String,
    pub card_name: String,
    pub card_image: Option<String>,
    pub created_at: i64,
    pub text: String,
}

impl AffirmationDraft {
    #[must_use]
    pub fn new(card_name: Option<&str>, created_at: i64, text: impl Into<String>) -> Self {
        Self {
            id: format!("affirm-{created_at}"),
            card_name: card_name.unwrap_or("Night card").to_string(),
            card_image: None,
            created_at,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub toggle_favorite: bool,
    pub mark_cover: bool,
}

/// Persisted affirmation list, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffirmationBook {
    items: Vec<AffirmationRecord>,
    cap: usize,
}

impl AffirmationBook {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
        }
    }

    pub fn load<S: Store + ?Sized>(store: &S, cap: usize) -> Self {
        let mut items: Vec<AffirmationRecord> = store.load(KEY_AFFIRMATIONS).unwrap_or_default();
        items.truncate(cap);
        Self { items, cap }
    }

    pub fn save<S: Store + ?Sized>(&self, store: &S) -> bool {
        store.persist(KEY_AFFIRMATIONS, &self.items)
    }

    #[must_use]
    pub fn items(&self) -> &[AffirmationRecord] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AffirmationRecord> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn cover(&self) -> Option<&AffirmationRecord> {
        self.items.iter().find(|item| item.cover)
    }

    /// Save or update `draft`.
    ///
    /// An existing record keeps its flags and takes the new text; a new one
    /// goes to the front. Marking cover clears it everywhere else. Blank text
    /// is not saved.
    pub fn upsert(&mut self, draft: &AffirmationDraft, opts: SaveOptions) -> Option<&AffirmationRecord> {
        let text = draft.text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(existing) = self.items.iter_mut().find(|item| item.id == draft.id) {
            existing.text = text.to_string();
            if opts.toggle_favorite {
                existing.favorite = !existing.favorite;
            }
        } else {
            self.items.insert(
                0,
                AffirmationRecord {
                    id: draft.id.clone(),
                    card_name: draft.card_name.clone(),
                    card_image: draft.card_image.clone(),
                    created_at: draft.created_at,
                    text: text.to_string(),
                    favorite: opts.toggle_favorite,
                    cover: false,
                },
            );
            self.items.truncate(self.cap.max(1));
        }
        if opts.mark_cover {
            self.set_cover(&draft.id);
        }
        self.get(&draft.id)
    }

    /// Make `id` the only cover. Unknown ids leave everything untouched.
    pub fn set_cover(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        for item in &mut self.items {
            item.cover = item.id == id;
        }
        true
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.favorite = !item.favorite;
        Some(item.favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn draft(ts: i64, text: &str) -> AffirmationDraft {
        AffirmationDraft::new(Some("The Star"), ts, text)
    }

    #[test]
    fn new_records_go_to_front_and_cap() {
        let mut book = AffirmationBook::new(2);
        book.upsert(&draft(1, "one"), SaveOptions::default());
        book.upsert(&draft(2, "two"), SaveOptions::default());
        book.upsert(&draft(3, "three"), SaveOptions::default());
        let texts: Vec<_> = book.items().iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, ["three", "two"]);
    }

    #[test]
    fn cover_moves_to_latest_marked() {
        let mut book = AffirmationBook::new(40);
        let cover = SaveOptions {
            mark_cover: true,
            ..SaveOptions::default()
        };
        book.upsert(&draft(1, "A"), cover);
        book.upsert(&draft(2, "B"), cover);
        let covers: Vec<_> = book.items().iter().filter(|a| a.cover).collect();
        assert_eq!(covers.len(), 1);
        assert_eq!(covers[0].text, "B");
    }

    #[test]
    fn resaving_updates_text_and_toggles_favorite() {
        let mut book = AffirmationBook::new(40);
        let fav = SaveOptions {
            toggle_favorite: true,
            ..SaveOptions::default()
        };
        assert!(book.upsert(&draft(1, "first"), fav).unwrap().favorite);
        let again = book.upsert(&draft(1, "edited"), fav).unwrap();
        assert!(!again.favorite);
        assert_eq!(again.text, "edited");
        assert_eq!(book.items().len(), 1);
    }

    #[test]
    fn blank_text_is_ignored() {
        let mut book = AffirmationBook::new(40);
        assert!(book.upsert(&draft(1, "   "), SaveOptions::default()).is_none());
        assert!(book.items().is_empty());
    }

    #[test]
    fn persists_camel_case() {
        let store = MemoryStore::new();
        let mut book = AffirmationBook::new(40);
        book.upsert(&draft(7, "kept"), SaveOptions::default());
        assert!(book.save(&store));
        let raw = store.raw(KEY_AFFIRMATIONS).unwrap();
        assert_eq!(raw[0]["cardName"], "The Star");
        assert_eq!(raw[0]["createdAt"], 7);
        assert_eq!(AffirmationBook::load(&store, 40), book);
    }

    #[test]
    fn unknown_cover_is_rejected() {
        let mut book = AffirmationBook::new(40);
        book.upsert(&draft(1, "A"), SaveOptions::default());
        assert!(!book.set_cover("affirm-99"));
        assert!(book.cover().is_none());
        assert_eq!(book.toggle_favorite("affirm-1"), Some(true));
    }
}
