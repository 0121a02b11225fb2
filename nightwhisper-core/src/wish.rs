//! Dream Bottle wishes, one per UTC day.
use serde::{Deserialize, Serialize};

use crate::constants::KEY_DREAM_WISHES;
use crate::date::DateKey;
use crate::secret::{DailySecretRecord, SecretId};
use crate::store::{Store, StoreExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishRecord {
    pub date: DateKey,
    pub text: String,
    /// Unix milliseconds of the last edit.
    pub time: i64,
}

/// Whispers hidden in the bottle on `mystery-bottle` days.
pub static BOTTLE_LINES: [&str; 4] = [
    "A line hides under the cork: the shorter the wish, the faster the moonlight writes back.",
    "The mystery bottle hums softly, as if an unfinished spell is tucked inside.",
    "Tonight the bottle catches falling stars, and your words will be lit up.",
    "Don't cork it yet; let the sentence take a breath of starlit air first.",
];

/// The bottle's whisper for a `mystery-bottle` day, chosen by the date's
/// `YYYYMMDD` number so it holds all day.
#[must_use]
pub fn bottle_line(record: &DailySecretRecord) -> Option<&'static str> {
    if !record.is(SecretId::MysteryBottle) {
        return None;
    }
    let digits: String = record.date.as_str().chars().filter(char::is_ascii_digit).collect();
    let seed = digits.parse::<u64>().unwrap_or(0);
    let len = BOTTLE_LINES.len() as u64;
    usize::try_from(seed % len)
        .ok()
        .and_then(|idx| BOTTLE_LINES.get(idx))
        .copied()
}

/// Persisted wish list, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WishBottle {
    items: Vec<WishRecord>,
    cap: usize,
}

impl WishBottle {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
        }
    }

    pub fn load<S: Store + ?Sized>(store: &S, cap: usize) -> Self {
        let mut items: Vec<WishRecord> = store.load(KEY_DREAM_WISHES).unwrap_or_default();
        items.truncate(cap);
        Self { items, cap }
    }

    pub fn save<S: Store + ?Sized>(&self, store: &S) -> bool {
        store.persist(KEY_DREAM_WISHES, &self.items)
    }

    #[must_use]
    pub fn items(&self) -> &[WishRecord] {
        &self.items
    }

    #[must_use]
    pub fn for_day(&self, day: &DateKey) -> Option<&WishRecord> {
        self.items.iter().find(|wish| &wish.date == day)
    }

    /// Replace today's wish with `text`. Blank text clears it and returns
    /// `None`; otherwise the wish moves to the front.
    pub fn write(&mut self, today: &DateKey, text: &str, time: i64) -> Option<&WishRecord> {
        self.items.retain(|wish| &wish.date != today);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.items.insert(
            0,
            WishRecord {
                date: today.clone(),
                text: text.to_string(),
                time,
            },
        );
        self.items.truncate(self.cap.max(1));
        self.items.first()
    }
}
