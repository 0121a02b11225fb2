//! Tarot reference data, mood inference, and deck handling.
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::constants::SPREAD_CARD_COUNT;
use crate::secret::{DailySecretRecord, SecretId};

/// A card definition. Read-only reference data.
#[derive(Debug, PartialEq, Serialize)]
pub struct TarotCard {
    pub id: &'static str,
    pub index: f32,
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

impl TarotCard {
    /// Keyword at `idx`, skipping blanks.
    #[must_use]
    pub fn keyword(&self, idx: usize) -> Option<&'static str> {
        self.keywords
            .iter()
            .copied()
            .filter(|k| !k.trim().is_empty())
            .nth(idx)
    }
}

macro_rules! card {
    ($id:literal, $index:literal, $name:literal, [$($kw:literal),* $(,)?]) => {
        TarotCard { id: $id, index: $index, name: $name, keywords: &[$($kw),*] }
    };
}

pub static MAJOR_ARCANA: [TarotCard; 22] = [
    card!("fool", 0.0, "The Fool", ["new beginnings", "spontaneity", "leap of faith"]),
    card!("magician", 1.0, "The Magician", ["willpower", "skill", "manifestation"]),
    card!("priestess", 2.0, "The High Priestess", ["intuition", "mystery", "inner voice"]),
    card!("empress", 3.0, "The Empress", ["care", "abundance", "growth"]),
    card!("emperor", 4.0, "The Emperor", ["structure", "authority", "stability"]),
    card!("hierophant", 5.0, "The Hierophant", ["tradition", "guidance", "belonging"]),
    card!("lovers", 6.0, "The Lovers", ["connection", "choice", "harmony"]),
    card!("chariot", 7.0, "The Chariot", ["determination", "drive", "victory"]),
    card!("strength", 8.0, "Strength", ["courage", "patience", "gentle power"]),
    card!("hermit", 9.0, "The Hermit", ["solitude", "reflection", "inner light"]),
    card!("wheeloffortune", 10.0, "Wheel of Fortune", ["cycles", "chance", "turning point"]),
    card!("justice", 11.0, "Justice", ["fairness", "truth", "decision"]),
    card!("hangedman", 12.0, "The Hanged Man", ["pause", "surrender", "new perspective"]),
    card!("death", 13.0, "Death", ["endings", "transition", "rebirth"]),
    card!("temperance", 14.0, "Temperance", ["balance", "mixing", "patience"]),
    card!("devil", 15.0, "The Devil", ["attachment", "shadow", "temptation"]),
    card!("tower", 16.0, "The Tower", ["upheaval", "revelation", "truth"]),
    card!("star", 17.0, "The Star", ["hope", "renewal", "serenity"]),
    card!("moon", 18.0, "The Moon", ["dream", "illusion", "intuition"]),
    card!("sun", 19.0, "The Sun", ["joy", "warmth", "vitality"]),
    card!("judgement", 20.0, "Judgement", ["awakening", "calling", "reckoning"]),
    card!("world", 21.0, "The World", ["completion", "wholeness", "alignment"]),
];

/// The hidden "0.5" card, only in the deck on an arcana-half secret day.
pub static ARCANA_HALF: TarotCard = card!(
    "arcana-0-5",
    0.5,
    "The Between",
    ["threshold", "moonlit choice", "liminal promise"]
);

#[must_use]
pub fn card_by_id(id: &str) -> Option<&'static TarotCard> {
    MAJOR_ARCANA
        .iter()
        .chain(std::iter::once(&ARCANA_HALF))
        .find(|card| card.id == id)
}

const CARD_MOOD_OVERRIDES: [(&str, &str); 12] = [
    ("hermit", "introspection"),
    ("priestess", "intuition"),
    ("moon", "intuition"),
    ("star", "hope"),
    ("sun", "optimism"),
    ("lovers", "optimism"),
    ("death", "rebirth"),
    ("tower", "truth"),
    ("wheeloffortune", "fate"),
    ("temperance", "balance"),
    ("devil", "shadow"),
    ("judgement", "awakening"),
];

const MOOD_PATTERNS: [(&str, &str); 6] = [
    ("optimism", r"joy|warmth|clarity|growth|hope|connection|alignment"),
    ("introspection", r"intuition|dream|silence|reflection|solitude|inner"),
    ("change", r"change|transition|cycles|rebirth|chance"),
    ("clarity", r"responsibility|structure|truth|decision|fairness"),
    ("soothing", r"care|comfort|healing|patience|balance|mixing"),
    ("momentum", r"drive|determination|power|willpower"),
];

fn mood_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        MOOD_PATTERNS
            .iter()
            .filter_map(|(mood, pattern)| Regex::new(pattern).ok().map(|re| (*mood, re)))
            .collect()
    })
}

/// Emotion key for a card: the override table first, then keyword classes in
/// priority order, then `"mystery"`. No card at all reads as `"intuition"`.
#[must_use]
pub fn infer_card_mood(card: Option<&TarotCard>) -> &'static str {
    let Some(card) = card else {
        return "intuition";
    };
    if let Some((_, mood)) = CARD_MOOD_OVERRIDES.iter().find(|(id, _)| *id == card.id) {
        return *mood;
    }
    let text = card.keywords.join(" ").to_lowercase();
    mood_patterns()
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map_or("mystery", |(mood, _)| *mood)
}

/// Cards available today.
#[must_use]
pub fn card_pool(secret: Option<&DailySecretRecord>) -> Vec<&'static TarotCard> {
    let mut pool: Vec<&'static TarotCard> = MAJOR_ARCANA.iter().collect();
    if secret.is_some_and(|record| record.is(SecretId::ArcanaHalf)) {
        pool.push(&ARCANA_HALF);
    }
    pool
}

/// Three distinct cards for a past/present/future spread, or `None` if the
/// pool is too small.
pub fn draw_spread<R: Rng + ?Sized>(
    pool: &[&'static TarotCard],
    rng: &mut R,
) -> Option<[&'static TarotCard; SPREAD_CARD_COUNT]> {
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    match shuffled.as_slice() {
        [past, present, future, ..] => Some([*past, *present, *future]),
        _ => None,
    }
}

/// Between one and `max` distinct cards, as the chat oracle draws them.
pub fn draw_some<R: Rng + ?Sized>(
    pool: &[&'static TarotCard],
    max: usize,
    rng: &mut R,
) -> Vec<&'static TarotCard> {
    if pool.is_empty() || max == 0 {
        return Vec::new();
    }
    let count = rng.gen_range(1..=max.min(pool.len()));
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(count);
    shuffled
}

/// A shuffled draw pile that refills itself from the pool when empty.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    pile: Vec<&'static TarotCard>,
}

impl Deck {
    pub fn shuffled<R: Rng + ?Sized>(pool: &[&'static TarotCard], rng: &mut R) -> Self {
        let mut pile = pool.to_vec();
        pile.shuffle(rng);
        Self { pile }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pile.len()
    }

    /// Take the top card, reshuffling `pool` first if the pile ran out.
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        pool: &[&'static TarotCard],
        rng: &mut R,
    ) -> Option<&'static TarotCard> {
        if self.pile.is_empty() {
            *self = Self::shuffled(pool, rng);
        }
        self.pile.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::DateKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn overrides_win_over_keywords() {
        assert_eq!(infer_card_mood(card_by_id("sun")), "optimism");
        assert_eq!(infer_card_mood(card_by_id("wheeloffortune")), "fate");
    }

    #[test]
    fn keyword_classes_follow_priority() {
        assert_eq!(infer_card_mood(card_by_id("empress")), "optimism");
        assert_eq!(infer_card_mood(card_by_id("emperor")), "clarity");
        assert_eq!(infer_card_mood(card_by_id("strength")), "soothing");
        assert_eq!(infer_card_mood(card_by_id("chariot")), "momentum");
        assert_eq!(infer_card_mood(card_by_id("fool")), "mystery");
        assert_eq!(infer_card_mood(None), "intuition");
    }

    #[test]
    fn hidden_card_only_on_arcana_half_days() {
        let date = DateKey::parse("2024-07-01").unwrap();
        let miss = DailySecretRecord::miss(date.clone());
        assert_eq!(card_pool(Some(&miss)).len(), 22);
        let hit = DailySecretRecord {
            date,
            hit: true,
            id: Some(SecretId::ArcanaHalf),
            payload: None,
        };
        let pool = card_pool(Some(&hit));
        assert_eq!(pool.len(), 23);
        assert!(pool.iter().any(|c| c.id == ARCANA_HALF.id));
    }

    #[test]
    fn spread_cards_are_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let pool = card_pool(None);
        for _ in 0..50 {
            let spread = draw_spread(&pool, &mut rng).unwrap();
            let ids: HashSet<_> = spread.iter().map(|c| c.id).collect();
            assert_eq!(ids.len(), 3);
        }
        assert!(draw_spread(&pool[..2], &mut rng).is_none());
    }

    #[test]
    fn chat_draws_between_one_and_max() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let pool = card_pool(None);
        for _ in 0..50 {
            let drawn = draw_some(&pool, 3, &mut rng);
            assert!((1..=3).contains(&drawn.len()));
        }
    }

    #[test]
    fn deck_refills_when_exhausted() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pool = card_pool(None);
        let mut deck = Deck::shuffled(&pool, &mut rng);
        let mut seen = HashSet::new();
        for _ in 0..22 {
            seen.insert(deck.draw(&pool, &mut rng).unwrap().id);
        }
        assert_eq!(seen.len(), 22);
        assert_eq!(deck.remaining(), 0);
        assert!(deck.draw(&pool, &mut rng).is_some());
        assert_eq!(deck.remaining(), 21);
    }
}
