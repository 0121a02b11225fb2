//! Daily secret roller.
//!
//! Once per UTC day the app rolls for a rare easter egg. The roll is split
//! into [`decide`], which only needs a random source, and [`roll_or_replay`],
//! which adds the store read and write around it.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::KEY_SECRET_SEED;
use crate::date::DateKey;
use crate::seed::pick_salted;
use crate::store::{Store, StoreExt};

/// Identifier of each secret kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretId {
    MoonFragment,
    MysteryBottle,
    LostStarStone,
    ProphecyLine,
    ArcanaHalf,
    EasterAurora,
}

/// Static description of a secret kind.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SecretKind {
    pub id: SecretId,
    pub label: &'static str,
    pub desc: &'static str,
}

pub static SECRET_POOL: [SecretKind; 6] = [
    SecretKind {
        id: SecretId::MoonFragment,
        label: "Moon Fragment",
        desc: "Cards glow with shattered moonlight borders, echoing softly in the night wind.",
    },
    SecretKind {
        id: SecretId::MysteryBottle,
        label: "Mystery Bottle",
        desc: "A hidden star-whisper is buried inside the Dream Bottle.",
    },
    SecretKind {
        id: SecretId::LostStarStone,
        label: "Lost Star Stone",
        desc: "Pixel constellations twinkle twice as fast, glowing briefly when near the Star Stone.",
    },
    SecretKind {
        id: SecretId::ProphecyLine,
        label: "Prophecy Line",
        desc: "A single line of prophecy appears on the homepage, meant only for tonight.",
    },
    SecretKind {
        id: SecretId::ArcanaHalf,
        label: "Hidden Card · 0.5",
        desc: "Adds a Major Arcana 0.5: 'The Between'.",
    },
    SecretKind {
        id: SecretId::EasterAurora,
        label: "Secret Aurora",
        desc: "Background shifts to an aurora halo, glowing throughout the night.",
    },
];

pub static PROPHECY_LINES: [&str; 5] = [
    "Moonlight tucks the answer around the corner, keeping a lamp on for the passing self.",
    "The night wind flips an old dream over, carrying a seed of glimmering light.",
    "Look up at the crack in the ceiling; it might open right into a sea of stars.",
    "Fold the unsent letter into a boat, floating in a glass waiting for a moon tide.",
    "Even a speck of dust knows the way home, as long as the light stays on.",
];

/// Extra data attached to a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub line: String,
}

/// The outcome of one day's roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySecretRecord {
    pub date: DateKey,
    pub hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SecretId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<SecretPayload>,
}

impl DailySecretRecord {
    #[must_use]
    pub const fn miss(date: DateKey) -> Self {
        Self {
            date,
            hit: false,
            id: None,
            payload: None,
        }
    }

    /// True when today's roll unlocked `id`.
    #[must_use]
    pub fn is(&self, id: SecretId) -> bool {
        self.hit && self.id == Some(id)
    }
}

/// A resolved hit, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSecret {
    pub kind: &'static SecretKind,
    pub payload: Option<SecretPayload>,
}

impl ActiveSecret {
    #[must_use]
    pub fn prophecy(&self) -> Option<&str> {
        self.payload.as_ref().map(|p| p.line.as_str())
    }
}

#[must_use]
pub fn secret_kind(id: SecretId) -> &'static SecretKind {
    SECRET_POOL
        .iter()
        .find(|kind| kind.id == id)
        .unwrap_or(&SECRET_POOL[0])
}

/// Roll a fresh record for `today`. Draws exactly one `[0, 1)` sample for the
/// hit check, plus the kind and prophecy picks on a hit.
pub fn decide<R: Rng + ?Sized>(today: DateKey, rng: &mut R, hit_probability: f64) -> DailySecretRecord {
    let roll: f64 = rng.r#gen();
    if roll >= hit_probability {
        return DailySecretRecord::miss(today);
    }
    let kind = &SECRET_POOL[rng.gen_range(0..SECRET_POOL.len())];
    let payload = (kind.id == SecretId::ProphecyLine).then(|| SecretPayload {
        line: PROPHECY_LINES[rng.gen_range(0..PROPHECY_LINES.len())].to_string(),
    });
    DailySecretRecord {
        date: today,
        hit: true,
        id: Some(kind.id),
        payload,
    }
}

/// Return today's stored record, or roll and persist a new one.
///
/// A stored record for another day is ignored and overwritten. When the store
/// cannot be read or written the roll still happens; it just is not remembered.
pub fn roll_or_replay<S, R>(
    today: &DateKey,
    store: &S,
    rng: &mut R,
    hit_probability: f64,
) -> DailySecretRecord
where
    S: Store + ?Sized,
    R: Rng + ?Sized,
{
    if let Some(mut existing) = store.load::<DailySecretRecord>(KEY_SECRET_SEED)
        && &existing.date == today
    {
        if existing.is(SecretId::ProphecyLine) && existing.payload.is_none() {
            existing.payload = Some(SecretPayload {
                line: PROPHECY_LINES[rng.gen_range(0..PROPHECY_LINES.len())].to_string(),
            });
            debug!("filled missing prophecy line for {today}");
            store.persist(KEY_SECRET_SEED, &existing);
        }
        return existing;
    }

    let record = decide(today.clone(), rng, hit_probability);
    debug!("secret roll for {today}: hit={} id={:?}", record.hit, record.id);
    store.persist(KEY_SECRET_SEED, &record);
    record
}

/// Resolve a record into its secret kind. A prophecy hit that lost its line
/// and could not be repaired in the store shows a line picked from its date,
/// so it stays the same all day.
#[must_use]
pub fn active_secret(record: &DailySecretRecord) -> Option<ActiveSecret> {
    if !record.hit {
        return None;
    }
    let kind = secret_kind(record.id?);
    let payload = match (&record.payload, kind.id) {
        (Some(payload), _) => Some(payload.clone()),
        (None, SecretId::ProphecyLine) => pick_salted(&PROPHECY_LINES, record.date.as_str(), 0)
            .map(|line| SecretPayload {
                line: (*line).to_string(),
            }),
        (None, _) => None,
    };
    Some(ActiveSecret { kind, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UnavailableStore};
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use rand_chacha::ChaCha8Rng;

    fn day(value: &str) -> DateKey {
        DateKey::parse(value).unwrap()
    }

    #[test]
    fn certain_hit_picks_from_pool() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let record = decide(day("2024-05-01"), &mut rng, 1.0);
        assert!(record.hit);
        let id = record.id.unwrap();
        assert!(SECRET_POOL.iter().any(|k| k.id == id));
        assert_eq!(record.payload.is_some(), id == SecretId::ProphecyLine);
    }

    #[test]
    fn zero_probability_never_hits() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            assert!(!decide(day("2024-05-01"), &mut rng, 0.0).hit);
        }
    }

    #[test]
    fn low_sample_hits_at_one_percent() {
        // StepRng at zero yields a 0.0 sample, below the 1% threshold.
        let mut rng = StepRng::new(0, 0);
        let record = decide(day("2024-05-01"), &mut rng, 0.01);
        assert!(record.hit);
        assert_eq!(record.id, Some(SecretId::MoonFragment));
    }

    #[test]
    fn replay_is_identical_within_a_day() {
        let store = MemoryStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let today = day("2024-05-02");
        let first = roll_or_replay(&today, &store, &mut rng, 0.5);
        for _ in 0..10 {
            assert_eq!(roll_or_replay(&today, &store, &mut rng, 0.5), first);
        }
    }

    #[test]
    fn new_day_rolls_again() {
        let store = MemoryStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let first = roll_or_replay(&day("2024-05-02"), &store, &mut rng, 0.0);
        let second = roll_or_replay(&day("2024-05-03"), &store, &mut rng, 0.0);
        assert_eq!(first.date.as_str(), "2024-05-02");
        assert_eq!(second.date.as_str(), "2024-05-03");
    }

    #[test]
    fn unavailable_store_still_returns_a_record() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let record = roll_or_replay(&day("2024-05-04"), &UnavailableStore, &mut rng, 0.0);
        assert_eq!(record, DailySecretRecord::miss(day("2024-05-04")));
    }

    #[test]
    fn stored_shape_uses_kebab_ids() {
        let record = DailySecretRecord {
            date: day("2024-05-05"),
            hit: true,
            id: Some(SecretId::ArcanaHalf),
            payload: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "arcana-half");
        assert!(json.get("payload").is_none());
    }

    fn lineless_prophecy(date: &str) -> DailySecretRecord {
        DailySecretRecord {
            date: day(date),
            hit: true,
            id: Some(SecretId::ProphecyLine),
            payload: None,
        }
    }

    #[test]
    fn active_secret_fills_missing_prophecy() {
        let record = lineless_prophecy("2024-05-06");
        let active = active_secret(&record).unwrap();
        assert!(PROPHECY_LINES.contains(&active.prophecy().unwrap()));
        assert_eq!(active_secret(&record), Some(active));
        assert!(active_secret(&DailySecretRecord::miss(day("2024-05-06"))).is_none());
    }

    #[test]
    fn replay_repairs_prophecy_line_once() {
        let store = MemoryStore::new();
        let today = day("2024-05-07");
        assert!(store.persist(KEY_SECRET_SEED, &lineless_prophecy("2024-05-07")));

        let mut lines = std::collections::HashSet::new();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let record = roll_or_replay(&today, &store, &mut rng, 0.0);
            let active = active_secret(&record).unwrap();
            lines.insert(active.prophecy().unwrap().to_string());
        }
        assert_eq!(lines.len(), 1);

        let stored: DailySecretRecord = store.load(KEY_SECRET_SEED).unwrap();
        assert_eq!(
            stored.payload.map(|p| p.line),
            lines.into_iter().next()
        );
    }
}
