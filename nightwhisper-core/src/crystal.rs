//! Crystal library, recommendation voting, daily grants, and the garden.
use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::OnceLock;

use crate::cards::{TarotCard, infer_card_mood};
use crate::constants::{
    CRYSTAL_COLLECTION_CAP, DAILY_CRYSTAL_LIMIT, DEFAULT_CRYSTAL_ID, DEFAULT_FOCUS_LINE,
    DEFAULT_SNAPSHOT_SOURCE, KEY_CRYSTAL_COLLECTION, KEY_DAILY_CRYSTAL,
};
use crate::date::DateKey;
use crate::moon::PhaseKey;
use crate::store::{Store, StoreExt};
use crate::usage::{self, UsageScope, UsageStatus};

/// Static definition of a collectible crystal.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystalDef {
    pub id: &'static str,
    pub name: &'static str,
    pub alias: &'static str,
    pub emoji: &'static str,
    pub guardian_for: Option<&'static str>,
    pub palette: [&'static str; 2],
    pub energy_range: (u8, u8),
    pub uses: &'static [&'static str],
    pub nightly: &'static [&'static str],
}

/// Library in declaration order. Guardian hashing indexes into this order.
pub static CRYSTAL_LIBRARY: [CrystalDef; 9] = [
    CrystalDef {
        id: "celestite",
        name: "Celestite",
        alias: "天青石",
        emoji: "✨",
        guardian_for: Some("The Star"),
        palette: ["#d0e4ff", "#8aadff"],
        energy_range: (82, 96),
        uses: &[
            "Clarity for long-range wishes",
            "Guides optimism back to the body",
            "Keeps signals soft but precise",
        ],
        nightly: &["Star-breath settles the nervous system", "Hope hum wraps around the heart"],
    },
    CrystalDef {
        id: "amethyst",
        name: "Amethyst",
        alias: "紫水晶",
        emoji: "💜",
        guardian_for: Some("The Hermit"),
        palette: ["#d4b8ff", "#8663ff"],
        energy_range: (74, 92),
        uses: &[
            "Candlelight calm for solitude",
            "Helps you hear your own pace",
            "Filters noise so inner voice gets louder",
        ],
        nightly: &["Lantern glow for introspection", "Keeps overthinking from spiraling"],
    },
    CrystalDef {
        id: "citrine",
        name: "Citrine",
        alias: "黄水晶",
        emoji: "☀️",
        guardian_for: Some("The Sun"),
        palette: ["#ffd27a", "#ffb347"],
        energy_range: (80, 95),
        uses: &[
            "Solar confidence boost",
            "Warms up creative flow",
            "Makes small wins feel celebratory",
        ],
        nightly: &["Sun-shard keeps the room bright", "Recharges optimism without burning out"],
    },
    CrystalDef {
        id: "moonstone",
        name: "Moonstone",
        alias: "月光石",
        emoji: "🌙",
        guardian_for: None,
        palette: ["#d6e6ff", "#a9c8ff"],
        energy_range: (76, 90),
        uses: &["Intuition blooms quietly", "Smooths dream recall", "Softens emotional tides"],
        nightly: &["Tonight's tides feel safer", "Dream clarity without harsh edges"],
    },
    CrystalDef {
        id: "fluorite",
        name: "Fluorite",
        alias: "萤石",
        emoji: "🌀",
        guardian_for: None,
        palette: ["#a3ffef", "#6bd4ff"],
        energy_range: (70, 88),
        uses: &[
            "Organizes scattered thoughts",
            "Keeps focus gentle",
            "Good for writing clean wishes",
        ],
        nightly: &["Tidies the mind before sleep", "Lights up tiny next steps"],
    },
    CrystalDef {
        id: "rosequartz",
        name: "Rose Quartz",
        alias: "粉晶",
        emoji: "🌸",
        guardian_for: None,
        palette: ["#ffc1d9", "#ff9bb7"],
        energy_range: (68, 86),
        uses: &[
            "Heart-soft reminder",
            "Invites self-compassion",
            "Good for bedtime affirmations",
        ],
        nightly: &["Keeps the heart volume low and warm", "Catches harsh self-talk mid-air"],
    },
    CrystalDef {
        id: "labradorite",
        name: "Labradorite",
        alias: "拉长石",
        emoji: "🌌",
        guardian_for: None,
        palette: ["#9bc8ff", "#6ba7e6"],
        energy_range: (72, 90),
        uses: &[
            "Weather shield + intuition boost",
            "Great for cloudy moods",
            "Helps reframe uncertainty",
        ],
        nightly: &[
            "Aurora flicker strengthens boundaries",
            "For stormy nights + creative pivots",
        ],
    },
    CrystalDef {
        id: "obsidian",
        name: "Obsidian",
        alias: "黑曜石",
        emoji: "🖤",
        guardian_for: None,
        palette: ["#2c2f3a", "#4c4f5f"],
        energy_range: (70, 88),
        uses: &[
            "Grounding through release",
            "Cuts cords to stale habits",
            "Great for new moon resets",
        ],
        nightly: &["Shadow work with safety rails", "Holds space for honest pauses"],
    },
    CrystalDef {
        id: "sunstone",
        name: "Sunstone",
        alias: "日光石",
        emoji: "🌅",
        guardian_for: None,
        palette: ["#ffb38a", "#ff8c5a"],
        energy_range: (78, 94),
        uses: &[
            "Momentum + joy bundle",
            "Warms up action-taking",
            "Pairs with creative sprints",
        ],
        nightly: &["Helps optimism survive the dusk", "Stores sunlight for tomorrow"],
    },
];

#[must_use]
pub fn crystal_by_id(id: &str) -> Option<&'static CrystalDef> {
    CRYSTAL_LIBRARY.iter().find(|def| def.id == id)
}

// Voting tables

const WEATHER_VOTES: [(&str, &str); 8] = [
    ("rain", "amethyst"),
    ("snow", "celestite"),
    ("day", "citrine"),
    ("sun", "citrine"),
    ("night", "moonstone"),
    ("sunset", "rosequartz"),
    ("cloud", "labradorite"),
    ("aurora", "labradorite"),
];

const MOON_VOTES: [(PhaseKey, &str); 4] = [
    (PhaseKey::New, "obsidian"),
    (PhaseKey::First, "fluorite"),
    (PhaseKey::Full, "moonstone"),
    (PhaseKey::Last, "labradorite"),
];

const EMOTION_VOTES: [(&str, &str); 11] = [
    ("introspection", "amethyst"),
    ("intuition", "moonstone"),
    ("hope", "celestite"),
    ("optimism", "citrine"),
    ("change", "fluorite"),
    ("clarity", "labradorite"),
    ("soothing", "rosequartz"),
    ("momentum", "sunstone"),
    ("rebirth", "obsidian"),
    ("truth", "sunstone"),
    ("balance", "fluorite"),
];

fn lookup<K: PartialEq + Copy>(table: &[(K, &'static str)], key: Option<K>) -> Option<&'static str> {
    let key = key?;
    table.iter().find(|(k, _)| *k == key).map(|(_, id)| *id)
}

/// Inputs to the recommendation vote. Any of them may be unknown.
///
/// `weather` is the caller's theme key as given (`"sun"` and `"day"` both
/// vote citrine) and shows up verbatim in the reason line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrystalContext<'a> {
    pub weather: Option<&'a str>,
    pub moon: Option<PhaseKey>,
    pub emotion: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrystalRecommendation {
    pub id: &'static str,
    pub name: &'static str,
    pub alias: &'static str,
    pub reason: String,
    pub focus: &'static str,
    pub palette: [&'static str; 2],
}

/// Most-voted crystal among the three tables. Ties go to whichever tied id
/// was voted first (weather, then moon, then emotion).
fn tally(votes: &[&'static str]) -> &'static str {
    let mut winner = None;
    let mut best = 0;
    for id in votes {
        let count = votes.iter().filter(|other| *other == id).count();
        if count > best {
            best = count;
            winner = Some(*id);
        }
    }
    winner.unwrap_or(DEFAULT_CRYSTAL_ID)
}

/// Recommend tonight's crystal from weather, moon, and card mood.
pub fn recommend<R: Rng + ?Sized>(
    ctx: CrystalContext<'_>,
    rng: &mut R,
) -> Option<CrystalRecommendation> {
    let votes: SmallVec<[&'static str; 3]> = [
        lookup(&WEATHER_VOTES, ctx.weather),
        lookup(&MOON_VOTES, ctx.moon),
        lookup(&EMOTION_VOTES, ctx.emotion),
    ]
    .into_iter()
    .flatten()
    .collect();
    let winner = tally(&votes);
    debug!("crystal votes {votes:?} -> {winner}");
    let def = crystal_by_id(winner)?;

    let reason = format!(
        "Weather mood: {} · Moon: {} · Emotion: {}",
        ctx.weather.filter(|w| !w.is_empty()).unwrap_or("night"),
        ctx.moon.map_or("cycle", PhaseKey::as_str),
        ctx.emotion.filter(|e| !e.is_empty()).unwrap_or("soft"),
    );
    let focus = def
        .nightly
        .choose(rng)
        .or_else(|| def.uses.choose(rng))
        .copied()
        .unwrap_or(DEFAULT_FOCUS_LINE);

    Some(CrystalRecommendation {
        id: def.id,
        name: def.name,
        alias: def.alias,
        reason,
        focus,
        palette: def.palette,
    })
}

/// A collected crystal, frozen at grant time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystalSnapshot {
    pub id: String,
    pub name: String,
    pub alias: String,
    pub emoji: String,
    pub energy: u8,
    #[serde(default)]
    pub r#use: Option<String>,
    #[serde(default)]
    pub nightly: Option<String>,
    #[serde(default)]
    pub palette: Vec<String>,
    pub date: DateKey,
    pub source: String,
    #[serde(default)]
    pub guardian_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
}

/// Where a grant came from and what to note on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotContext {
    pub source: Option<String>,
    pub guardian_note: Option<String>,
    pub card_id: Option<String>,
}

/// Build a snapshot for `id`, or `None` if the id is unknown.
pub fn make_snapshot<R: Rng + ?Sized>(
    id: &str,
    ctx: SnapshotContext,
    today: &DateKey,
    rng: &mut R,
) -> Option<CrystalSnapshot> {
    let def = crystal_by_id(id)?;
    let (min, max) = def.energy_range;
    Some(CrystalSnapshot {
        id: def.id.to_string(),
        name: def.name.to_string(),
        alias: def.alias.to_string(),
        emoji: def.emoji.to_string(),
        energy: rng.gen_range(min.min(max)..=max.max(min)),
        r#use: def.uses.choose(rng).map(|s| (*s).to_string()),
        nightly: def.nightly.choose(rng).map(|s| (*s).to_string()),
        palette: def.palette.iter().map(|c| (*c).to_string()).collect(),
        date: today.clone(),
        source: ctx
            .source
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_SOURCE.to_string()),
        guardian_note: ctx
            .guardian_note
            .or_else(|| def.guardian_for.map(str::to_string)),
        card_id: ctx.card_id,
    })
}

/// The persisted crystal collection, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrystalGarden {
    items: Vec<CrystalSnapshot>,
    cap: usize,
}

impl CrystalGarden {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
        }
    }

    /// Load the stored collection, trimming anything past `cap`.
    pub fn load<S: Store + ?Sized>(store: &S, cap: usize) -> Self {
        let mut items: Vec<CrystalSnapshot> =
            store.load(KEY_CRYSTAL_COLLECTION).unwrap_or_default();
        items.truncate(cap);
        Self { items, cap }
    }

    /// Front-insert, dropping any older snapshot of the same crystal.
    pub fn insert(&mut self, snapshot: CrystalSnapshot) {
        self.items.retain(|item| item.id != snapshot.id);
        self.items.insert(0, snapshot);
        self.items.truncate(self.cap);
    }

    pub fn save<S: Store + ?Sized>(&self, store: &S) -> bool {
        store.persist(KEY_CRYSTAL_COLLECTION, &self.items)
    }

    #[must_use]
    pub fn items(&self) -> &[CrystalSnapshot] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Caps applied to crystal grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    pub daily_limit: u32,
    pub collection_cap: usize,
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            daily_limit: DAILY_CRYSTAL_LIMIT,
            collection_cap: CRYSTAL_COLLECTION_CAP,
        }
    }
}

/// Grant crystal `id` if today's allowance permits.
///
/// An unknown id or a spent allowance returns `None` and leaves the store
/// untouched.
pub fn grant<S, R>(
    store: &S,
    id: &str,
    ctx: SnapshotContext,
    today: &DateKey,
    policy: GrantPolicy,
    rng: &mut R,
) -> Option<CrystalSnapshot>
where
    S: Store + ?Sized,
    R: Rng + ?Sized,
{
    crystal_by_id(id)?;
    let decision = usage::try_consume(
        store,
        KEY_DAILY_CRYSTAL,
        UsageScope::Daily,
        policy.daily_limit,
        today,
    );
    if !decision.allowed {
        return None;
    }
    let snapshot = make_snapshot(id, ctx, today, rng)?;
    let mut garden = CrystalGarden::load(store, policy.collection_cap);
    garden.insert(snapshot.clone());
    garden.save(store);
    Some(snapshot)
}

/// Today's claimed / limit view for the garden.
pub fn daily_status<S: Store + ?Sized>(store: &S, today: &DateKey, limit: u32) -> UsageStatus {
    usage::peek(store, KEY_DAILY_CRYSTAL, UsageScope::Daily, limit, today)
}

const GUARDIAN_OVERRIDES: [(&str, &str); 3] =
    [("star", "celestite"), ("hermit", "amethyst"), ("sun", "citrine")];

/// Crystal that guards a drawn card: a fixed few by table, the rest by a
/// stable hash of the card id.
#[must_use]
pub fn guardian_crystal_id(card: &TarotCard) -> &'static str {
    if let Some((_, id)) = GUARDIAN_OVERRIDES.iter().find(|(card_id, _)| *card_id == card.id) {
        return *id;
    }
    let hash: u32 = card.id.chars().map(u32::from).sum();
    let idx = usize::try_from(hash).unwrap_or(0) % CRYSTAL_LIBRARY.len();
    CRYSTAL_LIBRARY[idx].id
}

/// Lightweight crystal pairing shown beside a spread card. The name may be
/// free text from a completion, so it is not tied to the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedCrystal {
    pub name: String,
    pub note: String,
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

impl SuggestedCrystal {
    fn from_row(row: &SuggestionRow, mood: Option<&str>) -> Self {
        Self {
            name: row.name.to_string(),
            note: row.note.to_string(),
            emoji: "💎".to_string(),
            mood: mood.map(str::to_string),
        }
    }
}

struct SuggestionRow {
    key: &'static str,
    name: &'static str,
    note: &'static str,
}

const FALLBACK_SUGGESTION: SuggestionRow = SuggestionRow {
    key: "intuition",
    name: "Moonstone",
    note: "Soft intuition · soft dream guidance",
};

const CRYSTAL_BY_MOOD: [SuggestionRow; 8] = [
    FALLBACK_SUGGESTION,
    SuggestionRow { key: "introspection", name: "Celestite", note: "Cloudlight clarity · listen inward" },
    SuggestionRow { key: "optimism", name: "Sunstone", note: "Honey glow · warm bravery" },
    SuggestionRow { key: "change", name: "Labradorite", note: "Aurora shield · cross the threshold" },
    SuggestionRow { key: "clarity", name: "Clear Quartz", note: "Crystal focus · truth amplifier" },
    SuggestionRow { key: "soothing", name: "Aquamarine", note: "Tide-smooth calm · breath steadiness" },
    SuggestionRow { key: "momentum", name: "Carnelian", note: "Kindled drive · ember of action" },
    SuggestionRow { key: "mystery", name: "Obsidian", note: "Night mirror · gentle protection" },
];

// key is the card id; the mood is stored alongside.
const CARD_CRYSTAL_OVERRIDES: [(SuggestionRow, &str); 5] = [
    (SuggestionRow { key: "sun", name: "Sunstone", note: "Solar joy · playful confidence" }, "optimism"),
    (SuggestionRow { key: "moon", name: "Moonstone", note: "Silky intuition · dream tides" }, "intuition"),
    (SuggestionRow { key: "star", name: "Celestite", note: "Starlight hush · airy hope" }, "introspection"),
    (SuggestionRow { key: "priestess", name: "Moonstone", note: "Veiled wisdom · lunar whisper" }, "intuition"),
    (SuggestionRow { key: "hermit", name: "Amethyst", note: "Violet stillness · honest insight" }, "introspection"),
];

/// Pair a card with a crystal for spread display.
#[must_use]
pub fn suggest_crystal(card: Option<&TarotCard>) -> SuggestedCrystal {
    let Some(card) = card else {
        return SuggestedCrystal::from_row(&FALLBACK_SUGGESTION, None);
    };
    if let Some((row, mood)) = CARD_CRYSTAL_OVERRIDES.iter().find(|(row, _)| row.key == card.id) {
        return SuggestedCrystal::from_row(row, Some(*mood));
    }
    let mood = infer_card_mood(Some(card));
    let row = CRYSTAL_BY_MOOD
        .iter()
        .find(|row| row.key == mood)
        .unwrap_or(&FALLBACK_SUGGESTION);
    SuggestedCrystal::from_row(row, Some(mood))
}

const NAME_FIELDS: [&str; 5] = ["crystal", "crystalName", "crystal_name", "name", "title"];
const NOTE_FIELDS: [&str; 7] = [
    "crystalNote",
    "crystal_note",
    "note",
    "description",
    "reason",
    "vibe",
    "line",
];
const EMOJI_FIELDS: [&str; 2] = ["crystalEmoji", "emoji"];

fn first_text(obj: &serde_json::Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        obj.get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn quoted_crystal(text: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"crystal":\s*"([^"]+)""#).ok())
        .as_ref()?
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pieces of a crystal named inside a completion block.
#[derive(Debug, Default, PartialEq, Eq)]
struct CrystalBlock {
    name: Option<String>,
    note: Option<String>,
    emoji: Option<String>,
}

fn crystal_block(source: &Value, bare_string_is_name: bool) -> Option<CrystalBlock> {
    match source {
        Value::Object(obj) => {
            if let Some(inner) = obj.get("crystal").filter(|v| v.is_object()) {
                return crystal_block(inner, true);
            }
            let name = first_text(obj, &NAME_FIELDS)?;
            Some(CrystalBlock {
                name: Some(name),
                note: first_text(obj, &NOTE_FIELDS),
                emoji: first_text(obj, &EMOJI_FIELDS),
            })
        }
        Value::String(text) => {
            let name = quoted_crystal(text).or_else(|| {
                let trimmed = text.trim();
                (bare_string_is_name && !trimmed.is_empty()).then(|| trimmed.to_string())
            })?;
            Some(CrystalBlock {
                name: Some(name),
                ..CrystalBlock::default()
            })
        }
        _ => None,
    }
}

/// Crystal for one spread position: from the position's own block, then the
/// top-level `crystals` block, with missing fields taken from `fallback`.
#[must_use]
pub fn extract_spread_crystal(
    position_entry: Option<&Value>,
    crystals_entry: Option<&Value>,
    fallback: SuggestedCrystal,
) -> SuggestedCrystal {
    let block = position_entry
        .and_then(|entry| crystal_block(entry, false))
        .or_else(|| crystals_entry.and_then(|entry| crystal_block(entry, true)));
    let Some(block) = block else {
        return fallback;
    };
    SuggestedCrystal {
        name: block.name.unwrap_or(fallback.name),
        note: block.note.unwrap_or(fallback.note),
        emoji: block.emoji.unwrap_or(fallback.emoji),
        mood: fallback.mood,
    }
}
