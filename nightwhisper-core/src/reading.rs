//! Reading text normalizer.
//!
//! Completion text arrives in whatever shape the model felt like producing.
//! Everything here turns it into a fixed number of clean lines and never
//! fails: anything missing is filled from deterministic local templates.
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::cards::TarotCard;
use crate::constants::{
    LAST_RESORT_LINE, READING_LINE_COUNT, SPREAD_CARD_COUNT, STARFALL_FAILED_CHANCE,
    STARFALL_FALLBACK_CHANCE,
};
use crate::crystal::{SuggestedCrystal, extract_spread_crystal, suggest_crystal};
use crate::seed::{pick_salted, reading_salt};

fn line_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^[\d.\-•\s"]+"#).ok()).as_ref()
}

fn json_object_span() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

/// Trim a line and strip numbering, bullets, and wrapping quotes. Blank
/// results read as `None`.
#[must_use]
pub fn clean_line(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = match line_prefix() {
        Some(re) => re.replace(trimmed, ""),
        None => trimmed.into(),
    };
    let stripped = stripped.trim_end_matches('"').trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
        other => Some(other.to_string()),
    }
}

/// Raw lines out of an already parsed JSON value.
fn lines_from_value(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(value_text).collect()),
        Value::String(text) => Some(text.lines().map(str::to_string).collect()),
        Value::Object(obj) => Some(lines_from_object(obj)),
        _ => None,
    }
}

fn lines_from_object(obj: &Map<String, Value>) -> Vec<String> {
    for field in ["lines", "text"] {
        if let Some(Value::Array(items)) = obj.get(field) {
            return items.iter().filter_map(value_text).collect();
        }
    }
    for field in ["lines", "text"] {
        if let Some(Value::String(text)) = obj.get(field) {
            return text.lines().map(str::to_string).collect();
        }
    }
    Vec::new()
}

/// First JSON object in `raw`, allowing prose around it.
fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let span = json_object_span()?.find(raw)?;
    match serde_json::from_str(span.as_str()) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

type ShapeMatcher = fn(&str) -> Option<Vec<String>>;

fn match_json_object(raw: &str) -> Option<Vec<String>> {
    parse_object(raw).map(|obj| lines_from_object(&obj))
}

fn match_json_array(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Array(_)) => lines_from_value(&value),
        _ => None,
    }
}

fn match_plain_text(raw: &str) -> Option<Vec<String>> {
    Some(raw.lines().map(str::to_string).collect())
}

/// Tried in order; the first `Some` wins even when it holds no usable lines.
const SHAPE_MATCHERS: [ShapeMatcher; 3] = [match_json_object, match_json_array, match_plain_text];

/// Raw lines extracted from completion text, before cleaning.
#[must_use]
pub fn extract_lines(raw: &str) -> Vec<String> {
    SHAPE_MATCHERS
        .iter()
        .find_map(|matcher| matcher(raw))
        .unwrap_or_default()
}

fn clean_unique(lines: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(limit);
    for line in lines {
        if out.len() >= limit {
            break;
        }
        if let Some(clean) = clean_line(&line)
            && !out.contains(&clean)
        {
            out.push(clean);
        }
    }
    out
}

/// Pad `lines` to exactly `expected` entries. Fallback lines not already
/// present go first; if the generator came up short its lines are cycled,
/// and an empty generator leaves a constant line.
fn fill<F>(mut lines: Vec<String>, expected: usize, salt: &str, fallback: F) -> Vec<String>
where
    F: FnOnce(&str) -> Vec<String>,
{
    lines.truncate(expected);
    if lines.len() == expected {
        return lines;
    }
    let spare: Vec<String> = fallback(salt)
        .iter()
        .filter_map(|line| clean_line(line))
        .collect();
    for line in &spare {
        if lines.len() == expected {
            break;
        }
        if !lines.contains(line) {
            lines.push(line.clone());
        }
    }
    let mut cycle = spare.iter().cycle();
    while lines.len() < expected {
        let next = cycle.next().map_or(LAST_RESORT_LINE, String::as_str);
        lines.push(next.to_string());
    }
    lines
}

/// Coerce completion text into exactly `expected` non-empty lines.
///
/// Extracted lines come first in their original order with duplicates
/// removed. `fallback` is only called when padding is needed.
pub fn normalize<F>(raw: Option<&str>, expected: usize, salt: &str, fallback: F) -> Vec<String>
where
    F: FnOnce(&str) -> Vec<String>,
{
    let extracted = raw
        .map(|text| clean_unique(extract_lines(text), expected))
        .unwrap_or_default();
    fill(extracted, expected, salt, fallback)
}

const DEFAULT_CARD_NAME: &str = "a night card";

/// Local `Symbolism / Reminder / Action` lines for a card.
///
/// Pattern choice hangs off a hash of the card and label, so the same card in
/// the same slot always reads the same.
#[must_use]
pub fn local_lines(card: Option<&TarotCard>, label: &str, moon_hint: &str) -> Vec<String> {
    let name = card.map_or(DEFAULT_CARD_NAME, |c| c.name);
    let k0 = card.and_then(|c| c.keyword(0)).unwrap_or("quiet change");
    let k1 = card.and_then(|c| c.keyword(1)).unwrap_or("inner voice");
    let k2 = card.and_then(|c| c.keyword(2)).unwrap_or(k0);
    let lunar = if moon_hint.is_empty() {
        String::new()
    } else {
        format!(" · {moon_hint}")
    };
    let salt = reading_salt(card.map_or(name, |c| c.id), label);

    let symbolism = [
        format!("{name} sketches {k0} in the dark{lunar}"),
        format!("{name} hums softly about {k0}{lunar}"),
        format!("{name} casts a lilac light on {k0}{lunar}"),
    ];
    let reminder = [
        format!("Slow down, let {k1} rise on its own{lunar}"),
        format!("Notice a small glow around {k1}{lunar}"),
        format!("Breathe softer, listen for {k1}{lunar}"),
    ];
    let action = [
        format!("Tonight, one tiny act toward {k2}{lunar}"),
        format!("Save a quiet minute to honor {k2}{lunar}"),
        format!("Write a short wish about {k2}{lunar}"),
    ];

    let prefix = if label.is_empty() {
        String::new()
    } else {
        format!("{label} ")
    };
    [
        ("Symbolism", &symbolism, 1),
        ("Reminder", &reminder, 2),
        ("Action", &action, 3),
    ]
    .into_iter()
    .filter_map(|(tag, options, offset)| {
        pick_salted(options.as_slice(), &salt, offset).map(|line| format!("{prefix}{tag}: {line}"))
    })
    .collect()
}

/// Three lines for a single drawn card.
#[must_use]
pub fn normalize_reading(raw: Option<&str>, card: &TarotCard, moon_hint: &str) -> Vec<String> {
    let salt = reading_salt(card.id, "");
    normalize(raw, READING_LINE_COUNT, &salt, |_| {
        local_lines(Some(card), "", moon_hint)
    })
}

/// Slots of a three-card spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadPosition {
    Past,
    Present,
    Future,
}

impl SpreadPosition {
    pub const ALL: [Self; SPREAD_CARD_COUNT] = [Self::Past, Self::Present, Self::Future];

    /// Key used in completion JSON.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Past => "past",
            Self::Present => "present",
            Self::Future => "future",
        }
    }

    /// Label prefixed to fallback lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Past => "Past",
            Self::Present => "Present",
            Self::Future => "Future",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadSlot {
    pub position: SpreadPosition,
    pub card_id: &'static str,
    pub card_name: &'static str,
    pub lines: Vec<String>,
    pub crystal: SuggestedCrystal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadReading {
    pub slots: [SpreadSlot; SPREAD_CARD_COUNT],
}

impl SpreadReading {
    #[must_use]
    pub fn slot(&self, position: SpreadPosition) -> &SpreadSlot {
        match position {
            SpreadPosition::Past => &self.slots[0],
            SpreadPosition::Present => &self.slots[1],
            SpreadPosition::Future => &self.slots[2],
        }
    }
}

/// Three-line readings plus a crystal per spread position.
#[must_use]
pub fn normalize_spread(
    raw: Option<&str>,
    cards: [&'static TarotCard; SPREAD_CARD_COUNT],
    moon_hint: &str,
) -> SpreadReading {
    let parsed = raw.and_then(parse_object);
    let slots = std::array::from_fn(|idx| {
        let position = SpreadPosition::ALL[idx];
        let card = cards[idx];
        let entry = parsed.as_ref().and_then(|obj| obj.get(position.key()));
        let crystals_entry = parsed
            .as_ref()
            .and_then(|obj| obj.get("crystals"))
            .and_then(|block| block.get(position.key()));

        let extracted = entry
            .and_then(lines_from_value)
            .map(|lines| clean_unique(lines, READING_LINE_COUNT))
            .unwrap_or_default();
        let salt = reading_salt(card.id, position.label());
        let lines = fill(extracted, READING_LINE_COUNT, &salt, |_| {
            local_lines(Some(card), position.label(), moon_hint)
        });

        SpreadSlot {
            position,
            card_id: card.id,
            card_name: card.name,
            lines,
            crystal: extract_spread_crystal(entry, crystals_entry, suggest_crystal(Some(card))),
        }
    });
    SpreadReading { slots }
}

/// One affirmation line: the first clean line of the reply, else a template.
#[must_use]
pub fn affirmation_line(raw: Option<&str>, card: Option<&TarotCard>) -> String {
    raw.and_then(|text| clean_unique(extract_lines(text), 1).into_iter().next())
        .unwrap_or_else(|| {
            let keyword = card.and_then(|c| c.keyword(0)).unwrap_or("gentle becoming");
            format!("Tonight I will gently walk into the journey of {keyword}")
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCard {
    pub card_id: &'static str,
    pub name: &'static str,
    pub night_words: String,
}

/// The oracle's answer in the chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub cards: Vec<ChatCard>,
    pub stardust: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starfall: Option<String>,
}

fn fallback_night_words(card: &TarotCard, slot: usize) -> String {
    let k0 = card.keyword(0).unwrap_or("a night-walking heart");
    let k1 = card.keyword(1).unwrap_or("a silent wind");
    let k2 = card.keyword(2).unwrap_or(k0);
    let name = card.name;
    let patterns = [
        format!("{name} tells of {k0} in the fog-blue night, a hidden thread for you"),
        format!("{name} lights a little {k1}, reminding you to slow your breath"),
        format!("{name} lets its shadow fall on {k2}, asking you to hear the deeper voice"),
        format!("{name} glows faintly, keeping a quiet corner for {k1}"),
    ];
    let offset = u64::try_from(slot).unwrap_or(0);
    pick_salted(&patterns, card.id, offset)
        .cloned()
        .unwrap_or_else(|| LAST_RESORT_LINE.to_string())
}

fn fallback_stardust(cards: &[&TarotCard]) -> String {
    match cards.first() {
        Some(lead) => format!(
            "Stardust from {}: write one line that matters, pocket it, and read it again tomorrow.",
            lead.name
        ),
        None => "Close your eyes and promise yourself one gentle thing tonight.".to_string(),
    }
}

fn fallback_starfall(cards: &[&TarotCard]) -> String {
    let name = cards.first().map_or("the night", |c| c.name);
    format!("Starfall: a sliver of light slips past, and {name} hides the answer in your blink.")
}

fn object_text(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| obj.get(*field).and_then(Value::as_str))
        .and_then(clean_line)
}

/// Match completion chat output to the drawn cards and fill the gaps.
///
/// A card's words come from the entry whose name contains the card name, else
/// the entry at the same index. Without a stated starfall one may still
/// appear at random, slightly more often when nothing parsed at all.
pub fn normalize_chat<R: Rng + ?Sized>(
    raw: Option<&str>,
    cards: &[&'static TarotCard],
    rng: &mut R,
) -> ChatReply {
    let Some(parsed) = raw.and_then(parse_object) else {
        let starfall = rng
            .gen_bool(STARFALL_FAILED_CHANCE)
            .then(|| fallback_starfall(cards));
        return ChatReply {
            cards: cards
                .iter()
                .enumerate()
                .map(|(idx, card)| ChatCard {
                    card_id: card.id,
                    name: card.name,
                    night_words: fallback_night_words(card, idx),
                })
                .collect(),
            stardust: fallback_stardust(cards),
            starfall,
        };
    };

    let entries: Vec<&Map<String, Value>> = parsed
        .get("cards")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    let chat_cards = cards
        .iter()
        .enumerate()
        .map(|(idx, card)| {
            let wanted = card.name.to_lowercase();
            let entry = entries
                .iter()
                .find(|entry| {
                    entry
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.to_lowercase().contains(&wanted))
                })
                .or_else(|| entries.get(idx));
            let night_words = entry
                .and_then(|entry| object_text(entry, &["night_words", "nightWords", "night"]))
                .unwrap_or_else(|| fallback_night_words(card, idx));
            ChatCard {
                card_id: card.id,
                name: card.name,
                night_words,
            }
        })
        .collect();

    let stardust =
        object_text(&parsed, &["stardust"]).unwrap_or_else(|| fallback_stardust(cards));
    let starfall = object_text(&parsed, &["starfall"]).or_else(|| {
        rng.gen_bool(STARFALL_FALLBACK_CHANCE)
            .then(|| fallback_starfall(cards))
    });

    ChatReply {
        cards: chat_cards,
        stardust,
        starfall,
    }
}
