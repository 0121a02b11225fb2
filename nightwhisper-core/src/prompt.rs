//! Prompt text sent to the completion service.

use crate::cards::TarotCard;
use crate::constants::SPREAD_CARD_COUNT;
use crate::reading::SpreadPosition;

fn card_line(card: &TarotCard) -> String {
    format!("{} ({})", card.name, card.keywords.join(", "))
}

fn moon_block(moon_tone: &str, nod: &str) -> String {
    if moon_tone.is_empty() {
        String::new()
    } else {
        format!("Moon Cycle tone: {moon_tone}\n- {nod}\n")
    }
}

/// Three-line reading for one card.
#[must_use]
pub fn reading_prompt(card: &TarotCard, moon_tone: &str) -> String {
    let mut out = String::from("You are NightWhisper, a gentle night oracle.\n\n");
    out.push_str(&moon_block(
        moon_tone,
        "Let the lines glow with this lunar mood; one moon mention max.",
    ));
    out.push_str(
        "Generate exactly 3 lines, each 12-22 words:\n\
         Symbolism: what the card evokes tonight.\n\
         Gentle Reminder: a feeling to hold gently.\n\
         Small Action: one doable act to try.\n\n\
         Rules:\n\
         - No repeated phrasing or filler.\n\
         - Each line must have a different verb.\n\
         - Tone: dreamy, soft, but human and encouraging.\n\
         - No bullet numbers or extra commentary.\n\n",
    );
    out.push_str(&format!("Card: {}\n", card.name));
    out.push_str(&format!("Keywords: {}\n", card.keywords.join(", ")));
    out
}

/// Past / present / future reading, answered as one JSON object.
#[must_use]
pub fn spread_prompt(cards: [&TarotCard; SPREAD_CARD_COUNT], moon_tone: &str) -> String {
    let mut out = String::from("You are NightWhisper, a soft, dreamlike tarot oracle.\n\n");
    out.push_str(&moon_block(
        moon_tone,
        "Infuse every line with this lunar mood; at most one moon nod.",
    ));
    out.push_str(
        "Generate a Past / Present / Future interpretation for three tarot cards.\n\n\
         Return strictly a JSON object shaped like:\n\
         {\n  \"past\": { \"lines\": [\"Symbolism\", \"Gentle Reminder\", \"Small Action\"], \"crystal\": \"Aquamarine\" },\n  \
         \"present\": { \"lines\": [\"Symbolism\", \"Gentle Reminder\", \"Small Action\"], \"crystal\": \"Celestite\" },\n  \
         \"future\": { \"lines\": [\"Symbolism\", \"Gentle Reminder\", \"Small Action\"], \"crystal\": \"Sunstone\" }\n}\n\n\
         Rules:\n\
         - All 9 lines must be unique and card-specific.\n\
         - Each line 12-24 words, smooth and readable.\n\
         - Use the card's keywords naturally (no numbers, no extra markup).\n\
         - Include a \"crystal\" entry per card that fits its symbolic energy.\n\
         - Output JSON only.\n\nCards:\n",
    );
    for (position, card) in SpreadPosition::ALL.iter().zip(cards) {
        out.push_str(&format!("{}: {}\n", position.label(), card_line(card)));
    }
    out
}

/// Single-line first-person affirmation.
#[must_use]
pub fn affirmation_prompt(card: Option<&TarotCard>) -> String {
    let mut out = String::from(
        "You are NightWhisper, a twilight oracle.\n\n\
         Write ONE short night affirmation (8-18 words). Tone: soft, intimate, like whispering to yourself before sleep.\n\
         - Avoid imperatives; speak as \"I\".\n\
         - Keep it single-line, no quotes, no bullet numbers.\n\n",
    );
    out.push_str(&format!("Card: {}\n", card.map_or("Unknown", |c| c.name)));
    out.push_str(&format!(
        "Keywords: {}\n",
        card.map(|c| c.keywords.join(", ")).unwrap_or_default()
    ));
    out
}

/// Collapse runs of whitespace; blank questions read as `None`.
#[must_use]
pub fn clean_question(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Chat-room prompt for a question and the cards drawn for it.
#[must_use]
pub fn chat_prompt(question: &str, cards: &[&TarotCard]) -> String {
    let mut out = String::from(
        "You are NightWhisper, the mysterious guide of the divination chat room.\n\
         Voice: soft as the night but direct.\n\n\
         Given the question and the drawn tarot cards, return one JSON object:\n\
         {\n  \"cards\": [ { \"name\": \"card name\", \"night_words\": \"15-26 words, image plus reminder\" } ],\n  \
         \"stardust\": \"16-30 words, one concrete small action or mindset\",\n  \
         \"starfall\": \"if you sense a shooting star, one cryptic 12-22 word line; otherwise an empty string\"\n}\n\n\
         Constraints:\n\
         - night_words and stardust must use the provided card names.\n\
         - No lists or numbering; keep it flowing.\n\n",
    );
    out.push_str(&format!("Question:\n{question}\n\nCards drawn:\n"));
    for card in cards {
        out.push_str(&format!("{}\n", card_line(card)));
    }
    out
}
