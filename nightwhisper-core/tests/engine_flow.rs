use async_trait::async_trait;
use nightwhisper_core::{
    ActionKind, AffirmationDraft, CompletionError, DateKey, EngineConfig, MemoryStore, NightEngine,
    ReadingOutcome, ReadingPhase, SaveOptions, SpreadPosition, TextCompletion, card_by_id,
};
use std::time::Duration;

struct Canned(&'static str);

#[async_trait]
impl TextCompletion for Canned {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Ok(self.0.to_string())
    }
}

struct Hanging;

#[async_trait]
impl TextCompletion for Hanging {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".to_string())
    }
}

fn today() -> DateKey {
    DateKey::parse("2025-06-21").unwrap()
}

fn engine(seed: u64) -> NightEngine<MemoryStore> {
    let config = EngineConfig {
        secret_probability: 0.0,
        ..EngineConfig::default()
    };
    NightEngine::with_seed(MemoryStore::new(), config, seed)
}

#[tokio::test]
async fn reading_uses_completion_lines() {
    let mut engine = engine(1);
    let card = card_by_id("star").unwrap();
    let pending = engine.begin_reading(card, None);
    assert_eq!(engine.phase(ActionKind::Reading), ReadingPhase::Requesting);
    let outcome = engine
        .complete(&Canned("1. First light\n2. Second breath\n3. Third step"), pending)
        .await;
    let Some(ReadingOutcome::Reading { lines, .. }) = outcome else {
        panic!("expected a reading");
    };
    assert_eq!(lines, ["First light", "Second breath", "Third step"]);
}

#[tokio::test(start_paused = true)]
async fn timeout_falls_back_to_local_lines() {
    let mut engine = engine(2);
    let card = card_by_id("hermit").unwrap();
    let moon = engine.moon(chrono::Utc::now());
    let pending = engine.begin_reading(card, Some(&moon));
    let Some(ReadingOutcome::Reading { lines, .. }) = engine.complete(&Hanging, pending).await else {
        panic!("expected a reading");
    };
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Symbolism: "));
    assert!(lines.iter().all(|line| line.ends_with(moon.moon_hint())));
}

#[tokio::test]
async fn spread_reads_json_per_position() {
    let mut engine = engine(3);
    let pending = engine.begin_spread(&today(), None).unwrap();
    let reply = r#"{
        "past": {"lines": ["p1", "p2", "p3"], "crystal": "Aquamarine"},
        "present": {"lines": ["n1", "n2", "n3"]},
        "future": {"lines": ["f1"], "crystalName": "Sunstone", "note": "warm"}
    }"#;
    let Some(ReadingOutcome::Spread(spread)) = engine.complete(&Canned(reply), pending).await else {
        panic!("expected a spread");
    };
    assert_eq!(spread.slot(SpreadPosition::Past).lines, ["p1", "p2", "p3"]);
    assert_eq!(spread.slot(SpreadPosition::Past).crystal.name, "Aquamarine");
    let future = spread.slot(SpreadPosition::Future);
    assert_eq!(future.lines.len(), 3);
    assert_eq!(future.lines[0], "f1");
    assert_eq!(future.crystal.name, "Sunstone");
    assert_eq!(future.crystal.note, "warm");
}

#[tokio::test]
async fn chat_reply_covers_every_drawn_card() {
    let mut engine = engine(4);
    let pending = engine.begin_chat(&today(), "  should I rest?  ").unwrap();
    assert!(pending.prompt.contains("should I rest?"));
    let drawn = pending.cards();
    let Some(ReadingOutcome::Chat(reply)) = engine.complete(&Canned("not json"), pending).await else {
        panic!("expected a chat reply");
    };
    assert_eq!(reply.cards.len(), drawn.len());
    assert!(!reply.stardust.is_empty());
}

#[test]
fn chat_turns_are_capped_per_day() {
    let mut engine = engine(5);
    let allowed = (0..8)
        .filter(|_| engine.begin_chat(&today(), "again?").is_some())
        .count();
    assert_eq!(allowed, 5);
    assert!(engine.chat_status(&today()).exhausted());
}

#[test]
fn only_latest_marked_affirmation_is_cover() {
    let engine = engine(6);
    let cover = SaveOptions {
        mark_cover: true,
        ..SaveOptions::default()
    };
    engine.save_affirmation(&AffirmationDraft::new(Some("The Sun"), 10, "A"), cover);
    engine.save_affirmation(&AffirmationDraft::new(Some("The Moon"), 20, "B"), cover);
    let book = engine.affirmations();
    let covers: Vec<_> = book.items().iter().filter(|a| a.cover).collect();
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].text, "B");
    assert_eq!(engine.toggle_affirmation_favorite("affirm-10"), Some(true));
}

#[test]
fn same_seed_draws_same_cards() {
    let mut a = engine(77);
    let mut b = engine(77);
    for _ in 0..5 {
        assert_eq!(a.draw_card(&today()).map(|c| c.id), b.draw_card(&today()).map(|c| c.id));
    }
}
