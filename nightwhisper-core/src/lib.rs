//! NightWhisper Engine
//!
//! Platform-agnostic reward and gating logic for the NightWhisper night oracle:
//! moon cycle, daily secrets, usage limits, crystal rewards, dream-bottle
//! wishes, and reading normalization. This crate has no UI, network, or filesystem dependencies;
//! storage and text completion are injected.

pub mod affirmation;
pub mod cards;
pub mod completion;
pub mod config;
pub mod constants;
pub mod crystal;
pub mod date;
pub mod moon;
pub mod numbers;
pub mod prompt;
pub mod reading;
pub mod secret;
pub mod seed;
pub mod store;
pub mod usage;
pub mod weather;
pub mod wish;

// Re-export commonly used types
pub use affirmation::{AffirmationBook, AffirmationDraft, AffirmationRecord, SaveOptions};
pub use cards::{ARCANA_HALF, Deck, MAJOR_ARCANA, TarotCard, card_by_id, card_pool, infer_card_mood};
pub use completion::{
    ActionKind, CompletionError, OfflineCompletion, ReadingPhase, RequestTicket, RequestTracker,
    TextCompletion, complete_with_timeout,
};
pub use config::{ConfigError, EngineConfig};
pub use crystal::{
    CRYSTAL_LIBRARY, CrystalContext, CrystalGarden, CrystalRecommendation, CrystalSnapshot,
    GrantPolicy, SnapshotContext, SuggestedCrystal, crystal_by_id, guardian_crystal_id, recommend,
    suggest_crystal,
};
pub use date::DateKey;
pub use moon::{MOON_MARKERS, MoonPhase, PhaseKey, compute_phase, compute_phase_millis};
pub use reading::{ChatCard, ChatReply, SpreadPosition, SpreadReading, SpreadSlot, normalize};
pub use secret::{ActiveSecret, DailySecretRecord, SecretId, roll_or_replay};
pub use store::{MemoryStore, Store, StoreError, StoreExt, UnavailableStore};
pub use usage::{UsageDecision, UsageScope, UsageStatus};
pub use weather::{Resonance, WeatherTheme, resonance, resolve_theme};
pub use wish::{WishBottle, WishRecord, bottle_line};

use chrono::{DateTime, Utc};
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::constants::{CHAT_MAX_CARDS, KEY_CHAT_DAILY, KEY_SPREAD_COUNT, SPREAD_CARD_COUNT};

/// Everything needed to finish a request once its completion text arrives.
#[derive(Debug, Clone)]
enum Subject {
    Reading {
        card: &'static TarotCard,
        moon_hint: &'static str,
    },
    Spread {
        cards: [&'static TarotCard; SPREAD_CARD_COUNT],
        moon_hint: &'static str,
    },
    Affirmation {
        card: Option<&'static TarotCard>,
    },
    Chat {
        cards: Vec<&'static TarotCard>,
    },
}

/// A request that has been gated, ticketed, and given its prompt.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub prompt: String,
    subject: Subject,
}

impl PendingRequest {
    /// Cards this request is about, in display order.
    #[must_use]
    pub fn cards(&self) -> Vec<&'static TarotCard> {
        match &self.subject {
            Subject::Reading { card, .. } => vec![*card],
            Subject::Spread { cards, .. } => cards.to_vec(),
            Subject::Affirmation { card } => card.iter().copied().collect(),
            Subject::Chat { cards } => cards.clone(),
        }
    }
}

/// Normalized result of a settled request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingOutcome {
    Reading {
        card: &'static TarotCard,
        lines: Vec<String>,
    },
    Spread(SpreadReading),
    Affirmation(String),
    Chat(ChatReply),
}

/// Main engine tying the components to one store, config, and RNG.
pub struct NightEngine<S: Store> {
    store: S,
    config: EngineConfig,
    rng: ChaCha8Rng,
    tracker: RequestTracker,
    deck: Deck,
    deck_day: Option<DateKey>,
}

impl<S: Store> NightEngine<S> {
    /// Create an engine with an entropy-seeded RNG.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_rng(store, config, ChaCha8Rng::from_entropy())
    }

    /// Create an engine whose random choices replay for the same seed.
    pub fn with_seed(store: S, config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(store, config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(store: S, config: EngineConfig, rng: ChaCha8Rng) -> Self {
        Self {
            store,
            config,
            rng,
            tracker: RequestTracker::new(),
            deck: Deck::default(),
            deck_day: None,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn phase(&self, action: ActionKind) -> ReadingPhase {
        self.tracker.phase(action)
    }

    /// Lunar state at `now`.
    #[must_use]
    pub fn moon(&self, now: DateTime<Utc>) -> MoonPhase {
        compute_phase(now)
    }

    /// Today's secret roll, rolled once and replayed afterwards.
    pub fn daily_secret(&mut self, today: &DateKey) -> DailySecretRecord {
        roll_or_replay(today, &self.store, &mut self.rng, self.config.secret_probability)
    }

    pub fn active_secret(&mut self, today: &DateKey) -> Option<ActiveSecret> {
        let record = self.daily_secret(today);
        secret::active_secret(&record)
    }

    /// Weather theme for a local hour and WMO code, after today's secret.
    pub fn weather_theme(&mut self, today: &DateKey, hour: u32, weathercode: Option<u16>) -> WeatherTheme {
        let record = self.daily_secret(today);
        weather::apply_secret(resolve_theme(hour, weathercode), Some(&record))
    }

    fn todays_pool(&mut self, today: &DateKey) -> Vec<&'static TarotCard> {
        let record = self.daily_secret(today);
        card_pool(Some(&record))
    }

    /// Draw the next card from the session deck. The deck is rebuilt each
    /// day so the hidden card only appears while its secret is active.
    pub fn draw_card(&mut self, today: &DateKey) -> Option<&'static TarotCard> {
        let pool = self.todays_pool(today);
        if self.deck.remaining() == 0 || self.deck_day.as_ref() != Some(today) {
            self.deck = Deck::shuffled(&pool, &mut self.rng);
            self.deck_day = Some(today.clone());
        }
        self.deck.draw(&pool, &mut self.rng)
    }

    /// Grant a crystal against today's allowance.
    pub fn grant_crystal(
        &mut self,
        id: &str,
        ctx: SnapshotContext,
        today: &DateKey,
    ) -> Option<CrystalSnapshot> {
        crystal::grant(
            &self.store,
            id,
            ctx,
            today,
            self.config.grant_policy(),
            &mut self.rng,
        )
    }

    /// Grant the crystal guarding `card`, if today's allowance permits.
    pub fn grant_card_guardian(
        &mut self,
        card: &TarotCard,
        today: &DateKey,
    ) -> Option<CrystalSnapshot> {
        let ctx = SnapshotContext {
            source: Some("draw".to_string()),
            guardian_note: None,
            card_id: Some(card.id.to_string()),
        };
        self.grant_crystal(guardian_crystal_id(card), ctx, today)
    }

    pub fn recommend(&mut self, ctx: CrystalContext<'_>) -> Option<CrystalRecommendation> {
        recommend(ctx, &mut self.rng)
    }

    #[must_use]
    pub fn garden(&self) -> CrystalGarden {
        CrystalGarden::load(&self.store, self.config.crystal_collection_cap)
    }

    #[must_use]
    pub fn crystal_status(&self, today: &DateKey) -> UsageStatus {
        crystal::daily_status(&self.store, today, self.config.daily_crystal_limit)
    }

    #[must_use]
    pub fn spread_status(&self, today: &DateKey) -> UsageStatus {
        usage::peek(
            &self.store,
            KEY_SPREAD_COUNT,
            UsageScope::Lifetime,
            self.config.spread_free_limit,
            today,
        )
    }

    #[must_use]
    pub fn chat_status(&self, today: &DateKey) -> UsageStatus {
        usage::peek(
            &self.store,
            KEY_CHAT_DAILY,
            UsageScope::Daily,
            self.config.chat_daily_limit,
            today,
        )
    }

    #[must_use]
    pub fn affirmations(&self) -> AffirmationBook {
        AffirmationBook::load(&self.store, self.config.affirmation_cap)
    }

    /// Save or update an affirmation and persist the book.
    pub fn save_affirmation(
        &self,
        draft: &AffirmationDraft,
        opts: SaveOptions,
    ) -> Option<AffirmationRecord> {
        let mut book = self.affirmations();
        let saved = book.upsert(draft, opts).cloned()?;
        book.save(&self.store);
        Some(saved)
    }

    pub fn set_affirmation_cover(&self, id: &str) -> bool {
        let mut book = self.affirmations();
        book.set_cover(id) && book.save(&self.store)
    }

    pub fn toggle_affirmation_favorite(&self, id: &str) -> Option<bool> {
        let mut book = self.affirmations();
        let favorite = book.toggle_favorite(id)?;
        book.save(&self.store);
        Some(favorite)
    }

    #[must_use]
    pub fn wishes(&self) -> WishBottle {
        WishBottle::load(&self.store, self.config.wish_cap)
    }

    /// Set today's wish. Blank text removes it.
    pub fn write_wish(&self, today: &DateKey, text: &str, time: i64) -> Option<WishRecord> {
        let mut bottle = self.wishes();
        let saved = bottle.write(today, text, time).cloned();
        bottle.save(&self.store);
        saved
    }

    /// Hidden bottle whisper, present only on a `mystery-bottle` day.
    pub fn bottle_whisper(&mut self, today: &DateKey) -> Option<&'static str> {
        let record = self.daily_secret(today);
        bottle_line(&record)
    }

    fn pending(&mut self, action: ActionKind, prompt: String, subject: Subject) -> PendingRequest {
        PendingRequest {
            ticket: self.tracker.begin(action),
            prompt,
            subject,
        }
    }

    /// Start a single-card reading. Any reading already in flight goes stale.
    pub fn begin_reading(
        &mut self,
        card: &'static TarotCard,
        moon: Option<&MoonPhase>,
    ) -> PendingRequest {
        let tone = moon.map(MoonPhase::moon_tone).unwrap_or_default();
        let prompt = prompt::reading_prompt(card, &tone);
        let moon_hint = moon.map_or("", MoonPhase::moon_hint);
        self.pending(ActionKind::Reading, prompt, Subject::Reading { card, moon_hint })
    }

    /// Start a three-card spread, spending one free spread.
    ///
    /// Returns `None` once the free spreads are used up.
    pub fn begin_spread(
        &mut self,
        today: &DateKey,
        moon: Option<&MoonPhase>,
    ) -> Option<PendingRequest> {
        let pool = self.todays_pool(today);
        let cards = cards::draw_spread(&pool, &mut self.rng)?;
        let decision = usage::try_consume(
            &self.store,
            KEY_SPREAD_COUNT,
            UsageScope::Lifetime,
            self.config.spread_free_limit,
            today,
        );
        if !decision.allowed {
            return None;
        }
        let tone = moon.map(MoonPhase::moon_tone).unwrap_or_default();
        let prompt = prompt::spread_prompt(cards, &tone);
        let moon_hint = moon.map_or("", MoonPhase::moon_hint);
        Some(self.pending(ActionKind::Spread, prompt, Subject::Spread { cards, moon_hint }))
    }

    pub fn begin_affirmation(&mut self, card: Option<&'static TarotCard>) -> PendingRequest {
        let prompt = prompt::affirmation_prompt(card);
        self.pending(ActionKind::Affirmation, prompt, Subject::Affirmation { card })
    }

    /// Start a chat turn for `question`, spending one of today's turns.
    ///
    /// A blank question spends nothing and returns `None`, as does a spent
    /// allowance.
    pub fn begin_chat(&mut self, today: &DateKey, question: &str) -> Option<PendingRequest> {
        let question = prompt::clean_question(question)?;
        let decision = usage::try_consume(
            &self.store,
            KEY_CHAT_DAILY,
            UsageScope::Daily,
            self.config.chat_daily_limit,
            today,
        );
        if !decision.allowed {
            return None;
        }
        let pool = self.todays_pool(today);
        let cards = cards::draw_some(&pool, CHAT_MAX_CARDS, &mut self.rng);
        let prompt = prompt::chat_prompt(&question, &cards);
        Some(self.pending(ActionKind::Chat, prompt, Subject::Chat { cards }))
    }

    /// Normalize the completion text for `pending`.
    ///
    /// Returns `None` when a newer request for the same action has started;
    /// `text` of `None` means the completion failed and only fallbacks are used.
    pub fn settle(&mut self, pending: PendingRequest, text: Option<String>) -> Option<ReadingOutcome> {
        let settled = self.tracker.settle(pending.ticket, text)?;
        if settled.fallback_only {
            debug!("{:?} #{} using fallback text", pending.ticket.action, pending.ticket.seq);
        }
        let raw = settled.text.as_deref();
        let outcome = match pending.subject {
            Subject::Reading { card, moon_hint } => ReadingOutcome::Reading {
                card,
                lines: reading::normalize_reading(raw, card, moon_hint),
            },
            Subject::Spread { cards, moon_hint } => {
                ReadingOutcome::Spread(reading::normalize_spread(raw, cards, moon_hint))
            }
            Subject::Affirmation { card } => {
                ReadingOutcome::Affirmation(reading::affirmation_line(raw, card))
            }
            Subject::Chat { cards } => {
                ReadingOutcome::Chat(reading::normalize_chat(raw, &cards, &mut self.rng))
            }
        };
        self.tracker.finish(pending.ticket);
        Some(outcome)
    }

    /// Ask `service` for `pending` and settle the answer under the configured
    /// timeout.
    pub async fn complete<C>(&mut self, service: &C, pending: PendingRequest) -> Option<ReadingOutcome>
    where
        C: TextCompletion + ?Sized,
    {
        let text =
            complete_with_timeout(service, &pending.prompt, self.config.completion_timeout()).await;
        self.settle(pending, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_SECRET_SEED;
    use serde_json::json;
    use std::collections::HashSet;

    fn day() -> DateKey {
        DateKey::parse("2024-03-10").unwrap()
    }

    fn quiet() -> EngineConfig {
        EngineConfig {
            secret_probability: 0.0,
            ..EngineConfig::default()
        }
    }

    fn engine() -> NightEngine<MemoryStore> {
        NightEngine::with_seed(MemoryStore::new(), quiet(), 42)
    }

    #[test]
    fn deck_cycles_the_major_arcana() {
        let mut engine = engine();
        let ids: HashSet<_> = (0..22)
            .map(|_| engine.draw_card(&day()).unwrap().id)
            .collect();
        assert_eq!(ids.len(), 22);
        assert!(!ids.contains(ARCANA_HALF.id));
    }

    #[test]
    fn arcana_half_day_adds_hidden_card() {
        let store = MemoryStore::new();
        store
            .set(
                KEY_SECRET_SEED,
                json!({"date": "2024-03-10", "hit": true, "id": "arcana-half"}),
            )
            .unwrap();
        let mut engine = NightEngine::with_seed(store, quiet(), 1);
        let ids: HashSet<_> = (0..23)
            .map(|_| engine.draw_card(&day()).unwrap().id)
            .collect();
        assert_eq!(ids.len(), 23);
        assert!(ids.contains(ARCANA_HALF.id));
    }

    #[test]
    fn wishes_persist_and_bottle_whispers_on_its_day() {
        let store = MemoryStore::new();
        store
            .set(
                KEY_SECRET_SEED,
                json!({"date": "2024-03-10", "hit": true, "id": "mystery-bottle"}),
            )
            .unwrap();
        let mut engine = NightEngine::with_seed(store, quiet(), 3);
        engine.write_wish(&day(), "draft", 1);
        let wish = engine.write_wish(&day(), "see the sea", 2).unwrap();
        assert_eq!(wish.text, "see the sea");
        assert_eq!(engine.wishes().items(), [wish]);
        // 20240310 % 4 == 2
        assert_eq!(engine.bottle_whisper(&day()), Some(wish::BOTTLE_LINES[2]));
        assert!(engine.write_wish(&day(), "", 3).is_none());
        assert!(engine.wishes().items().is_empty());
        assert_eq!(engine.bottle_whisper(&DateKey::parse("2024-03-11").unwrap()), None);
    }

    #[test]
    fn prophecy_line_holds_across_sessions() {
        let store = MemoryStore::new();
        store
            .set(
                KEY_SECRET_SEED,
                json!({"date": "2024-03-10", "hit": true, "id": "prophecy-line"}),
            )
            .unwrap();
        let mut engine = NightEngine::with_seed(store, quiet(), 5);
        let first = engine.active_secret(&day()).unwrap();
        let store = engine.store().clone();
        let mut later = NightEngine::with_seed(store, quiet(), 99);
        assert_eq!(later.active_secret(&day()), Some(first));
    }

    #[test]
    fn guardian_grant_is_once_per_day() {
        let mut engine = engine();
        let star = card_by_id("star").unwrap();
        let snap = engine.grant_card_guardian(star, &day()).unwrap();
        assert_eq!(snap.id, "celestite");
        assert_eq!(snap.source, "draw");
        assert_eq!(snap.card_id.as_deref(), Some("star"));
        assert!(engine.grant_card_guardian(star, &day()).is_none());
        assert_eq!(engine.garden().len(), 1);
        assert!(engine.crystal_status(&day()).exhausted());
    }

    #[test]
    fn free_spreads_run_out() {
        let mut engine = engine();
        for _ in 0..3 {
            assert!(engine.begin_spread(&day(), None).is_some());
        }
        assert!(engine.begin_spread(&day(), None).is_none());
        assert_eq!(engine.spread_status(&day()).remaining, 0);
    }

    #[test]
    fn blank_chat_spends_nothing() {
        let mut engine = engine();
        assert!(engine.begin_chat(&day(), "   ").is_none());
        assert_eq!(engine.chat_status(&day()).used, 0);
        let pending = engine.begin_chat(&day(), "what should I rest on?").unwrap();
        assert!((1..=CHAT_MAX_CARDS).contains(&pending.cards().len()));
        assert_eq!(engine.chat_status(&day()).used, 1);
    }

    #[test]
    fn stale_reading_is_dropped() {
        let mut engine = engine();
        let card = card_by_id("moon").unwrap();
        let first = engine.begin_reading(card, None);
        let second = engine.begin_reading(card, None);
        assert!(engine.settle(first, Some("late".into())).is_none());
        let Some(ReadingOutcome::Reading { lines, .. }) = engine.settle(second, None) else {
            panic!("expected a reading");
        };
        assert_eq!(lines.len(), 3);
        assert_eq!(engine.phase(ActionKind::Reading), ReadingPhase::Done);
    }

    #[test]
    fn affirmation_cover_moves() {
        let engine = engine();
        let cover = SaveOptions {
            mark_cover: true,
            ..SaveOptions::default()
        };
        engine.save_affirmation(&AffirmationDraft::new(None, 1, "A"), cover);
        engine.save_affirmation(&AffirmationDraft::new(None, 2, "B"), cover);
        assert_eq!(engine.affirmations().cover().unwrap().text, "B");
        assert!(engine.set_affirmation_cover("affirm-1"));
        assert_eq!(engine.affirmations().cover().unwrap().text, "A");
    }

    #[tokio::test]
    async fn offline_completion_uses_fallback() {
        let mut engine = engine();
        let pending = engine.begin_affirmation(card_by_id("star"));
        let outcome = engine.complete(&OfflineCompletion, pending).await;
        assert_eq!(
            outcome,
            Some(ReadingOutcome::Affirmation(
                "Tonight I will gently walk into the journey of hope".to_string()
            ))
        );
    }
}
