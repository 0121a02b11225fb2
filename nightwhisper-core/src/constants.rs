//! Centralized policy and storage constants for the NightWhisper engine.
//!
//! Limits and odds here are the defaults behind [`crate::config::EngineConfig`];
//! the astronomical values are fixed and never configurable.

// Lunar math ---------------------------------------------------------------
/// Mean synodic month in days.
pub const SYNODIC_DAYS: f64 = 29.530_588_853;
/// Reference new moon, 2001-01-06T18:14:00Z, in Unix milliseconds.
pub const REF_NEW_MOON_MS: i64 = 978_804_840_000;
pub const MS_PER_DAY: f64 = 86_400_000.0;
/// How often a long-lived session should recompute the moon phase.
pub const MOON_REFRESH_SECS: u64 = 60 * 60;

// Policy defaults ----------------------------------------------------------
pub const SECRET_HIT_PROBABILITY: f64 = 0.01;
pub const DAILY_CRYSTAL_LIMIT: u32 = 1;
pub const SPREAD_FREE_LIMIT: u32 = 3;
pub const CHAT_DAILY_LIMIT: u32 = 5;
pub const CRYSTAL_COLLECTION_CAP: usize = 24;
pub const AFFIRMATION_CAP: usize = 40;
pub const WISH_CAP: usize = 40;
pub const COMPLETION_TIMEOUT_MS: u64 = 8_000;

// Reading shape ------------------------------------------------------------
pub const READING_LINE_COUNT: usize = 3;
pub const SPREAD_CARD_COUNT: usize = 3;
pub const CHAT_MAX_CARDS: usize = 3;
pub(crate) const STARFALL_FALLBACK_CHANCE: f64 = 0.24;
pub(crate) const STARFALL_FAILED_CHANCE: f64 = 0.28;

// Storage keys -------------------------------------------------------------
pub const KEY_SECRET_SEED: &str = "nightwhisper.secretSeed";
pub const KEY_CRYSTAL_COLLECTION: &str = "nightCrystals";
pub const KEY_DAILY_CRYSTAL: &str = "nightCrystalDailyTracker";
pub const KEY_SPREAD_COUNT: &str = "nightSpreadCount";
pub const KEY_CHAT_DAILY: &str = "nightChatDailyTracker";
pub const KEY_AFFIRMATIONS: &str = "nightAffirmations";
pub const KEY_DREAM_WISHES: &str = "dreamBottleWishes";

// Fallback copy ------------------------------------------------------------
pub(crate) const DEFAULT_CRYSTAL_ID: &str = "moonstone";
pub(crate) const DEFAULT_SNAPSHOT_SOURCE: &str = "mystery";
pub(crate) const DEFAULT_FOCUS_LINE: &str = "Glows quietly for tonight.";
pub(crate) const LAST_RESORT_LINE: &str = "The night keeps a soft lamp on for you.";
