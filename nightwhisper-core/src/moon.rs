//! Moon cycle calculator.
//!
//! Phase is derived from wall-clock time alone: days since a known new moon,
//! reduced modulo the synodic month. Nothing here is persisted.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use crate::constants::{MS_PER_DAY, REF_NEW_MOON_MS, SYNODIC_DAYS};
use crate::numbers::{i64_to_f64, round_f64_to_pct, round_to_tenth};

/// The four named quarters of the lunar cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKey {
    New,
    First,
    Full,
    Last,
}

impl PhaseKey {
    pub const ALL: [Self; 4] = [Self::New, Self::First, Self::Full, Self::Last];

    /// Band a cycle progress value in `[0, 1)`.
    #[must_use]
    pub fn from_progress(progress: f64) -> Self {
        if !(0.125..0.875).contains(&progress) {
            Self::New
        } else if progress < 0.375 {
            Self::First
        } else if progress < 0.625 {
            Self::Full
        } else {
            Self::Last
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::First => "first",
            Self::Full => "full",
            Self::Last => "last",
        }
    }

    /// The phase that follows this one as time moves forward.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::New => Self::First,
            Self::First => Self::Full,
            Self::Full => Self::Last,
            Self::Last => Self::New,
        }
    }

    #[must_use]
    pub fn descriptor(self) -> &'static PhaseDescriptor {
        match self {
            Self::New => &PHASE_DETAILS[0],
            Self::First => &PHASE_DETAILS[1],
            Self::Full => &PHASE_DETAILS[2],
            Self::Last => &PHASE_DETAILS[3],
        }
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "first" => Ok(Self::First),
            "full" => Ok(Self::Full),
            "last" => Ok(Self::Last),
            other => Err(format!("unknown moon phase: {other}")),
        }
    }
}

/// Static copy and tuning attached to a phase.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDescriptor {
    pub name: &'static str,
    pub emoji: &'static str,
    pub mood: &'static str,
    pub action_score: u8,
    pub tone: &'static str,
    pub ritual: &'static str,
    pub accent: &'static str,
}

static PHASE_DETAILS: [PhaseDescriptor; 4] = [
    PhaseDescriptor {
        name: "New Moon",
        emoji: "🌑",
        mood: "Quiet your mind, set an intention, and let your heart slowly wake up.",
        action_score: 32,
        tone: "whispered, seed-planting, hopeful but gentle",
        ritual: "I plant this seed of intention. May it rest safely in this bottle and grow into the reality I dream of.",
        accent: "#9be4ff",
    },
    PhaseDescriptor {
        name: "First Quarter",
        emoji: "🌓",
        mood: "Curiosity. Initiation. Experimentation.",
        action_score: 68,
        tone: "curious, forward-leaning, lightly electric",
        ritual: "Take the smallest step and affirm. This is enough",
        accent: "#b6ffb3",
    },
    PhaseDescriptor {
        name: "Full Moon",
        emoji: "🌕",
        mood: "Release, celebrate, and let the light shine upon the results and the truth.",
        action_score: 90,
        tone: "luminous, celebratory, honest, heart-open",
        ritual: "Write a Full Moon blessing to read to a friend or yourself.",
        accent: "#ffd38f",
    },
    PhaseDescriptor {
        name: "Last Quarter",
        emoji: "🌗",
        mood: "Practice subtraction, wrap things up, and leave space for your energy to return.",
        action_score: 54,
        tone: "clearing, reflective, softly decisive",
        ritual: "Remove one burden and leave yourself a little breathing room.",
        accent: "#b8b0ff",
    },
];

/// A labelled tick on the cycle dial, `position` in percent of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoonMarker {
    pub label: &'static str,
    pub icon: &'static str,
    pub position: u8,
}

pub const MOON_MARKERS: [MoonMarker; 4] = [
    MoonMarker { label: "New Moon", icon: "🌑", position: 0 },
    MoonMarker { label: "First Quarter", icon: "🌓", position: 25 },
    MoonMarker { label: "Full Moon", icon: "🌕", position: 50 },
    MoonMarker { label: "Last Quarter", icon: "🌗", position: 75 },
];

/// Lunar state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonPhase {
    pub phase_key: PhaseKey,
    /// Days since the last new moon, in `[0, SYNODIC_DAYS)`.
    pub age_days: f64,
    /// Fraction of the cycle elapsed, in `[0, 1)`.
    pub progress: f64,
    pub progress_pct: u8,
    pub illumination_pct: u8,
    pub days_to_full: f64,
    pub days_to_new: f64,
    pub action_score: u8,
    pub accent: &'static str,
    pub cycle_length: f64,
}

impl MoonPhase {
    #[must_use]
    pub fn descriptor(&self) -> &'static PhaseDescriptor {
        self.phase_key.descriptor()
    }

    /// Age rounded for display.
    #[must_use]
    pub fn age_days_display(&self) -> f64 {
        round_to_tenth(self.age_days)
    }

    /// One-line summary used on the cycle screen.
    #[must_use]
    pub fn tone_tag(&self) -> String {
        let d = self.descriptor();
        format!(
            "{} {}: {}; Actions: {}/100, Mood: {}",
            d.name, d.emoji, d.tone, d.action_score, d.mood
        )
    }

    /// Tone line injected into completion prompts.
    #[must_use]
    pub fn moon_tone(&self) -> String {
        let d = self.descriptor();
        format!(
            "Moon: {} {}. Mood tilt: {}. Action energy {}/100. Tone: {}.",
            d.name, d.emoji, d.mood, d.action_score, d.tone
        )
    }

    /// Short phase name appended to fallback lines.
    #[must_use]
    pub fn moon_hint(&self) -> &'static str {
        self.descriptor().name
    }
}

/// Forward circular distance in days from `progress` to `target`.
fn days_until(progress: f64, target: f64) -> f64 {
    let mut delta = target - progress;
    if delta < 0.0 {
        delta += 1.0;
    }
    delta * SYNODIC_DAYS
}

/// Compute the phase for a Unix timestamp in milliseconds.
#[must_use]
pub fn compute_phase_millis(timestamp_ms: i64) -> MoonPhase {
    let elapsed_ms = i64_to_f64(timestamp_ms.saturating_sub(REF_NEW_MOON_MS));
    let days_since = elapsed_ms / MS_PER_DAY;
    let mut age = days_since.rem_euclid(SYNODIC_DAYS);
    if !age.is_finite() || age >= SYNODIC_DAYS {
        age = 0.0;
    }
    let mut progress = age / SYNODIC_DAYS;
    if progress >= 1.0 {
        progress = 0.0;
    }
    let illumination = (1.0 - (TAU * progress).cos()) * 50.0;
    let phase_key = PhaseKey::from_progress(progress);
    let detail = phase_key.descriptor();

    MoonPhase {
        phase_key,
        age_days: age,
        progress,
        progress_pct: round_f64_to_pct(progress * 100.0),
        illumination_pct: round_f64_to_pct(illumination),
        days_to_full: days_until(progress, 0.5),
        days_to_new: days_until(progress, 0.0),
        action_score: detail.action_score,
        accent: detail.accent,
        cycle_length: SYNODIC_DAYS,
    }
}

/// Compute the phase for a UTC instant.
#[must_use]
pub fn compute_phase(now: DateTime<Utc>) -> MoonPhase {
    compute_phase_millis(now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reference_epoch_is_new_and_dark() {
        let phase = compute_phase_millis(REF_NEW_MOON_MS);
        assert_eq!(phase.phase_key, PhaseKey::New);
        assert_eq!(phase.illumination_pct, 0);
        assert!(phase.days_to_new.abs() < 1e-9);
        assert!((phase.days_to_full - SYNODIC_DAYS / 2.0).abs() < 1e-9);
    }

    #[test]
    fn half_cycle_is_full_and_bright() {
        let noonish = Utc.with_ymd_and_hms(2001, 1, 21, 12, 36, 0).unwrap();
        let phase = compute_phase(noonish);
        assert_eq!(phase.phase_key, PhaseKey::Full);
        assert_eq!(phase.illumination_pct, 100);
        assert_eq!(phase.action_score, 90);
        assert_eq!(phase.accent, "#ffd38f");
    }

    #[test]
    fn far_past_still_lands_in_range() {
        let phase = compute_phase_millis(i64::MIN / 4);
        assert!((0.0..1.0).contains(&phase.progress));
        assert!((0.0..SYNODIC_DAYS).contains(&phase.age_days));
    }

    #[test]
    fn band_edges() {
        assert_eq!(PhaseKey::from_progress(0.0), PhaseKey::New);
        assert_eq!(PhaseKey::from_progress(0.124_999), PhaseKey::New);
        assert_eq!(PhaseKey::from_progress(0.125), PhaseKey::First);
        assert_eq!(PhaseKey::from_progress(0.375), PhaseKey::Full);
        assert_eq!(PhaseKey::from_progress(0.625), PhaseKey::Last);
        assert_eq!(PhaseKey::from_progress(0.875), PhaseKey::New);
    }

    #[test]
    fn distances_never_negative() {
        for step in 0..1000 {
            let ms = REF_NEW_MOON_MS + i64::from(step) * 3_600_000;
            let phase = compute_phase_millis(ms);
            assert!(phase.days_to_full >= 0.0);
            assert!(phase.days_to_new >= 0.0);
            assert!(phase.days_to_full <= SYNODIC_DAYS);
        }
    }

    #[test]
    fn phase_key_parses_case_insensitively() {
        assert_eq!("FULL".parse::<PhaseKey>(), Ok(PhaseKey::Full));
        assert!("gibbous".parse::<PhaseKey>().is_err());
    }

    #[test]
    fn tone_strings_mention_phase() {
        let phase = compute_phase_millis(REF_NEW_MOON_MS);
        assert!(phase.moon_tone().starts_with("Moon: New Moon"));
        assert!(phase.tone_tag().contains("32/100"));
        assert_eq!(phase.moon_hint(), "New Moon");
    }
}
