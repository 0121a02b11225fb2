//! Weather themes and the weather × card resonance line.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cards::{TarotCard, infer_card_mood};
use crate::secret::{DailySecretRecord, SecretId};

/// Ambient theme derived from local hour and a WMO weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeatherTheme {
    Rain,
    Snow,
    Cloud,
    Day,
    Sunset,
    #[default]
    Night,
    Aurora,
}

impl WeatherTheme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Cloud => "cloud",
            Self::Day => "day",
            Self::Sunset => "sunset",
            Self::Night => "night",
            Self::Aurora => "aurora",
        }
    }

    /// Mood row for this theme. Aurora has none of its own and reads as night.
    #[must_use]
    pub fn mood(self) -> &'static WeatherMood {
        WEATHER_MOODS
            .iter()
            .find(|row| row.theme == self)
            .unwrap_or(&WEATHER_MOODS[2])
    }
}

impl fmt::Display for WeatherTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rain" => Ok(Self::Rain),
            "snow" => Ok(Self::Snow),
            "cloud" => Ok(Self::Cloud),
            "day" | "sun" => Ok(Self::Day),
            "sunset" => Ok(Self::Sunset),
            "night" => Ok(Self::Night),
            "aurora" => Ok(Self::Aurora),
            other => Err(format!("unknown weather theme: {other}")),
        }
    }
}

const RAIN_CODES: [u16; 3] = [51, 61, 63];
const SNOW_CODES: [u16; 2] = [71, 73];
const OVERCAST_CODE: u16 = 3;

/// Theme for a local hour (0-23) and an optional weather code. Precipitation
/// wins over time of day.
#[must_use]
pub fn resolve_theme(hour: u32, weathercode: Option<u16>) -> WeatherTheme {
    match weathercode {
        Some(code) if RAIN_CODES.contains(&code) => WeatherTheme::Rain,
        Some(code) if SNOW_CODES.contains(&code) => WeatherTheme::Snow,
        Some(OVERCAST_CODE) => WeatherTheme::Cloud,
        _ => match hour {
            5..=16 => WeatherTheme::Day,
            17..=18 => WeatherTheme::Sunset,
            _ => WeatherTheme::Night,
        },
    }
}

/// Apply the aurora secret on top of a resolved theme.
#[must_use]
pub fn apply_secret(theme: WeatherTheme, secret: Option<&DailySecretRecord>) -> WeatherTheme {
    if secret.is_some_and(|record| record.is(SecretId::EasterAurora)) {
        WeatherTheme::Aurora
    } else {
        theme
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct WeatherMood {
    pub theme: WeatherTheme,
    pub label: &'static str,
    pub mood: &'static str,
    pub boost: u8,
}

pub static WEATHER_MOODS: [WeatherMood; 6] = [
    WeatherMood { theme: WeatherTheme::Rain, label: "Rain", mood: "introspection", boost: 2 },
    WeatherMood { theme: WeatherTheme::Day, label: "Sun", mood: "optimism", boost: 3 },
    WeatherMood { theme: WeatherTheme::Night, label: "Night", mood: "intuition", boost: 2 },
    WeatherMood { theme: WeatherTheme::Sunset, label: "Sunset", mood: "release", boost: 2 },
    WeatherMood { theme: WeatherTheme::Cloud, label: "Cloud", mood: "grounding", boost: 2 },
    WeatherMood { theme: WeatherTheme::Snow, label: "Snow", mood: "stillness", boost: 2 },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resonance {
    pub line: String,
    pub note: &'static str,
    pub score: u8,
    pub aligned: bool,
}

const NOTE_MATCHED: &str = "Sky and card hum the same note tonight.";
const NOTE_CONTRASTING: &str = "Sky and card pull two ways; let both be true for a while.";

/// How strongly tonight's weather echoes the card's mood, scored 1 to 3.
#[must_use]
pub fn resonance(theme: WeatherTheme, card: &TarotCard) -> Resonance {
    let weather = theme.mood();
    let card_mood = infer_card_mood(Some(card));
    let aligned = weather.mood == card_mood;
    let score = (weather.boost + u8::from(aligned)).clamp(1, 3);
    let descriptor = if aligned {
        card_mood.to_string()
    } else {
        format!("{} ↔ {card_mood}", weather.mood)
    };
    Resonance {
        line: format!("{} × {} → {descriptor} +{score}", weather.label, card.name),
        note: if aligned { NOTE_MATCHED } else { NOTE_CONTRASTING },
        score,
        aligned,
    }
}
