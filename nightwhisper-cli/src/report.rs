//! Console rendering for engine results.
use colored::Colorize;
use nightwhisper_core::{
    ActiveSecret, AffirmationRecord, ChatReply, CrystalRecommendation, CrystalSnapshot,
    DailySecretRecord, MOON_MARKERS, MoonPhase, Resonance, SpreadReading, TarotCard, UsageStatus,
    WishRecord,
};

pub fn heading(title: &str) -> String {
    format!("{}\n{}\n", title.bright_magenta().bold(), "-".repeat(30).magenta())
}

pub fn moon_text(moon: &MoonPhase) -> String {
    let d = moon.descriptor();
    let mut out = heading(&format!("{} {}", d.emoji, d.name));
    out.push_str(&format!("Age: {} days of {:.2}\n", moon.age_days_display(), moon.cycle_length));
    out.push_str(&format!(
        "Progress: {}%   Illumination: {}%\n",
        moon.progress_pct, moon.illumination_pct
    ));
    out.push_str(&format!(
        "To full: {:.1} days   To new: {:.1} days\n",
        moon.days_to_full, moon.days_to_new
    ));
    let dial: Vec<String> = MOON_MARKERS
        .iter()
        .map(|m| format!("{} {}%", m.icon, m.position))
        .collect();
    out.push_str(&format!("Dial: {}\n", dial.join("  ")));
    out.push_str(&format!("{}\n", moon.tone_tag().italic()));
    out.push_str(&format!("Ritual: {}\n", d.ritual));
    out
}

pub fn secret_text(record: &DailySecretRecord, active: Option<&ActiveSecret>) -> String {
    let mut out = heading(&format!("Secret for {}", record.date));
    match active {
        Some(secret) => {
            out.push_str(&format!("✨ {}\n", secret.kind.label.bright_yellow().bold()));
            out.push_str(&format!("{}\n", secret.kind.desc));
            if let Some(line) = secret.prophecy() {
                out.push_str(&format!("“{}”\n", line.italic()));
            }
        }
        None => {
            out.push_str(&format!("{}\n", "The night keeps its secret today.".dimmed()));
        }
    }
    out
}

pub fn card_text(card: &TarotCard) -> String {
    format!(
        "🃏 {} {}\n",
        card.name.bright_cyan().bold(),
        format!("({})", card.keywords.join(", ")).dimmed()
    )
}

pub fn resonance_text(resonance: &Resonance) -> String {
    let line = if resonance.aligned {
        resonance.line.green().to_string()
    } else {
        resonance.line.yellow().to_string()
    };
    format!("{line}\n{}\n", resonance.note.dimmed())
}

pub fn lines_text(lines: &[String]) -> String {
    lines.iter().fold(String::new(), |mut out, line| {
        out.push_str(&format!("  • {line}\n"));
        out
    })
}

pub fn snapshot_text(snapshot: &CrystalSnapshot) -> String {
    let mut out = format!(
        "{} {} ({}) energy {}\n",
        snapshot.emoji,
        snapshot.name.bright_green().bold(),
        snapshot.alias,
        snapshot.energy
    );
    if let Some(nightly) = &snapshot.nightly {
        out.push_str(&format!("  {nightly}\n"));
    }
    if let Some(note) = &snapshot.guardian_note {
        out.push_str(&format!("  {}\n", note.dimmed()));
    }
    out
}

pub fn grant_text(snapshot: Option<&CrystalSnapshot>, status: UsageStatus) -> String {
    match snapshot {
        Some(snapshot) => format!("{}{}", "Crystal claimed:\n".green(), snapshot_text(snapshot)),
        None => format!(
            "{} ({}/{} claimed today)\n",
            "No crystal tonight.".yellow(),
            status.used,
            status.limit
        ),
    }
}

pub fn spread_text(spread: &SpreadReading) -> String {
    let mut out = heading("Past · Present · Future");
    for slot in &spread.slots {
        out.push_str(&format!(
            "{} {}\n",
            format!("{}:", slot.position.label()).bright_blue().bold(),
            slot.card_name
        ));
        out.push_str(&lines_text(&slot.lines));
        out.push_str(&format!(
            "  {} {} {}\n",
            slot.crystal.emoji,
            slot.crystal.name,
            format!("· {}", slot.crystal.note).dimmed()
        ));
    }
    out
}

pub fn chat_text(reply: &ChatReply) -> String {
    let mut out = heading("Night words");
    for card in &reply.cards {
        out.push_str(&format!("{} {}\n", format!("{}:", card.name).bright_cyan(), card.night_words));
    }
    out.push_str(&format!("✦ {}\n", reply.stardust));
    if let Some(starfall) = &reply.starfall {
        out.push_str(&format!("{}\n", format!("☄ {starfall}").bright_yellow()));
    }
    out
}

pub fn recommendation_text(rec: Option<&CrystalRecommendation>) -> String {
    let Some(rec) = rec else {
        return "No crystal answers tonight.\n".dimmed().to_string();
    };
    let mut out = heading(&format!("{} · {}", rec.name, rec.alias));
    out.push_str(&format!("{}\n", rec.reason));
    out.push_str(&format!("{}\n", rec.focus.italic()));
    out
}

pub fn garden_text(items: &[CrystalSnapshot], status: UsageStatus) -> String {
    let mut out = heading(&format!(
        "Crystal garden ({} kept, {}/{} claimed today)",
        items.len(),
        status.used,
        status.limit
    ));
    if items.is_empty() {
        out.push_str(&format!("{}\n", "Nothing collected yet.".dimmed()));
    }
    for item in items {
        out.push_str(&format!("{} ", item.date.as_str().dimmed()));
        out.push_str(&snapshot_text(item));
    }
    out
}

pub fn affirmation_text(record: &AffirmationRecord) -> String {
    let mut marks = String::new();
    if record.cover {
        marks.push_str(" [cover]");
    }
    if record.favorite {
        marks.push_str(" ★");
    }
    format!(
        "{} {}{}\n",
        record.id.dimmed(),
        record.text,
        marks.bright_yellow()
    )
}

pub fn wish_text(today: Option<&WishRecord>, whisper: Option<&str>, history: &[WishRecord]) -> String {
    let mut out = heading("Dream Bottle");
    if let Some(line) = whisper {
        out.push_str(&format!("{}\n", line.bright_yellow().italic()));
    }
    match today {
        Some(wish) => out.push_str(&format!("Tonight: {}\n", wish.text.bright_cyan())),
        None => out.push_str(&format!("{}\n", "No wish in the bottle tonight.".dimmed())),
    }
    for wish in history.iter().filter(|w| today.is_none_or(|t| t.date != w.date)) {
        out.push_str(&format!("{} {}\n", wish.date.as_str().dimmed(), wish.text));
    }
    out
}

pub fn limit_text(action: &str, status: UsageStatus) -> String {
    format!(
        "{} ({}/{} used)\n",
        format!("No {action} left.").yellow(),
        status.used,
        status.limit
    )
}
