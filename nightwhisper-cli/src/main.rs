mod backend;
mod report;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Timelike, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use backend::{FileStore, completion_backend};
use nightwhisper_core::{
    AffirmationDraft, CrystalContext, DateKey, EngineConfig, MOON_MARKERS, NightEngine,
    PendingRequest, ReadingOutcome, SaveOptions, TarotCard, TextCompletion, card_by_id,
    infer_card_mood, resonance,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Colored console text
    Text,
    /// Pretty JSON
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "nightwhisper", version)]
#[command(about = "NightWhisper night oracle - moon cycle, daily secrets, readings and crystals")]
struct Cli {
    /// JSON file holding persisted state
    #[arg(long, global = true, default_value = "nightwhisper-state.json")]
    state: PathBuf,

    /// Seed for reproducible draws and rolls
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Engine config JSON (missing fields take defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Text-completion proxy endpoint
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// Override the completion timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Never call the proxy; use local fallback text
    #[arg(long, global = true)]
    offline: bool,

    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long, global = true)]
    at: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Optional path to write output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct SkyArgs {
    /// Local hour (0-23); defaults to the hour of the evaluated instant
    #[arg(long)]
    hour: Option<u32>,

    /// WMO weather code
    #[arg(long)]
    weathercode: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current moon phase
    Moon,
    /// Show today's secret roll
    Secret,
    /// Draw a card, claim its guardian crystal, and read it
    Draw {
        #[command(flatten)]
        sky: SkyArgs,

        /// Skip the reading text
        #[arg(long)]
        no_reading: bool,
    },
    /// Draw a past / present / future spread (limited free uses)
    Spread,
    /// Ask the chat oracle a question (limited per day)
    Chat { question: String },
    /// Recommend tonight's crystal
    Recommend {
        #[command(flatten)]
        sky: SkyArgs,

        /// Card id whose mood casts the emotion vote
        #[arg(long)]
        card: Option<String>,

        /// Emotion key, overriding the card's mood
        #[arg(long)]
        emotion: Option<String>,
    },
    /// Claim a specific crystal against today's allowance
    Grant {
        crystal: String,

        #[arg(long)]
        source: Option<String>,
    },
    /// List the crystal garden
    Garden,
    /// Write a night affirmation and save it
    Affirm {
        /// Card id to write the affirmation for
        #[arg(long)]
        card: Option<String>,

        /// Save as favorite
        #[arg(long)]
        favorite: bool,

        /// Make it the cover affirmation
        #[arg(long)]
        cover: bool,
    },
    /// List saved affirmations, optionally choosing a new cover
    Affirmations {
        #[arg(long)]
        cover: Option<String>,
    },
    /// Show the Dream Bottle, or put tonight's wish in it
    Wish {
        /// Tonight's wish; replaces any earlier wish from today
        text: Option<String>,

        /// Remove tonight's wish
        #[arg(long, conflicts_with = "text")]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.output.is_some() {
        colored::control::set_override(false);
    }
    let mut output_target = OutputTarget::new(cli.output.clone())?;
    run(&cli, &mut output_target).await?;
    output_target.flush_inner()?;
    Ok(())
}

fn load_config(path: Option<&Path>, timeout_ms: Option<u64>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            EngineConfig::from_json(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(ms) = timeout_ms {
        config.completion_timeout_ms = ms;
        config.validate().context("invalid --timeout-ms")?;
    }
    Ok(config)
}

fn resolve_now(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(text) => Ok(DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("--at must be RFC 3339, got {text:?}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn lookup_card(id: Option<&str>) -> Result<Option<&'static TarotCard>> {
    match id {
        Some(id) => match card_by_id(id) {
            Some(card) => Ok(Some(card)),
            None => bail!("unknown card id {id:?}"),
        },
        None => Ok(None),
    }
}

/// One CLI invocation: the engine plus the instant it runs at.
struct Session {
    engine: NightEngine<FileStore>,
    backend: Box<dyn TextCompletion>,
    now: DateTime<Utc>,
    today: DateKey,
    format: Format,
}

impl Session {
    fn local_hour(&self, sky: &SkyArgs) -> u32 {
        sky.hour
            .unwrap_or_else(|| self.now.with_timezone(&Local).hour())
            .min(23)
    }

    fn emit(&self, out: &mut dyn Write, value: &Value, text: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *out, value)?;
                writeln!(out)?;
            }
            Format::Text => write!(out, "{}", text())?,
        }
        Ok(())
    }

    async fn ask(&mut self, pending: PendingRequest) -> Option<ReadingOutcome> {
        self.engine.complete(self.backend.as_ref(), pending).await
    }
}

async fn run(cli: &Cli, out: &mut OutputTarget) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.timeout_ms)?;
    let store = FileStore::open(&cli.state)
        .with_context(|| format!("failed to open state file {}", cli.state.display()))?;
    let backend = completion_backend(
        cli.proxy_url.as_deref(),
        cli.offline,
        config.completion_timeout(),
    );
    let engine = match cli.seed {
        Some(seed) => NightEngine::with_seed(store, config, seed),
        None => NightEngine::new(store, config),
    };
    let now = resolve_now(cli.at.as_deref())?;
    let mut session = Session {
        engine,
        backend,
        now,
        today: DateKey::from_utc(now),
        format: cli.format,
    };
    log::debug!(
        "state {} at {}",
        session.engine.store().path().display(),
        session.today
    );

    let out = out.writer();
    match &cli.command {
        Command::Moon => cmd_moon(&session, out),
        Command::Secret => cmd_secret(&mut session, out),
        Command::Draw { sky, no_reading } => cmd_draw(&mut session, out, sky, *no_reading).await,
        Command::Spread => cmd_spread(&mut session, out).await,
        Command::Chat { question } => cmd_chat(&mut session, out, question).await,
        Command::Recommend {
            sky,
            card,
            emotion,
        } => cmd_recommend(&mut session, out, sky, card.as_deref(), emotion.as_deref()),
        Command::Grant { crystal, source } => {
            cmd_grant(&mut session, out, crystal, source.clone())
        }
        Command::Garden => cmd_garden(&session, out),
        Command::Affirm {
            card,
            favorite,
            cover,
        } => {
            let opts = SaveOptions {
                toggle_favorite: *favorite,
                mark_cover: *cover,
            };
            cmd_affirm(&mut session, out, card.as_deref(), opts).await
        }
        Command::Affirmations { cover } => cmd_affirmations(&session, out, cover.as_deref()),
        Command::Wish { text, clear } => {
            let edit = if *clear { Some("") } else { text.as_deref() };
            cmd_wish(&mut session, out, edit)
        }
    }
}

fn cmd_moon(session: &Session, out: &mut dyn Write) -> Result<()> {
    let moon = session.engine.moon(session.now);
    let value = json!({
        "phase": moon,
        "descriptor": moon.descriptor(),
        "ageDaysDisplay": moon.age_days_display(),
        "toneTag": moon.tone_tag(),
        "markers": MOON_MARKERS,
        "refreshSecs": session.engine.config().moon_refresh().as_secs(),
    });
    session.emit(out, &value, || report::moon_text(&moon))
}

fn cmd_secret(session: &mut Session, out: &mut dyn Write) -> Result<()> {
    let today = session.today.clone();
    let record = session.engine.daily_secret(&today);
    let active = session.engine.active_secret(&today);
    let value = json!({ "record": record, "active": active });
    session.emit(out, &value, || report::secret_text(&record, active.as_ref()))
}

async fn cmd_draw(
    session: &mut Session,
    out: &mut dyn Write,
    sky: &SkyArgs,
    no_reading: bool,
) -> Result<()> {
    let today = session.today.clone();
    let Some(card) = session.engine.draw_card(&today) else {
        bail!("the deck is empty");
    };
    let hour = session.local_hour(sky);
    let theme = session.engine.weather_theme(&today, hour, sky.weathercode);
    let echo = resonance(theme, card);
    let guardian = session.engine.grant_card_guardian(card, &today);
    let status = session.engine.crystal_status(&today);

    let lines = if no_reading {
        Vec::new()
    } else {
        let moon = session.engine.moon(session.now);
        let pending = session.engine.begin_reading(card, Some(&moon));
        match session.ask(pending).await {
            Some(ReadingOutcome::Reading { lines, .. }) => lines,
            _ => Vec::new(),
        }
    };

    let value = json!({
        "card": card,
        "weather": theme,
        "resonance": echo,
        "guardian": guardian,
        "crystalStatus": status,
        "lines": lines,
    });
    session.emit(out, &value, || {
        let mut text = report::card_text(card);
        text.push_str(&report::resonance_text(&echo));
        text.push_str(&report::lines_text(&lines));
        text.push_str(&report::grant_text(guardian.as_ref(), status));
        text
    })
}

async fn cmd_spread(session: &mut Session, out: &mut dyn Write) -> Result<()> {
    let today = session.today.clone();
    let moon = session.engine.moon(session.now);
    let Some(pending) = session.engine.begin_spread(&today, Some(&moon)) else {
        let status = session.engine.spread_status(&today);
        let value = json!({ "allowed": false, "status": status });
        return session.emit(out, &value, || report::limit_text("free spreads", status));
    };
    let status = session.engine.spread_status(&today);
    let Some(ReadingOutcome::Spread(spread)) = session.ask(pending).await else {
        bail!("spread request was superseded");
    };
    let value = json!({ "allowed": true, "status": status, "spread": spread });
    session.emit(out, &value, || report::spread_text(&spread))
}

async fn cmd_chat(session: &mut Session, out: &mut dyn Write, question: &str) -> Result<()> {
    let today = session.today.clone();
    if question.trim().is_empty() {
        bail!("ask a question first");
    }
    let Some(pending) = session.engine.begin_chat(&today, question) else {
        let status = session.engine.chat_status(&today);
        let value = json!({ "allowed": false, "status": status });
        return session.emit(out, &value, || report::limit_text("chat turns today", status));
    };
    let status = session.engine.chat_status(&today);
    let Some(ReadingOutcome::Chat(reply)) = session.ask(pending).await else {
        bail!("chat request was superseded");
    };
    let value = json!({ "allowed": true, "status": status, "reply": reply });
    session.emit(out, &value, || report::chat_text(&reply))
}

fn cmd_recommend(
    session: &mut Session,
    out: &mut dyn Write,
    sky: &SkyArgs,
    card: Option<&str>,
    emotion: Option<&str>,
) -> Result<()> {
    let today = session.today.clone();
    let card = lookup_card(card)?;
    let hour = session.local_hour(sky);
    let theme = session.engine.weather_theme(&today, hour, sky.weathercode);
    let moon = session.engine.moon(session.now);
    let emotion = emotion.or_else(|| card.map(|c| infer_card_mood(Some(c))));
    let rec = session.engine.recommend(CrystalContext {
        weather: Some(theme.as_str()),
        moon: Some(moon.phase_key),
        emotion,
    });
    let value = json!({ "recommendation": rec });
    session.emit(out, &value, || report::recommendation_text(rec.as_ref()))
}

fn cmd_grant(
    session: &mut Session,
    out: &mut dyn Write,
    crystal: &str,
    source: Option<String>,
) -> Result<()> {
    if nightwhisper_core::crystal_by_id(crystal).is_none() {
        bail!("unknown crystal id {crystal:?}");
    }
    let today = session.today.clone();
    let ctx = nightwhisper_core::SnapshotContext {
        source,
        ..Default::default()
    };
    let snapshot = session.engine.grant_crystal(crystal, ctx, &today);
    let status = session.engine.crystal_status(&today);
    let value = json!({ "granted": snapshot, "status": status });
    session.emit(out, &value, || report::grant_text(snapshot.as_ref(), status))
}

fn cmd_garden(session: &Session, out: &mut dyn Write) -> Result<()> {
    let garden = session.engine.garden();
    let status = session.engine.crystal_status(&session.today);
    let value = json!({ "items": garden.items(), "status": status });
    session.emit(out, &value, || report::garden_text(garden.items(), status))
}

async fn cmd_affirm(
    session: &mut Session,
    out: &mut dyn Write,
    card: Option<&str>,
    opts: SaveOptions,
) -> Result<()> {
    let card = lookup_card(card)?;
    let pending = session.engine.begin_affirmation(card);
    let Some(ReadingOutcome::Affirmation(text)) = session.ask(pending).await else {
        bail!("affirmation request was superseded");
    };
    let draft = AffirmationDraft::new(card.map(|c| c.name), session.now.timestamp_millis(), text);
    let Some(record) = session.engine.save_affirmation(&draft, opts) else {
        bail!("affirmation came back empty");
    };
    let value = json!({ "saved": record });
    session.emit(out, &value, || {
        format!("{}{}", "Saved:\n".green(), report::affirmation_text(&record))
    })
}

fn cmd_affirmations(session: &Session, out: &mut dyn Write, cover: Option<&str>) -> Result<()> {
    if let Some(id) = cover
        && !session.engine.set_affirmation_cover(id)
    {
        bail!("no saved affirmation {id:?}");
    }
    let book = session.engine.affirmations();
    let value = json!({ "items": book.items() });
    session.emit(out, &value, || {
        let mut text = report::heading("Affirmations");
        for record in book.items() {
            text.push_str(&report::affirmation_text(record));
        }
        text
    })
}

fn cmd_wish(session: &mut Session, out: &mut dyn Write, edit: Option<&str>) -> Result<()> {
    let today = session.today.clone();
    if let Some(text) = edit {
        session
            .engine
            .write_wish(&today, text, session.now.timestamp_millis());
    }
    let whisper = session.engine.bottle_whisper(&today);
    let bottle = session.engine.wishes();
    let tonight = bottle.for_day(&today);
    let value = json!({ "today": tonight, "whisper": whisper, "items": bottle.items() });
    session.emit(out, &value, || report::wish_text(tonight, whisper, bottle.items()))
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides_and_timeout_flag() {
        let path = std::env::temp_dir().join(format!(
            "nightwhisper-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"chatDailyLimit": 2}"#).unwrap();
        let config = load_config(Some(&path), Some(500)).unwrap();
        assert_eq!(config.chat_daily_limit, 2);
        assert_eq!(config.completion_timeout_ms, 500);
        assert!(load_config(None, Some(0)).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn at_flag_parses_rfc3339() {
        let now = resolve_now(Some("2024-05-01T23:30:00-02:00")).unwrap();
        assert_eq!(DateKey::from_utc(now).as_str(), "2024-05-02");
        assert!(resolve_now(Some("yesterday")).is_err());
    }

    #[test]
    fn unknown_card_is_an_error() {
        assert!(lookup_card(Some("joker")).is_err());
        assert_eq!(lookup_card(Some("sun")).unwrap().map(|c| c.id), Some("sun"));
        assert!(lookup_card(None).unwrap().is_none());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "nightwhisper",
            "draw",
            "--hour",
            "22",
            "--seed",
            "7",
            "--offline",
        ]);
        assert_eq!(cli.seed, Some(7));
        assert!(cli.offline);
        assert!(matches!(cli.command, Command::Draw { sky: SkyArgs { hour: Some(22), .. }, .. }));
    }

    #[test]
    fn wish_text_and_clear_conflict() {
        let cli = Cli::parse_from(["nightwhisper", "wish", "find the lighthouse"]);
        assert!(matches!(
            cli.command,
            Command::Wish { text: Some(ref t), clear: false } if t == "find the lighthouse"
        ));
        assert!(Cli::try_parse_from(["nightwhisper", "wish", "x", "--clear"]).is_err());
    }
}
