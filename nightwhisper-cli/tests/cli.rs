use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "nightwhisper-cli-{label}-{}.json",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

const DEFAULT_AT: &str = "2024-09-17T21:00:00Z";

fn run_json(state: &Path, args: &[&str]) -> Value {
    run_json_at(state, DEFAULT_AT, args)
}

fn run_json_at(state: &Path, at: &str, args: &[&str]) -> Value {
    let exe = env!("CARGO_BIN_EXE_nightwhisper");
    let output = Command::new(exe)
        .args(args)
        .arg("--state")
        .arg(state)
        .args(["--format", "json", "--offline", "--seed", "11"])
        .args(["--at", at])
        .output()
        .expect("run cli");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn moon_reports_full_moon_on_known_date() {
    let state = temp_path("moon");
    let value = run_json_at(&state, "2024-09-30T12:00:00Z", &["moon"]);
    assert_eq!(value["phase"]["phaseKey"], "full");
    assert_eq!(value["markers"].as_array().map(Vec::len), Some(4));

    let early = run_json(&state, &["moon"]);
    assert_eq!(early["phase"]["phaseKey"], "new");
    let _ = std::fs::remove_file(state);
}

#[test]
fn draw_claims_one_guardian_per_day() {
    let state = temp_path("draw");
    let first = run_json(&state, &["draw", "--hour", "22"]);
    assert_eq!(first["lines"].as_array().map(Vec::len), Some(3));
    assert!(first["guardian"].is_object());
    assert_eq!(first["guardian"]["source"], "draw");

    let second = run_json(&state, &["draw", "--no-reading"]);
    assert!(second["guardian"].is_null());
    assert_eq!(second["crystalStatus"]["used"], 1);

    let garden = run_json(&state, &["garden"]);
    assert_eq!(garden["items"].as_array().map(Vec::len), Some(1));
    let _ = std::fs::remove_file(state);
}

#[test]
fn secret_replays_from_state_file() {
    let state = temp_path("secret");
    let first = run_json(&state, &["secret"]);
    let stored: Value =
        serde_json::from_str(&std::fs::read_to_string(&state).expect("state written")).unwrap();
    assert_eq!(stored["nightwhisper.secretSeed"], first["record"]);
    let again = run_json(&state, &["secret"]);
    assert_eq!(first["record"], again["record"]);
    let _ = std::fs::remove_file(state);
}

#[test]
fn spreads_lock_after_free_uses() {
    let state = temp_path("spread");
    for _ in 0..3 {
        let value = run_json(&state, &["spread"]);
        assert_eq!(value["allowed"], true);
        assert_eq!(value["spread"]["slots"].as_array().map(Vec::len), Some(3));
    }
    let locked = run_json(&state, &["spread"]);
    assert_eq!(locked["allowed"], false);
    assert_eq!(locked["status"]["remaining"], 0);
    let _ = std::fs::remove_file(state);
}

#[test]
fn affirmation_cover_can_move() {
    let state = temp_path("affirm");
    let first = run_json(&state, &["affirm", "--card", "star", "--cover"]);
    assert_eq!(first["saved"]["cover"], true);
    assert_eq!(first["saved"]["cardName"], "The Star");
    let listed = run_json(&state, &["affirmations"]);
    assert_eq!(listed["items"].as_array().map(Vec::len), Some(1));
    let _ = std::fs::remove_file(state);
}

#[test]
fn wish_replaces_then_clears_tonights_entry() {
    let state = temp_path("wish");
    run_json(&state, &["wish", "first"]);
    let edited = run_json(&state, &["wish", "see the northern sea"]);
    assert_eq!(edited["today"]["text"], "see the northern sea");
    assert_eq!(edited["today"]["date"], "2024-09-17");
    assert_eq!(edited["items"].as_array().map(Vec::len), Some(1));

    let stored: Value =
        serde_json::from_str(&std::fs::read_to_string(&state).expect("state written")).unwrap();
    assert_eq!(stored["dreamBottleWishes"][0]["text"], "see the northern sea");

    let cleared = run_json(&state, &["wish", "--clear"]);
    assert!(cleared["today"].is_null());
    assert_eq!(cleared["items"].as_array().map(Vec::len), Some(0));
    let _ = std::fs::remove_file(state);
}

#[test]
fn recommend_reads_card_mood() {
    let state = temp_path("recommend");
    let config = temp_path("recommend-config");
    std::fs::write(&config, r#"{"secretProbability": 0.0}"#).unwrap();
    let config_arg = config.to_string_lossy().into_owned();
    let value = run_json(
        &state,
        &[
            "recommend",
            "--hour",
            "12",
            "--card",
            "sun",
            "--weathercode",
            "0",
            "--config",
            &config_arg,
        ],
    );
    assert_eq!(value["recommendation"]["id"], "citrine");
    let _ = std::fs::remove_file(state);
    let _ = std::fs::remove_file(config);
}

#[test]
fn unknown_crystal_fails_cleanly() {
    let exe = env!("CARGO_BIN_EXE_nightwhisper");
    let state = temp_path("grant");
    let output = Command::new(exe)
        .args(["grant", "jade", "--offline", "--state"])
        .arg(&state)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown crystal id"));
}
