use chrono::{Duration, TimeZone, Utc};
use nightwhisper_core::constants::{KEY_CHAT_DAILY, MS_PER_DAY, REF_NEW_MOON_MS, SYNODIC_DAYS};
use nightwhisper_core::crystal::{self, GrantPolicy};
use nightwhisper_core::usage::{self, UsageScope};
use nightwhisper_core::{
    CRYSTAL_LIBRARY, CrystalContext, DateKey, MemoryStore, PhaseKey, SnapshotContext,
    UnavailableStore, compute_phase_millis, normalize, recommend, roll_or_replay,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn period_ms() -> i64 {
    (SYNODIC_DAYS * MS_PER_DAY).round() as i64
}

fn day_offset(days: i64) -> DateKey {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    DateKey::from_utc(base + Duration::days(days))
}

#[test]
fn one_period_visits_each_phase_once_in_order() {
    let step = 6 * 60 * 60 * 1000;
    let start = REF_NEW_MOON_MS + 60_000;
    let mut visited = vec![compute_phase_millis(start).phase_key];
    let mut t = start;
    while t < start + period_ms() {
        t += step;
        let key = compute_phase_millis(t).phase_key;
        if visited.last() != Some(&key) {
            visited.push(key);
        }
    }
    assert_eq!(
        visited,
        [
            PhaseKey::New,
            PhaseKey::First,
            PhaseKey::Full,
            PhaseKey::Last,
            PhaseKey::New
        ]
    );
}

#[test]
fn phase_is_periodic() {
    for t in [0_i64, 1_234_567_890_123, 1_700_000_000_000, -5_000_000_000] {
        let a = compute_phase_millis(t);
        let b = compute_phase_millis(t + period_ms());
        assert_eq!(a.phase_key, b.phase_key);
        assert!((a.progress - b.progress).abs() < 1e-6);
        assert!((0.0..1.0).contains(&a.progress));
        assert!((0.0..SYNODIC_DAYS).contains(&a.age_days));
    }
}

#[test]
fn secret_replays_within_a_day_for_any_rng() {
    let store = MemoryStore::new();
    let today = day_offset(0);
    let first = roll_or_replay(&today, &store, &mut ChaCha8Rng::seed_from_u64(1), 0.5);
    for seed in 2..20 {
        let again = roll_or_replay(&today, &store, &mut ChaCha8Rng::seed_from_u64(seed), 0.5);
        assert_eq!(again, first);
    }
}

#[test]
fn secret_without_storage_still_rolls() {
    let today = day_offset(0);
    let record = roll_or_replay(&today, &UnavailableStore, &mut ChaCha8Rng::seed_from_u64(3), 1.0);
    assert!(record.hit);
    assert_eq!(record.date, today);
}

#[test]
fn limiter_never_exceeds_cap() {
    let store = MemoryStore::new();
    let today = day_offset(0);
    let allowed = (0..10)
        .filter(|_| usage::try_consume(&store, KEY_CHAT_DAILY, UsageScope::Daily, 5, &today).allowed)
        .count();
    assert_eq!(allowed, 5);
    let tomorrow = day_offset(1);
    assert!(usage::try_consume(&store, KEY_CHAT_DAILY, UsageScope::Daily, 5, &tomorrow).allowed);
}

#[test]
fn normalizer_always_returns_expected_count() {
    let inputs = [
        None,
        Some(""),
        Some("only one"),
        Some("a\na\nb"),
        Some(r#"{"lines": ["x", "y", "z", "w"]}"#),
        Some("[1, 2"),
        Some("   \n  \n"),
    ];
    for raw in inputs {
        for expected in [1, 3, 5] {
            let lines = normalize(raw, expected, "star", |_| vec!["fb one".into(), "fb two".into()]);
            assert_eq!(lines.len(), expected, "input {raw:?}");
            assert!(lines.iter().all(|line| !line.trim().is_empty()));
        }
    }
}

#[test]
fn bright_day_full_moon_optimism_is_citrine() {
    let ctx = CrystalContext {
        weather: Some("day"),
        moon: Some(PhaseKey::Full),
        emotion: Some("optimism"),
    };
    let rec = recommend(ctx, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
    assert_eq!(rec.id, "citrine");
    assert_eq!(rec.reason, "Weather mood: day · Moon: full · Emotion: optimism");
}

#[test]
fn grants_stop_at_daily_limit() {
    let store = MemoryStore::new();
    let today = day_offset(0);
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let policy = GrantPolicy {
        daily_limit: 2,
        collection_cap: 24,
    };
    let granted: Vec<_> = (0..3)
        .map(|_| crystal::grant(&store, "amethyst", SnapshotContext::default(), &today, policy, &mut rng))
        .collect();
    assert!(granted[0].is_some());
    assert!(granted[1].is_some());
    assert!(granted[2].is_none());
}

#[test]
fn collection_stays_capped_after_many_days() {
    let store = MemoryStore::new();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let policy = GrantPolicy {
        daily_limit: 1,
        collection_cap: 4,
    };
    for day in 0..100 {
        let id = CRYSTAL_LIBRARY[usize::try_from(day).unwrap() % CRYSTAL_LIBRARY.len()].id;
        let granted = crystal::grant(
            &store,
            id,
            SnapshotContext::default(),
            &day_offset(day),
            policy,
            &mut rng,
        );
        assert!(granted.is_some());
    }
    let garden = crystal::CrystalGarden::load(&store, 24);
    assert_eq!(garden.len(), 4);
    assert_eq!(garden.items()[0].date, day_offset(99));
}
