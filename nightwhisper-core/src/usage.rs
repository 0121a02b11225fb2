//! Daily and lifetime usage counters with a cap.
//!
//! Every call reads, decides, and writes in one synchronous step, so rapid
//! repeated calls cannot spend the same unit twice.
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::date::DateKey;
use crate::store::{Store, StoreExt};

/// Whether a counter resets each UTC day or accumulates forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    Daily,
    Lifetime,
}

/// Persisted counter shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateKey>,
    #[serde(default)]
    pub count: u32,
}

/// Result of a consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Read-only view of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl UsageStatus {
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Decode whatever is stored under a counter key. Older builds stored the
/// lifetime spread count as a bare number (sometimes as a string).
fn read_counter<S: Store + ?Sized>(store: &S, key: &str) -> UsageCounter {
    match store.load::<Value>(key) {
        Some(Value::Number(n)) => UsageCounter {
            date: None,
            count: n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        },
        Some(Value::String(s)) => UsageCounter {
            date: None,
            count: s.trim().parse().unwrap_or(0),
        },
        Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => UsageCounter::default(),
    }
}

/// Count already used in the current window.
fn effective_count(counter: &UsageCounter, scope: UsageScope, today: &DateKey, limit: u32) -> u32 {
    match scope {
        UsageScope::Daily if counter.date.as_ref() != Some(today) => 0,
        UsageScope::Daily => counter.count,
        UsageScope::Lifetime => counter.count.min(limit),
    }
}

/// Inspect a counter without consuming from it.
pub fn peek<S: Store + ?Sized>(
    store: &S,
    key: &str,
    scope: UsageScope,
    limit: u32,
    today: &DateKey,
) -> UsageStatus {
    let used = effective_count(&read_counter(store, key), scope, today, limit);
    UsageStatus {
        used,
        limit,
        remaining: limit.saturating_sub(used),
    }
}

/// Consume one unit if the cap allows it.
///
/// A refused attempt leaves the stored counter untouched. Lifetime counters
/// never store a count above `limit`.
pub fn try_consume<S: Store + ?Sized>(
    store: &S,
    key: &str,
    scope: UsageScope,
    limit: u32,
    today: &DateKey,
) -> UsageDecision {
    let used = effective_count(&read_counter(store, key), scope, today, limit);
    if used >= limit {
        debug!("usage {key} refused at {used}/{limit}");
        return UsageDecision {
            allowed: false,
            remaining: 0,
        };
    }

    let next = used.saturating_add(1).min(limit);
    let counter = match scope {
        UsageScope::Daily => UsageCounter {
            date: Some(today.clone()),
            count: next,
        },
        UsageScope::Lifetime => UsageCounter {
            date: None,
            count: next,
        },
    };
    store.persist(key, &counter);
    UsageDecision {
        allowed: true,
        remaining: limit - next,
    }
}
