//! Stable salt hashing for deterministic fallback selection.
//!
//! Fallback copy must not change between re-renders of the same card, so
//! pattern choice is derived from a hash of a caller-supplied salt instead of
//! from the session RNG.

pub(crate) fn fnv1a64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash = (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Compose the canonical salt for a card and an optional position label.
#[must_use]
pub fn reading_salt(card_id: &str, label: &str) -> String {
    if label.is_empty() {
        card_id.to_string()
    } else {
        format!("{card_id}:{label}")
    }
}

/// Pick an entry from `options` using the salt and a per-slot offset.
///
/// The same `(salt, offset)` pair always selects the same entry.
#[must_use]
pub fn pick_salted<'a, T>(options: &'a [T], salt: &str, offset: u64) -> Option<&'a T> {
    if options.is_empty() {
        return None;
    }
    let hash = fnv1a64(salt.as_bytes()).wrapping_add(offset.wrapping_mul(0x9e37_79b9));
    let len = options.len() as u64;
    let idx = usize::try_from(hash % len).unwrap_or(0);
    options.get(idx)
}
