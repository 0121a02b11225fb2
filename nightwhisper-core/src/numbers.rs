//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 and clamp it into `0..=100`, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_pct(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    let clamped = value.clamp(0.0, 100.0).round();
    cast::<f64, u8>(clamped).unwrap_or(0)
}

/// Round a f64 to one decimal place, returning 0.0 for non-finite values.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_rounding_clamps_and_handles_nan() {
        assert_eq!(round_f64_to_pct(49.5), 50);
        assert_eq!(round_f64_to_pct(120.0), 100);
        assert_eq!(round_f64_to_pct(-3.0), 0);
        assert_eq!(round_f64_to_pct(f64::NAN), 0);
    }

    #[test]
    fn tenth_rounding() {
        assert!((round_to_tenth(14.76) - 14.8).abs() < f64::EPSILON);
        assert!((round_to_tenth(f64::INFINITY)).abs() < f64::EPSILON);
    }
}
