//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a count to i64, saturating at `i64::MAX`.
#[must_use]
pub fn usize_to_i64(value: usize) -> i64 {
    cast::<usize, i64>(value).unwrap_or(i64::MAX)
}

/// Convert a configured multiplier to a count, saturating at `usize::MAX`.
#[must_use]
pub fn u32_to_usize(value: u32) -> usize {
    cast::<u32, usize>(value).unwrap_or(usize::MAX)
}

/// Integer ceiling division for positive divisors; zero when `divisor <= 0`.
#[must_use]
pub fn ceil_div_i64(value: i64, divisor: i64) -> i64 {
    if divisor <= 0 {
        return 0;
    }
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient.saturating_add(1)
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_conversions_saturate() {
        assert!((usize_to_f64(3) - 3.0).abs() < f64::EPSILON);
        assert_eq!(usize_to_i64(12), 12);
        assert_eq!(u32_to_usize(4), 4);
    }

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div_i64(4, 3), 2);
        assert_eq!(ceil_div_i64(3, 3), 1);
        assert_eq!(ceil_div_i64(0, 3), 0);
        assert_eq!(ceil_div_i64(5, 0), 0);
    }
}
