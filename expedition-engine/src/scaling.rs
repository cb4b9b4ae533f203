//! Party-size scaling for configured effect magnitudes.
use crate::numbers::{ceil_div_i64, usize_to_i64};

/// Scale `base` by `ceil(party_size / divisor)`.
///
/// A non-positive divisor or an empty party leaves `base` untouched.
#[must_use]
pub fn scale_effect(base: i64, party_size: usize, divisor: i64) -> i64 {
    if divisor <= 0 || party_size == 0 {
        return base;
    }
    let multiplier = ceil_div_i64(usize_to_i64(party_size), divisor);
    base.saturating_mul(multiplier)
}
