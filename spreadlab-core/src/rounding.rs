//! Price rounding.
//!
//! Ties go to the even neighbour, so `0.125` rounds to `0.12` and `4482.5`
//! rounds to `4482`. Band edges and quote mids are reproducible across runs
//! only if every stage rounds the same way.

/// Round to the nearest whole price unit, ties to even.
pub fn round_whole(value: f64) -> f64 {
    value.round_ties_even()
}

/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Round to cents.
pub fn round_cents(value: f64) -> f64 {
    round_to(value, 2)
}
