//! Simple Moving Average (SMA).
//!
//! Trailing mean of closes over a fixed window. Undefined until a full
//! window of closes is available.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Average of the trailing window ending at the last close, if defined.
    pub fn last(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        let mean = window.iter().sum::<f64>() / self.period as f64;
        (!mean.is_nan()).then_some(mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn last_averages_trailing_window() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        assert_approx(Sma::new(5).last(&closes).unwrap(), 14.0, DEFAULT_EPSILON);
        assert_approx(Sma::new(1).last(&closes).unwrap(), 16.0, DEFAULT_EPSILON);
    }

    #[test]
    fn last_ignores_nan_outside_window() {
        let closes = [10.0, f64::NAN, 13.0, 14.0, 15.0];
        assert_approx(Sma::new(3).last(&closes).unwrap(), 14.0, DEFAULT_EPSILON);
        assert_eq!(Sma::new(4).last(&closes), None);
    }

    #[test]
    fn last_is_none_when_too_short() {
        assert_eq!(Sma::new(5).last(&[1.0, 2.0]), None);
    }
}
