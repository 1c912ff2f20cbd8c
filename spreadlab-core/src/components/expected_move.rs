//! Expected-move band from a volatility-index read.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::rounding::{round_to, round_whole};

/// Trading sessions per year used to de-annualize the index level.
pub const ANNUALIZATION_SESSIONS: f64 = 252.0;

/// A symmetric band around the trade-time price.
///
/// `expected_move` is a proportion of price (0.0038 = 0.38%). Both edges are
/// rounded to whole price units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedMove {
    pub vix_value: f64,
    pub price: f64,
    pub daily_move_pct: f64,
    pub expected_move: f64,
    pub lower_price: f64,
    pub upper_price: f64,
}

impl ExpectedMove {
    pub fn width(&self) -> f64 {
        self.upper_price - self.lower_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedMoveCalculator {
    move_adjustment: f64,
}

impl ExpectedMoveCalculator {
    /// `move_adjustment` scales the de-annualized index move; it must be
    /// finite and positive.
    pub fn new(move_adjustment: f64) -> Result<Self, PipelineError> {
        if !move_adjustment.is_finite() || move_adjustment <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "move_adjustment must be positive, got {move_adjustment}"
            )));
        }
        Ok(Self { move_adjustment })
    }

    pub fn compute(&self, vix_value: f64, price: f64) -> Result<ExpectedMove, PipelineError> {
        if !vix_value.is_finite() || vix_value <= 0.0 {
            return Err(PipelineError::unavailable(format!(
                "volatility index value {vix_value}"
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(PipelineError::unavailable(format!("underlying price {price}")));
        }

        let daily_move_pct = round_to(vix_value / ANNUALIZATION_SESSIONS.sqrt(), 2) / 100.0;
        let expected_move = daily_move_pct * self.move_adjustment;
        let half_width = price * expected_move;

        Ok(ExpectedMove {
            vix_value,
            price,
            daily_move_pct,
            expected_move,
            lower_price: round_whole(price - half_width),
            upper_price: round_whole(price + half_width),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn reference_band() {
        let band = ExpectedMoveCalculator::new(0.5).unwrap().compute(12.0, 4500.0).unwrap();
        assert_approx(band.daily_move_pct, 0.0076, 1e-12);
        assert_approx(band.expected_move, 0.0038, 1e-12);
        assert_eq!(band.lower_price, 4483.0);
        assert_eq!(band.upper_price, 4517.0);
        assert_eq!(band.width(), 34.0);
    }

    #[test]
    fn full_adjustment_doubles_the_move() {
        let half = ExpectedMoveCalculator::new(0.5).unwrap().compute(20.0, 5000.0).unwrap();
        let full = ExpectedMoveCalculator::new(1.0).unwrap().compute(20.0, 5000.0).unwrap();
        assert_approx(full.expected_move, 2.0 * half.expected_move, 1e-12);
    }

    #[test]
    fn rejects_unusable_inputs() {
        let calc = ExpectedMoveCalculator::new(0.5).unwrap();
        assert!(calc.compute(f64::NAN, 4500.0).is_err());
        assert!(calc.compute(0.0, 4500.0).is_err());
        assert!(calc.compute(12.0, -1.0).is_err());
    }

    #[test]
    fn non_positive_adjustment_is_an_error() {
        for adj in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let err = ExpectedMoveCalculator::new(adj).unwrap_err();
            assert_eq!(err.kind(), "invalid_parameter");
        }
    }
}
