//! Trend regime from closes vs. their trailing average.
//!
//! The most recent point is labelled up when its close is strictly above the
//! short (20-period) average. The long (60-period) average is reported when
//! defined but does not affect the label.

use serde::{Deserialize, Serialize};

use crate::domain::{ContractType, DailyBar};
use crate::error::PipelineError;
use crate::indicators::Sma;

/// Binary regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
}

impl Direction {
    /// `1` for up, `0` for down.
    pub fn label(self) -> u8 {
        match self {
            Self::Down => 0,
            Self::Up => 1,
        }
    }

    /// Side of the chain to sell: puts below the band in an up regime,
    /// calls above it in a down regime.
    pub fn side(self) -> ContractType {
        match self {
            Self::Up => ContractType::Put,
            Self::Down => ContractType::Call,
        }
    }
}

/// Result of classifying the latest point of a close series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeReading {
    pub direction: Direction,
    pub latest_close: f64,
    pub sma_short: f64,
    pub sma_long: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeClassifier {
    short: Sma,
    long: Sma,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(20, 60)
    }
}

impl RegimeClassifier {
    /// # Panics
    ///
    /// Panics if either period is zero.
    pub fn new(short_period: usize, long_period: usize) -> Self {
        Self {
            short: Sma::new(short_period),
            long: Sma::new(long_period),
        }
    }

    /// Label the last element of `closes` (ascending in time).
    pub fn classify(&self, closes: &[f64]) -> Result<RegimeReading, PipelineError> {
        let insufficient = || PipelineError::InsufficientHistory {
            available: closes.len(),
            required: self.short.period(),
        };

        let latest_close = *closes.last().ok_or_else(insufficient)?;
        if !latest_close.is_finite() {
            return Err(PipelineError::unavailable("latest close is not a number"));
        }
        let sma_short = self.short.last(closes).ok_or_else(insufficient)?;

        let direction = if latest_close > sma_short {
            Direction::Up
        } else {
            Direction::Down
        };

        Ok(RegimeReading {
            direction,
            latest_close,
            sma_short,
            sma_long: self.long.last(closes),
        })
    }

    /// Classify a session: prior daily closes with the trade-time price appended.
    ///
    /// Void bars are dropped before the window is formed.
    pub fn classify_session(
        &self,
        history: &[DailyBar],
        price_at_trade: f64,
    ) -> Result<RegimeReading, PipelineError> {
        let mut bars: Vec<&DailyBar> = history.iter().filter(|b| !b.is_void()).collect();
        bars.sort_by_key(|b| b.date);

        let mut closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        closes.push(price_at_trade);
        self.classify(&closes)
    }
}
