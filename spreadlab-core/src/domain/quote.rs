//! NBBO quotes and their per-window aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rounding::round_cents;

/// One NBBO quote for an option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// SIP timestamp.
    pub timestamp: DateTime<Utc>,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
}

impl Quote {
    /// Midpoint of bid and ask, rounded to cents.
    pub fn mid_price(&self) -> f64 {
        round_cents((self.bid_price + self.ask_price) / 2.0)
    }
}

/// One representative observation of a contract's quotes over a window.
///
/// Every numeric field is the median of that field across the quotes that
/// qualified; `as_of` is the trade-time minute label (`YYYY-MM-DD HH:MM`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedQuote {
    pub ticker: String,
    pub bid_price: f64,
    pub ask_price: f64,
    pub mid_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub as_of: String,
    /// Number of quotes the medians were taken over.
    pub quote_count: usize,
}

impl AggregatedQuote {
    /// The mid is usable for pricing a spread.
    pub fn has_mid(&self) -> bool {
        self.mid_price.is_finite()
    }
}
