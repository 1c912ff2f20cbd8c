//! A priced short vertical spread.

use serde::{Deserialize, Serialize};

use super::{AggregatedQuote, OptionContract};

/// Short and long legs of a vertical spread with their aggregated quotes.
///
/// `cost` is the net premium: short mid minus long mid. Positive means the
/// spread was opened for a net credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub short_contract: OptionContract,
    pub long_contract: OptionContract,
    pub short_quote: AggregatedQuote,
    pub long_quote: AggregatedQuote,
    pub cost: f64,
}

impl Spread {
    pub fn is_net_credit(&self) -> bool {
        self.cost > 0.0
    }

    /// Distance between the two strikes in price units.
    pub fn width(&self) -> f64 {
        (self.short_contract.strike_price - self.long_contract.strike_price).abs()
    }
}
