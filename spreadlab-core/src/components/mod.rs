//! Per-date pipeline components.
//!
//! Each component is a pure function of its inputs:
//! - Regime classifier: trend label from closes vs. a trailing average
//! - Expected move: volatility-index read to a symmetric price band
//! - Strike selector: short/long legs outside the band
//! - Quote aggregator: one median observation per contract
//! - Spread cost: net premium of the two legs

pub mod expected_move;
pub mod quote_aggregator;
pub mod regime;
pub mod spread_cost;
pub mod strike_selector;

pub use expected_move::{ExpectedMove, ExpectedMoveCalculator, ANNUALIZATION_SESSIONS};
pub use quote_aggregator::{median, QuoteAggregator};
pub use regime::{Direction, RegimeClassifier, RegimeReading};
pub use spread_cost::{spread_cost, SpreadCostEngine};
pub use strike_selector::{closest_to_band_edge, StrikeSelection, StrikeSelector};
