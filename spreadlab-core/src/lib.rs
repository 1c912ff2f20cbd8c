//! SpreadLab Core: domain types, per-date pipeline components, market data.
//!
//! This crate contains the decision-and-aggregation pipeline for one session:
//! - Domain types (bars, option contracts, quotes, spreads)
//! - Regime classification, expected-move band, strike selection
//! - Quote aggregation and spread pricing
//! - Exchange clock (session instants, minute labels)
//! - Market-data and calendar collaborators (Polygon HTTP, in-memory)

pub mod clock;
pub mod components;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod rounding;

pub use error::PipelineError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across date workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::DailyBar>();
        require_sync::<domain::DailyBar>();
        require_send::<domain::MinuteBar>();
        require_sync::<domain::MinuteBar>();
        require_send::<domain::OptionContract>();
        require_sync::<domain::OptionContract>();
        require_send::<domain::AggregatedQuote>();
        require_sync::<domain::AggregatedQuote>();
        require_send::<domain::Spread>();
        require_sync::<domain::Spread>();

        require_send::<components::RegimeClassifier>();
        require_sync::<components::RegimeClassifier>();
        require_send::<components::ExpectedMoveCalculator>();
        require_sync::<components::ExpectedMoveCalculator>();
        require_send::<components::StrikeSelector>();
        require_sync::<components::StrikeSelector>();
        require_send::<components::QuoteAggregator>();
        require_sync::<components::QuoteAggregator>();

        require_send::<clock::ExchangeClock>();
        require_sync::<clock::ExchangeClock>();
        require_send::<PipelineError>();
        require_sync::<PipelineError>();

        require_send::<data::PolygonClient>();
        require_sync::<data::PolygonClient>();
        require_send::<data::InMemoryMarketData>();
        require_sync::<data::InMemoryMarketData>();
        require_send::<data::SessionCalendar>();
        require_sync::<data::SessionCalendar>();
    }

    /// Collaborators are usable as trait objects by the driver.
    #[test]
    fn collaborators_are_object_safe() {
        fn _client(c: &dyn data::MarketDataClient) -> &str {
            c.name()
        }
        fn _calendar(c: &dyn data::TradingCalendar) -> usize {
            c.sessions().len()
        }
    }
}
