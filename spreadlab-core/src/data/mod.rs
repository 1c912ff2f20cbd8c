//! Market-data and calendar collaborators.
//!
//! The pipeline only sees the `MarketDataClient` and `TradingCalendar`
//! traits. `PolygonClient` is the HTTP implementation; `InMemoryMarketData`
//! serves pre-loaded data for tests and replays.

pub mod calendar;
pub mod circuit_breaker;
pub mod memory;
pub mod polygon;
pub mod provider;

pub use calendar::{CalendarError, SessionCalendar, TradingCalendar};
pub use circuit_breaker::CircuitBreaker;
pub use memory::InMemoryMarketData;
pub use polygon::{PolygonClient, PolygonConfig};
pub use provider::{DataError, MarketDataClient};
