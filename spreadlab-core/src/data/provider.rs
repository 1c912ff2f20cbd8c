//! Market-data client trait and structured error types.
//!
//! The four read operations return rows ordered ascending by time, or an
//! empty vector when the source has nothing for the request. Empty is not an
//! error at this layer; the pipeline decides what an empty read means.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{ContractType, DailyBar, MinuteBar, OptionContract, Quote};

/// Structured error types for market-data operations.
///
/// These are designed to be displayable in CLI logs next to the date they
/// caused to be skipped.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("API key not set: export {var}")]
    MissingApiKey { var: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Read access to daily bars, minute bars, option reference data and NBBO quotes.
pub trait MarketDataClient: Send + Sync {
    /// Human-readable name of this client.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` with session dates in `[from, to]`.
    fn daily_bars(&self, symbol: &str, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<DailyBar>, DataError>;

    /// Minute bars for `symbol` over the session `date`.
    fn minute_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DataError>;

    /// Listed contracts on `underlying_root` of one type, as of a date, for one expiration.
    fn option_contracts(
        &self,
        underlying_root: &str,
        contract_type: ContractType,
        as_of: NaiveDate,
        expiration: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError>;

    /// NBBO quotes for one contract with timestamps in `[from, to_exclusive)`.
    fn quotes(
        &self,
        contract_ticker: &str,
        from: DateTime<Utc>,
        to_exclusive: DateTime<Utc>,
    ) -> Result<Vec<Quote>, DataError>;

    /// Whether the client is currently accepting requests.
    fn is_available(&self) -> bool {
        true
    }
}
