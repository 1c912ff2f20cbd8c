//! Serializable run configuration.
//!
//! One `BacktestConfig` describes one dataset: which instruments, when to
//! trade, how wide the band and the spread are, which sessions to walk, and
//! how to reach the market-data provider. The API key is never stored here;
//! it is read from the environment variable named by `provider.api_key_env`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use spreadlab_core::clock::{ClockError, ExchangeClock};
use spreadlab_core::data::{
    CalendarError, CircuitBreaker, DataError, PolygonClient, PolygonConfig, SessionCalendar,
};

/// Unique identifier for a run (content-addressable hash of its config).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid config: {0}")]
    Clock(#[from] ClockError),

    #[error("calendar: {0}")]
    Calendar(#[from] CalendarError),

    #[error("market data client: {0}")]
    Data(#[from] DataError),
}

/// Instruments and per-date pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestSection {
    /// Underlying index ticker, e.g. `I:SPX`.
    pub underlying: String,
    /// Short-dated volatility index ticker, e.g. `I:VIX1D`.
    pub volatility_index: String,
    /// Options root passed to the contract reference query, e.g. `SPX`.
    pub options_root: String,
    /// Ticker substring selecting one listing series, e.g. `SPXW`.
    pub series_filter: String,
    /// Exchange-local trade time, `HH:MM`.
    pub trade_time: String,
    /// Exchange-local market close, `HH:MM`.
    pub market_close: String,
    /// IANA timezone of the exchange.
    pub timezone: String,
    pub move_adjustment: f64,
    /// Listed-strike steps between the short and long legs.
    pub spread_width: usize,
    /// Calendar days of daily history fetched before the prior session.
    pub history_lookback_days: u32,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            underlying: "I:SPX".into(),
            volatility_index: "I:VIX1D".into(),
            options_root: "SPX".into(),
            series_filter: "SPXW".into(),
            trade_time: "09:35".into(),
            market_close: "16:00".into(),
            timezone: "America/New_York".into(),
            move_adjustment: 0.5,
            spread_width: 1,
            history_lookback_days: 120,
        }
    }
}

/// Which sessions the run walks over.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalendarSection {
    /// First candidate date (inclusive).
    pub start: Option<NaiveDate>,
    /// Last candidate date (inclusive).
    pub end: Option<NaiveDate>,
    /// One `YYYY-MM-DD` session per line. Takes precedence over the weekday generator.
    pub sessions_file: Option<PathBuf>,
    /// Dates removed from the weekday generator.
    pub holidays: Vec<NaiveDate>,
}

/// Market-data provider transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Page size for contract reference requests.
    pub page_limit: u32,
}

impl Default for ProviderSection {
    fn default() -> Self {
        let defaults = PolygonConfig::default();
        Self {
            base_url: defaults.base_url,
            api_key_env: "POLYGON_API_KEY".into(),
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
            page_limit: defaults.contracts_page_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunSection {
    /// Process dates on the rayon pool.
    pub parallel: bool,
    /// Root directory for exported artifacts.
    pub output_dir: PathBuf,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            parallel: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub calendar: CalendarSection,
    pub provider: ProviderSection,
    pub run: RunSection,
}

impl BacktestConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        for (field, value) in [
            ("backtest.underlying", &b.underlying),
            ("backtest.volatility_index", &b.volatility_index),
            ("backtest.options_root", &b.options_root),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if !b.move_adjustment.is_finite() || b.move_adjustment <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backtest.move_adjustment must be positive, got {}",
                b.move_adjustment
            )));
        }
        self.clock()?;

        if let (Some(start), Some(end)) = (self.calendar.start, self.calendar.end) {
            if end < start {
                return Err(ConfigError::Invalid(format!(
                    "calendar.end {end} is before calendar.start {start}"
                )));
            }
        }
        if self.provider.api_key_env.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.api_key_env must not be empty".into()));
        }
        Ok(())
    }

    /// Deterministic hash of the full config.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn clock(&self) -> Result<ExchangeClock, ConfigError> {
        let b = &self.backtest;
        Ok(ExchangeClock::parse(&b.timezone, &b.trade_time, &b.market_close)?)
    }

    /// Session calendar from `calendar.sessions_file`, or weekdays in
    /// `[start, end]` minus `holidays`.
    pub fn build_calendar(&self) -> Result<SessionCalendar, ConfigError> {
        let cal = &self.calendar;
        if let Some(path) = &cal.sessions_file {
            return Ok(SessionCalendar::from_file(path)?);
        }
        match (cal.start, cal.end) {
            (Some(start), Some(end)) => Ok(SessionCalendar::weekdays(start, end, &cal.holidays)?),
            _ => Err(ConfigError::Invalid(
                "calendar needs either sessions_file or both start and end".into(),
            )),
        }
    }

    /// Dates the run attempts: every session in range except the calendar's first.
    pub fn candidate_dates(&self, calendar: &SessionCalendar) -> Vec<NaiveDate> {
        calendar.candidate_dates(self.calendar.start, self.calendar.end)
    }

    pub fn polygon_config(&self) -> Result<PolygonConfig, ConfigError> {
        Ok(PolygonConfig {
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            max_retries: self.provider.max_retries,
            contracts_page_limit: self.provider.page_limit,
            exchange_tz: self.clock()?.timezone(),
            ..PolygonConfig::default()
        })
    }

    /// HTTP client with its API key read from the configured environment variable.
    pub fn polygon_client(&self) -> Result<PolygonClient, ConfigError> {
        Ok(PolygonClient::from_env(
            &self.provider.api_key_env,
            self.polygon_config()?,
            Arc::new(CircuitBreaker::default_provider()),
        )?)
    }
}
