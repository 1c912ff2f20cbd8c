//! Exchange clock: trade-time and close instants for a session date.
//!
//! Timestamps are carried in UTC. All time-of-day comparisons happen in the
//! exchange's local time, so the trade minute is the same wall-clock minute
//! on both sides of a DST change.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Label format for minute buckets and `as_of` columns.
pub const MINUTE_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid time of day '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("trade time {trade} must be before market close {close}")]
    TradeAfterClose { trade: NaiveTime, close: NaiveTime },

    #[error("{0} does not exist in the exchange timezone")]
    NonexistentLocalTime(NaiveDateTime),
}

/// Parse an exchange-local `HH:MM` time of day.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, ClockError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| ClockError::InvalidTime(s.into()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeClock {
    tz: Tz,
    trade_time: NaiveTime,
    market_close: NaiveTime,
}

impl ExchangeClock {
    pub fn new(tz: Tz, trade_time: NaiveTime, market_close: NaiveTime) -> Result<Self, ClockError> {
        if trade_time >= market_close {
            return Err(ClockError::TradeAfterClose {
                trade: trade_time,
                close: market_close,
            });
        }
        Ok(Self {
            tz,
            trade_time,
            market_close,
        })
    }

    /// Build from config strings: IANA zone name, `HH:MM`, `HH:MM`.
    pub fn parse(tz: &str, trade_time: &str, market_close: &str) -> Result<Self, ClockError> {
        let tz: Tz = tz
            .parse()
            .map_err(|_| ClockError::UnknownTimezone(tz.to_string()))?;
        Self::new(tz, parse_hhmm(trade_time)?, parse_hhmm(market_close)?)
    }

    /// US equity-options session: New York, trading at `trade_time`, closing 16:00.
    pub fn new_york(trade_time: NaiveTime) -> Result<Self, ClockError> {
        let close =
            NaiveTime::from_hms_opt(16, 0, 0).ok_or_else(|| ClockError::InvalidTime("16:00".into()))?;
        Self::new(chrono_tz::America::New_York, trade_time, close)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn trade_time(&self) -> NaiveTime {
        self.trade_time
    }

    pub fn market_close(&self) -> NaiveTime {
        self.market_close
    }

    /// The UTC instant of an exchange-local wall-clock time on `date`.
    pub fn instant(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, ClockError> {
        let naive = date.and_time(time);
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(ClockError::NonexistentLocalTime(naive))
    }

    pub fn trade_instant(&self, date: NaiveDate) -> Result<DateTime<Utc>, ClockError> {
        self.instant(date, self.trade_time)
    }

    pub fn close_instant(&self, date: NaiveDate) -> Result<DateTime<Utc>, ClockError> {
        self.instant(date, self.market_close)
    }

    /// Exchange-local wall-clock time of an instant.
    pub fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.tz).naive_local()
    }

    /// Exchange-local session date of an instant.
    pub fn session_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.local(ts).date()
    }

    /// Exchange-local wall-clock time truncated to the minute.
    pub fn minute_bucket(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        let local = self.local(ts);
        local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local)
    }

    pub fn minute_label(&self, ts: DateTime<Utc>) -> String {
        self.minute_bucket(ts).format(MINUTE_LABEL_FORMAT).to_string()
    }

    /// The trade minute on `date`, as a local wall-clock value.
    pub fn trade_minute(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.trade_time)
    }

    pub fn trade_minute_label(&self, date: NaiveDate) -> String {
        self.trade_minute(date).format(MINUTE_LABEL_FORMAT).to_string()
    }

    /// Local time of day is in `[trade_time, market_close]`.
    pub fn in_trading_window(&self, ts: DateTime<Utc>) -> bool {
        let t = self.local(ts).time();
        t >= self.trade_time && t <= self.market_close
    }

    /// Local time of day is at or after `trade_time`.
    pub fn at_or_after_trade(&self, ts: DateTime<Utc>) -> bool {
        self.local(ts).time() >= self.trade_time
    }
}
