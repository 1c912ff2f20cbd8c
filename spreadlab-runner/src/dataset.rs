//! Row-per-date output dataset.
//!
//! The driver appends per-date outcomes to a `DatasetBuilder`; `finalize`
//! sorts rows by date and rejects duplicate dates. Skipped dates are kept
//! alongside the rows for the manifest but never appear as rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use spreadlab_core::components::{ExpectedMove, RegimeReading};
use spreadlab_core::domain::Spread;

use crate::driver::{DateOutcome, SessionInputs, Stage};
use crate::summary::RunSummary;

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("duplicate row for {0}")]
    DuplicateDate(NaiveDate),
}

/// One output record: everything known about a date's trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub date: NaiveDate,
    /// Underlying ticker.
    pub ticker: String,
    /// Short mid minus long mid.
    pub cost: f64,
    /// `1` up regime, `0` down regime.
    pub direction: u8,
    /// `call` or `put`.
    pub side: String,
    pub underlying_closing_price: f64,
    pub expected_move: f64,
    pub underlying_price_at_trade: f64,
    pub underlying_high: f64,
    pub underlying_low: f64,
    pub lower_price: f64,
    pub upper_price: f64,
    pub vix_value: f64,
    pub short_ticker: String,
    pub short_strike: f64,
    pub short_bid: f64,
    pub short_ask: f64,
    pub short_mid: f64,
    pub short_bid_size: f64,
    pub short_ask_size: f64,
    pub short_as_of: String,
    pub short_quote_count: usize,
    pub long_ticker: String,
    pub long_strike: f64,
    pub long_bid: f64,
    pub long_ask: f64,
    pub long_mid: f64,
    pub long_bid_size: f64,
    pub long_ask_size: f64,
    pub long_as_of: String,
    pub long_quote_count: usize,
}

impl BacktestRow {
    pub fn assemble(
        date: NaiveDate,
        ticker: &str,
        inputs: &SessionInputs,
        regime: &RegimeReading,
        band: &ExpectedMove,
        spread: &Spread,
    ) -> Self {
        let short = &spread.short_quote;
        let long = &spread.long_quote;
        Self {
            date,
            ticker: ticker.to_string(),
            cost: spread.cost,
            direction: regime.direction.label(),
            side: spread.short_contract.contract_type.as_str().to_string(),
            underlying_closing_price: inputs.closing_price,
            expected_move: band.expected_move,
            underlying_price_at_trade: inputs.price_at_trade,
            underlying_high: inputs.session_high,
            underlying_low: inputs.session_low,
            lower_price: band.lower_price,
            upper_price: band.upper_price,
            vix_value: band.vix_value,
            short_ticker: spread.short_contract.ticker.clone(),
            short_strike: spread.short_contract.strike_price,
            short_bid: short.bid_price,
            short_ask: short.ask_price,
            short_mid: short.mid_price,
            short_bid_size: short.bid_size,
            short_ask_size: short.ask_size,
            short_as_of: short.as_of.clone(),
            short_quote_count: short.quote_count,
            long_ticker: spread.long_contract.ticker.clone(),
            long_strike: spread.long_contract.strike_price,
            long_bid: long.bid_price,
            long_ask: long.ask_price,
            long_mid: long.mid_price,
            long_bid_size: long.bid_size,
            long_ask_size: long.ask_size,
            long_as_of: long.as_of.clone(),
            long_quote_count: long.quote_count,
        }
    }
}

/// A date that produced no row, with the stage that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub stage: Stage,
    /// Short error kind, e.g. `no_qualifying_strike`.
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct DatasetBuilder {
    rows: Vec<BacktestRow>,
    skipped: Vec<SkippedDate>,
}

impl DatasetBuilder {
    pub fn with_capacity(dates: usize) -> Self {
        Self {
            rows: Vec::with_capacity(dates),
            skipped: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: DateOutcome) {
        match outcome {
            DateOutcome::Emitted(row) => self.rows.push(*row),
            DateOutcome::Skipped(skip) => self.skipped.push(skip),
        }
    }

    /// Sort by date and check there is at most one row per date.
    pub fn finalize(mut self) -> Result<BacktestDataset, DatasetError> {
        self.rows.sort_by_key(|r| r.date);
        if let Some(pair) = self.rows.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DatasetError::DuplicateDate(pair[0].date));
        }
        self.skipped.sort_by_key(|s| s.date);
        Ok(BacktestDataset {
            rows: self.rows,
            skipped: self.skipped,
        })
    }
}

impl Extend<DateOutcome> for DatasetBuilder {
    fn extend<I: IntoIterator<Item = DateOutcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.push(outcome);
        }
    }
}

/// Rows ascending by unique date, plus the dates that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestDataset {
    rows: Vec<BacktestRow>,
    skipped: Vec<SkippedDate>,
}

impl BacktestDataset {
    pub fn rows(&self) -> &[BacktestRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedDate] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&BacktestRow> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_dataset(self)
    }
}
