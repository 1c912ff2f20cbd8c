//! Per-date pipeline failures.
//!
//! Every stage of a date's pipeline returns `Result<_, PipelineError>`. The
//! walk-forward driver turns an error into a skipped date; nothing here is
//! fatal to a run.

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::provider::DataError;
use crate::domain::ContractType;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("insufficient history: {available} usable closes, need {required}")]
    InsufficientHistory { available: usize, required: usize },

    #[error("no qualifying {side} strike: {candidates} candidate(s) outside the band, need {required}")]
    NoQualifyingStrike {
        side: ContractType,
        candidates: usize,
        required: usize,
    },

    #[error("no quote for {ticker} at or before {cutoff}")]
    NoQuoteInWindow { ticker: String, cutoff: String },

    #[error("invalid spread: {reason}")]
    InvalidSpread { reason: String },

    #[error("data unavailable: {what}")]
    DataUnavailable { what: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} is not a trading session")]
    NotATradingDate(NaiveDate),

    #[error("no trading session before {0}")]
    NoPriorSession(NaiveDate),

    #[error("exchange clock: {0}")]
    Clock(#[from] crate::clock::ClockError),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl PipelineError {
    pub fn unavailable(what: impl Into<String>) -> Self {
        Self::DataUnavailable { what: what.into() }
    }

    /// Stable short name for grouping skips in summaries and manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::NoQualifyingStrike { .. } => "no_qualifying_strike",
            Self::NoQuoteInWindow { .. } => "no_quote_in_window",
            Self::InvalidSpread { .. } => "invalid_spread",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::NotATradingDate(_) => "not_a_trading_date",
            Self::NoPriorSession(_) => "no_prior_session",
            Self::Clock(_) => "clock",
            Self::Data(_) => "data_error",
        }
    }
}
