//! Walk-forward driver: runs the per-date pipeline over candidate dates.
//!
//! Each date moves through a fixed sequence of stages:
//!
//! `FetchHistory → ClassifyRegime → ComputeBand → SelectContracts →
//! AggregateShortQuote → AggregateLongQuote → ComputeCost`
//!
//! and ends either `Emitted` with a row or `Skipped` with the failing stage
//! and its error. A skip never stops the run. Dates share no state, so the
//! parallel mode evaluates them on the rayon pool and produces the same
//! dataset as the sequential mode.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use spreadlab_core::clock::ExchangeClock;
use spreadlab_core::components::{
    ExpectedMoveCalculator, QuoteAggregator, RegimeClassifier, SpreadCostEngine, StrikeSelector,
};
use spreadlab_core::data::{MarketDataClient, TradingCalendar};
use spreadlab_core::domain::{DailyBar, MinuteBar};
use spreadlab_core::PipelineError;

use crate::config::{BacktestConfig, ConfigError};
use crate::dataset::{BacktestDataset, BacktestRow, DatasetBuilder, DatasetError, SkippedDate};

/// Pipeline stage a date was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchHistory,
    ClassifyRegime,
    ComputeBand,
    SelectContracts,
    AggregateShortQuote,
    AggregateLongQuote,
    ComputeCost,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchHistory => "fetch_history",
            Self::ClassifyRegime => "classify_regime",
            Self::ComputeBand => "compute_band",
            Self::SelectContracts => "select_contracts",
            Self::AggregateShortQuote => "aggregate_short_quote",
            Self::AggregateLongQuote => "aggregate_long_quote",
            Self::ComputeCost => "compute_cost",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one date.
#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    Emitted(Box<BacktestRow>),
    Skipped(SkippedDate),
}

/// Market observations for one session gathered in the `FetchHistory` stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInputs {
    pub prior_session: NaiveDate,
    /// Daily bars up to and including the prior session.
    pub history: Vec<DailyBar>,
    pub session_high: f64,
    pub session_low: f64,
    /// First underlying close at or after trade time.
    pub price_at_trade: f64,
    /// Last underlying close at or before market close.
    pub closing_price: f64,
    /// First volatility-index close at or after trade time.
    pub vix_value: f64,
}

type StageResult<T> = Result<T, (Stage, PipelineError)>;

trait AtStage<T> {
    fn at_stage(self, stage: Stage) -> StageResult<T>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at_stage(self, stage: Stage) -> StageResult<T> {
        self.map_err(|e| (stage, e.into()))
    }
}

/// Instruments and components for one run.
pub struct WalkForwardDriver<'a> {
    client: &'a dyn MarketDataClient,
    calendar: &'a dyn TradingCalendar,
    clock: ExchangeClock,
    underlying: String,
    volatility_index: String,
    options_root: String,
    history_lookback: Duration,
    regime: RegimeClassifier,
    band: ExpectedMoveCalculator,
    selector: StrikeSelector,
    aggregator: QuoteAggregator,
    pricer: SpreadCostEngine,
}

impl<'a> WalkForwardDriver<'a> {
    pub fn new(
        config: &BacktestConfig,
        client: &'a dyn MarketDataClient,
        calendar: &'a dyn TradingCalendar,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let b = &config.backtest;
        let clock = config.clock()?;
        let band = ExpectedMoveCalculator::new(b.move_adjustment)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            client,
            calendar,
            clock,
            underlying: b.underlying.clone(),
            volatility_index: b.volatility_index.clone(),
            options_root: b.options_root.clone(),
            history_lookback: Duration::days(i64::from(b.history_lookback_days)),
            regime: RegimeClassifier::default(),
            band,
            selector: StrikeSelector::new(&b.options_root, &b.series_filter, b.spread_width),
            aggregator: QuoteAggregator::new(clock),
            pricer: SpreadCostEngine,
        })
    }

    /// Run every date and assemble the dataset. Duplicate input dates are
    /// attempted once.
    pub fn run(&self, dates: &[NaiveDate], parallel: bool) -> Result<BacktestDataset, DatasetError> {
        let mut dates = dates.to_vec();
        dates.sort_unstable();
        dates.dedup();

        info!(
            client = self.client.name(),
            dates = dates.len(),
            parallel,
            "starting walk-forward run"
        );

        let mut builder = DatasetBuilder::with_capacity(dates.len());
        if parallel {
            let outcomes: Vec<DateOutcome> =
                dates.par_iter().map(|d| self.process_date(*d)).collect();
            builder.extend(outcomes);
        } else {
            builder.extend(dates.iter().map(|d| self.process_date(*d)));
        }
        builder.finalize()
    }

    /// Run the pipeline for one date. Never fails: errors become `Skipped`.
    pub fn process_date(&self, date: NaiveDate) -> DateOutcome {
        match self.attempt(date) {
            Ok(row) => {
                info!(
                    %date,
                    side = %row.side,
                    short = row.short_strike,
                    long = row.long_strike,
                    cost = row.cost,
                    "row emitted"
                );
                DateOutcome::Emitted(Box::new(row))
            }
            Err((stage, err)) => {
                warn!(%date, %stage, kind = err.kind(), error = %err, "date skipped");
                DateOutcome::Skipped(SkippedDate {
                    date,
                    stage,
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    fn attempt(&self, date: NaiveDate) -> StageResult<BacktestRow> {
        let inputs = self.session_inputs(date).at_stage(Stage::FetchHistory)?;
        debug!(%date, price = inputs.price_at_trade, vix = inputs.vix_value, "session inputs");

        let regime = self
            .regime
            .classify_session(&inputs.history, inputs.price_at_trade)
            .at_stage(Stage::ClassifyRegime)?;
        let side = regime.direction.side();
        debug!(%date, direction = ?regime.direction, sma = regime.sma_short, "regime");

        let band = self
            .band
            .compute(inputs.vix_value, inputs.price_at_trade)
            .at_stage(Stage::ComputeBand)?;
        debug!(%date, lower = band.lower_price, upper = band.upper_price, "band");

        let chain = self
            .client
            .option_contracts(&self.options_root, side, date, date)
            .at_stage(Stage::SelectContracts)?;
        let selection = self
            .selector
            .select(&chain, side, &band, date)
            .at_stage(Stage::SelectContracts)?;
        debug!(
            %date,
            short = %selection.short.ticker,
            long = %selection.long.ticker,
            candidates = selection.candidates,
            "strikes"
        );

        let short_quote = self
            .quote_for(&selection.short.ticker, date)
            .at_stage(Stage::AggregateShortQuote)?;
        let long_quote = self
            .quote_for(&selection.long.ticker, date)
            .at_stage(Stage::AggregateLongQuote)?;

        let spread = self
            .pricer
            .price(selection.short, selection.long, short_quote, long_quote)
            .at_stage(Stage::ComputeCost)?;

        Ok(BacktestRow::assemble(
            date,
            &self.underlying,
            &inputs,
            &regime,
            &band,
            &spread,
        ))
    }

    fn quote_for(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<spreadlab_core::domain::AggregatedQuote, PipelineError> {
        let from = self.clock.trade_instant(date)?;
        let to = self.clock.close_instant(date)?;
        let quotes = self.client.quotes(ticker, from, to)?;
        self.aggregator.aggregate(ticker, &quotes, date)
    }

    /// Gather the prior-session history and the session's own observations.
    pub fn session_inputs(&self, date: NaiveDate) -> Result<SessionInputs, PipelineError> {
        if !self.calendar.contains(date) {
            return Err(PipelineError::NotATradingDate(date));
        }
        let prior_session = self
            .calendar
            .prior_session(date)
            .ok_or(PipelineError::NoPriorSession(date))?;

        let history = self.client.daily_bars(
            &self.underlying,
            prior_session - self.history_lookback,
            prior_session,
        )?;
        if history.is_empty() {
            return Err(PipelineError::unavailable(format!(
                "daily history for {} through {prior_session}",
                self.underlying
            )));
        }

        let session_bar = self
            .client
            .daily_bars(&self.underlying, date, date)?
            .into_iter()
            .find(|b| b.date == date && !b.is_void())
            .ok_or_else(|| {
                PipelineError::unavailable(format!("daily bar for {} on {date}", self.underlying))
            })?;

        let minutes = self.session_minutes(&self.underlying, date, |clock, b| {
            clock.in_trading_window(b.timestamp)
        })?;
        let (price_at_trade, closing_price) = match (minutes.first(), minutes.last()) {
            (Some(first), Some(last)) => (first.close, last.close),
            _ => {
                return Err(PipelineError::unavailable(format!(
                    "{} minute bars between trade time and close on {date}",
                    self.underlying
                )))
            }
        };

        let vix_value = self
            .session_minutes(&self.volatility_index, date, |clock, b| {
                clock.at_or_after_trade(b.timestamp)
            })?
            .first()
            .map(|b| b.close)
            .ok_or_else(|| {
                PipelineError::unavailable(format!(
                    "{} minute bars at or after trade time on {date}",
                    self.volatility_index
                ))
            })?;

        Ok(SessionInputs {
            prior_session,
            history,
            session_high: session_bar.high,
            session_low: session_bar.low,
            price_at_trade,
            closing_price,
            vix_value,
        })
    }

    /// Minute bars of `symbol` on `date` that pass `keep`, ascending, with finite closes.
    fn session_minutes(
        &self,
        symbol: &str,
        date: NaiveDate,
        keep: impl Fn(&ExchangeClock, &MinuteBar) -> bool,
    ) -> Result<Vec<MinuteBar>, PipelineError> {
        let mut bars: Vec<MinuteBar> = self
            .client
            .minute_bars(symbol, date)?
            .into_iter()
            .filter(|b| {
                b.close.is_finite()
                    && self.clock.session_date(b.timestamp) == date
                    && keep(&self.clock, b)
            })
            .collect();
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(Stage::AggregateShortQuote.to_string(), "aggregate_short_quote");
        let json = serde_json::to_string(&Stage::FetchHistory).unwrap();
        assert_eq!(json, "\"fetch_history\"");
    }

    #[test]
    fn stages_are_ordered_like_the_pipeline() {
        assert!(Stage::FetchHistory < Stage::ClassifyRegime);
        assert!(Stage::AggregateLongQuote < Stage::ComputeCost);
    }

    #[test]
    fn at_stage_tags_errors() {
        let r: Result<(), PipelineError> = Err(PipelineError::unavailable("x"));
        let (stage, err) = r.at_stage(Stage::ComputeBand).unwrap_err();
        assert_eq!(stage, Stage::ComputeBand);
        assert_eq!(err.kind(), "data_unavailable");
    }
}
