//! Walk-forward runs over an in-memory market.
//!
//! The fixture market has a gently rising index with full session data for
//! four January 2024 dates:
//! - 2024-01-03: up regime, reference band, clean put chain
//! - 2024-01-04: up regime, every listed put inside the band
//! - 2024-01-05: down regime (trade price under the average), call chain
//! - 2024-01-08: up regime, long leg has no quote by the trade minute

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;

use spreadlab_core::data::{InMemoryMarketData, SessionCalendar};
use spreadlab_core::domain::{ContractType, DailyBar, MinuteBar, OptionContract, Quote};
use spreadlab_runner::{BacktestConfig, DateOutcome, Stage, WalkForwardDriver};

// ── Fixture ──────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn d3() -> NaiveDate {
    date(2024, 1, 3)
}
fn d4() -> NaiveDate {
    date(2024, 1, 4)
}
fn d5() -> NaiveDate {
    date(2024, 1, 5)
}
fn d8() -> NaiveDate {
    date(2024, 1, 8)
}

fn ny(day: NaiveDate, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    New_York
        .from_local_datetime(&day.and_hms_opt(h, m, s).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

fn calendar() -> SessionCalendar {
    SessionCalendar::weekdays(date(2023, 9, 1), date(2024, 1, 31), &[date(2024, 1, 1)]).unwrap()
}

fn minute(ts: DateTime<Utc>, close: f64) -> MinuteBar {
    MinuteBar {
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: 0.0,
    }
}

fn contract(day: NaiveDate, side: ContractType, strike: f64, series: &str) -> OptionContract {
    let letter = match side {
        ContractType::Call => 'C',
        ContractType::Put => 'P',
    };
    OptionContract {
        ticker: format!(
            "O:{series}{}{letter}{:08}",
            day.format("%y%m%d"),
            (strike * 1000.0) as u64
        ),
        underlying_ticker: "SPX".into(),
        contract_type: side,
        strike_price: strike,
        expiration_date: day,
    }
}

fn quote(ts: DateTime<Utc>, bid: f64, ask: f64) -> Quote {
    Quote {
        timestamp: ts,
        bid_price: bid,
        ask_price: ask,
        bid_size: 10.0,
        ask_size: 15.0,
    }
}

/// Underlying minute bars for one session, trade-time price `price`.
fn seed_session(data: &mut InMemoryMarketData, day: NaiveDate, price: f64, vix: f64) {
    data.add_minute_bars(
        "I:SPX",
        [
            minute(ny(day, 9, 30, 0), price - 5.0),
            minute(ny(day, 9, 35, 0), price),
            minute(ny(day, 12, 0, 0), price + 10.0),
            minute(ny(day, 16, 0, 0), price + 12.0),
            minute(ny(day, 16, 5, 0), price + 50.0),
        ],
    );
    data.add_minute_bars(
        "I:VIX1D",
        [
            minute(ny(day, 9, 34, 0), vix - 1.0),
            minute(ny(day, 9, 35, 0), vix),
            minute(ny(day, 9, 36, 0), vix + 1.0),
        ],
    );
}

fn seed_quotes(data: &mut InMemoryMarketData, contract: &OptionContract, bid: f64, ask: f64) {
    let day = contract.expiration_date;
    data.add_quotes(
        &contract.ticker,
        [
            quote(ny(day, 9, 35, 10), bid, ask),
            quote(ny(day, 9, 40, 0), bid + 5.0, ask + 5.0),
        ],
    );
}

fn market() -> InMemoryMarketData {
    let mut data = InMemoryMarketData::new(New_York);

    // Rising daily closes 4400.0, 4400.5, ... over every session
    let sessions = calendar();
    let bars: Vec<DailyBar> = sessions
        .candidate_dates(None, Some(d8()))
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            let close = 4400.0 + 0.5 * i as f64;
            DailyBar {
                date: d,
                open: close,
                high: close + 20.0,
                low: close - 10.0,
                close,
                volume: 0.0,
            }
        })
        .collect();
    data.add_daily_bars("I:SPX", bars);

    // 2024-01-03: reference scenario
    seed_session(&mut data, d3(), 4500.0, 12.0);
    let puts: Vec<OptionContract> = [4500.0, 4490.0, 4485.0, 4480.0, 4475.0, 4470.0]
        .iter()
        .map(|&s| contract(d3(), ContractType::Put, s, "SPXW"))
        .collect();
    seed_quotes(&mut data, &puts[3], 2.05, 2.15);
    seed_quotes(&mut data, &puts[4], 1.15, 1.25);
    data.add_contracts(puts);
    // Monthly series at a closer strike must not be picked
    data.add_contracts([contract(d3(), ContractType::Put, 4482.0, "SPX")]);

    // 2024-01-04: nothing outside the band
    seed_session(&mut data, d4(), 4500.0, 12.0);
    data.add_contracts(
        [4500.0, 4495.0, 4490.0]
            .iter()
            .map(|&s| contract(d4(), ContractType::Put, s, "SPXW")),
    );

    // 2024-01-05: trade price far below the average → calls
    seed_session(&mut data, d5(), 4300.0, 12.0);
    let calls: Vec<OptionContract> = [4310.0, 4320.0, 4325.0, 4330.0]
        .iter()
        .map(|&s| contract(d5(), ContractType::Call, s, "SPXW"))
        .collect();
    seed_quotes(&mut data, &calls[1], 1.60, 1.70);
    seed_quotes(&mut data, &calls[2], 0.95, 1.05);
    data.add_contracts(calls);

    // 2024-01-08: long leg only quoted after the trade minute
    seed_session(&mut data, d8(), 4500.0, 12.0);
    let puts: Vec<OptionContract> = [4480.0, 4475.0]
        .iter()
        .map(|&s| contract(d8(), ContractType::Put, s, "SPXW"))
        .collect();
    seed_quotes(&mut data, &puts[0], 2.0, 2.2);
    data.add_quotes(&puts[1].ticker, [quote(ny(d8(), 9, 36, 0), 1.0, 1.1)]);
    data.add_contracts(puts);

    data
}

fn skipped_stage(outcome: &DateOutcome) -> Option<Stage> {
    match outcome {
        DateOutcome::Skipped(s) => Some(s.stage),
        DateOutcome::Emitted(_) => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn reference_date_emits_put_credit_spread() {
    let data = market();
    let cal = calendar();
    let config = BacktestConfig::default();
    let driver = WalkForwardDriver::new(&config, &data, &cal).unwrap();

    let dataset = driver.run(&[d3()], false).unwrap();
    assert_eq!(dataset.len(), 1);
    let row = dataset.get(d3()).unwrap();

    assert_eq!(row.ticker, "I:SPX");
    assert_eq!(row.direction, 1);
    assert_eq!(row.side, "put");
    assert_eq!(row.underlying_price_at_trade, 4500.0);
    assert_eq!(row.underlying_closing_price, 4512.0);
    assert_eq!(row.vix_value, 12.0);
    assert!((row.expected_move - 0.0038).abs() < 1e-12);
    assert_eq!(row.lower_price, 4483.0);
    assert_eq!(row.upper_price, 4517.0);
    assert_eq!(row.short_strike, 4480.0);
    assert_eq!(row.long_strike, 4475.0);
    assert!((row.short_mid - 2.1).abs() < 1e-9);
    assert!((row.long_mid - 1.2).abs() < 1e-9);
    assert!((row.cost - 0.90).abs() < 1e-9);
    assert_eq!(row.short_as_of, "2024-01-03 09:35");
    assert_eq!(row.short_quote_count, 1);
    assert!(row.short_ticker.starts_with("O:SPXW"));
}

#[test]
fn session_high_low_come_from_the_daily_bar() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let inputs = driver.session_inputs(d3()).unwrap();
    assert_eq!(inputs.prior_session, date(2024, 1, 2));
    assert_eq!(inputs.session_high - inputs.session_low, 30.0);
    assert!(inputs.history.iter().all(|b| b.date <= date(2024, 1, 2)));
}

#[test]
fn zero_strike_date_is_skipped_and_run_continues() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let dataset = driver.run(&[d3(), d4(), d5()], false).unwrap();
    assert_eq!(dataset.dates(), vec![d3(), d5()]);

    let skipped = &dataset.skipped()[0];
    assert_eq!(skipped.date, d4());
    assert_eq!(skipped.stage, Stage::SelectContracts);
    assert_eq!(skipped.kind, "no_qualifying_strike");
}

#[test]
fn down_regime_sells_calls_above_the_band() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let dataset = driver.run(&[d5()], false).unwrap();
    let row = dataset.get(d5()).unwrap();
    assert_eq!(row.direction, 0);
    assert_eq!(row.side, "call");
    // 4300 * 0.0038 = 16.34 → band [4284, 4316]
    assert_eq!(row.upper_price, 4316.0);
    assert_eq!(row.short_strike, 4320.0);
    assert_eq!(row.long_strike, 4325.0);
    assert!(row.short_strike < row.long_strike);
    assert!((row.cost - 0.65).abs() < 1e-9);
}

#[test]
fn long_leg_without_quote_skips_at_long_stage() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let outcome = driver.process_date(d8());
    assert_eq!(skipped_stage(&outcome), Some(Stage::AggregateLongQuote));
}

#[test]
fn spread_width_two_needs_three_candidates() {
    let data = market();
    let cal = calendar();
    let mut config = BacktestConfig::default();
    config.backtest.spread_width = 2;
    let driver = WalkForwardDriver::new(&config, &data, &cal).unwrap();

    // 2024-01-03 has 4480/4475/4470 outside the band; 4470 has no quotes
    let outcome = driver.process_date(d3());
    assert_eq!(skipped_stage(&outcome), Some(Stage::AggregateLongQuote));

    // 2024-01-08 has only two
    let outcome = driver.process_date(d8());
    assert_eq!(skipped_stage(&outcome), Some(Stage::SelectContracts));
}

#[test]
fn weekend_and_first_session_are_skipped_at_fetch() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let dataset = driver.run(&[date(2024, 1, 6), date(2023, 9, 1)], false).unwrap();
    assert!(dataset.is_empty());
    let kinds: Vec<&str> = dataset.skipped().iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(kinds, vec!["no_prior_session", "not_a_trading_date"]);
}

#[test]
fn offline_source_skips_everything_but_completes() {
    let mut data = market();
    data.set_offline("I:VIX1D");
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let dataset = driver.run(&[d3(), d5()], false).unwrap();
    assert!(dataset.is_empty());
    assert_eq!(dataset.skipped().len(), 2);
    assert!(dataset
        .skipped()
        .iter()
        .all(|s| s.stage == Stage::FetchHistory && s.kind == "data_error"));
    assert_eq!(dataset.summary().attempted, 2);
}

#[test]
fn duplicate_and_unsorted_inputs() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();

    let dataset = driver.run(&[d5(), d3(), d5(), d3()], false).unwrap();
    assert_eq!(dataset.dates(), vec![d3(), d5()]);
    assert!(dataset.skipped().is_empty());
}

#[test]
fn parallel_matches_sequential() {
    let data = market();
    let cal = calendar();
    let driver = WalkForwardDriver::new(&BacktestConfig::default(), &data, &cal).unwrap();
    let dates = [d8(), d3(), d5(), d4(), date(2024, 1, 6)];

    let sequential = driver.run(&dates, false).unwrap();
    let parallel = driver.run(&dates, true).unwrap();
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.len(), 2);
    assert_eq!(sequential.skipped().len(), 3);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let data = market();
    let cal = calendar();
    let mut config = BacktestConfig::default();
    config.backtest.move_adjustment = -1.0;
    assert!(WalkForwardDriver::new(&config, &data, &cal).is_err());
}
