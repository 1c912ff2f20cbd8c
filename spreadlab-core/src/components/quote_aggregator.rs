//! Median quote at the trade minute.
//!
//! Quotes are bucketed to their exchange-local minute; every quote whose
//! minute is at or before the trade minute qualifies. Each numeric field of
//! the aggregate is the median of that field over the qualifying quotes,
//! ignoring NaN. An even count averages the two middle values.

use chrono::NaiveDate;

use crate::clock::ExchangeClock;
use crate::domain::{AggregatedQuote, Quote};
use crate::error::PipelineError;

/// Median of the finite values; NaN when there are none.
pub fn median(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut v: Vec<f64> = values.into_iter().filter(|x| !x.is_nan()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuoteAggregator {
    clock: ExchangeClock,
}

impl QuoteAggregator {
    pub fn new(clock: ExchangeClock) -> Self {
        Self { clock }
    }

    /// Aggregate `quotes` for `ticker` on session `date`.
    pub fn aggregate(
        &self,
        ticker: &str,
        quotes: &[Quote],
        date: NaiveDate,
    ) -> Result<AggregatedQuote, PipelineError> {
        let cutoff = self.clock.trade_minute(date);
        let window: Vec<&Quote> = quotes
            .iter()
            .filter(|q| self.clock.minute_bucket(q.timestamp) <= cutoff)
            .collect();

        if window.is_empty() {
            return Err(PipelineError::NoQuoteInWindow {
                ticker: ticker.to_string(),
                cutoff: self.clock.trade_minute_label(date),
            });
        }

        Ok(AggregatedQuote {
            ticker: ticker.to_string(),
            bid_price: median(window.iter().map(|q| q.bid_price)),
            ask_price: median(window.iter().map(|q| q.ask_price)),
            mid_price: median(window.iter().map(|q| q.mid_price())),
            bid_size: median(window.iter().map(|q| q.bid_size)),
            ask_size: median(window.iter().map(|q| q.ask_size)),
            as_of: self.clock.trade_minute_label(date),
            quote_count: window.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::{DateTime, NaiveTime, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn clock() -> ExchangeClock {
        ExchangeClock::new_york(NaiveTime::from_hms_opt(9, 35, 0).unwrap()).unwrap()
    }

    /// Quote at New York wall-clock `h:m:s` on `day()` (EST, UTC-5).
    fn at(h: u32, m: u32, s: u32, bid: f64, ask: f64) -> Quote {
        let ts: DateTime<Utc> = day()
            .and_hms_opt(h + 5, m, s)
            .unwrap()
            .and_utc();
        Quote {
            timestamp: ts,
            bid_price: bid,
            ask_price: ask,
            bid_size: 10.0,
            ask_size: 20.0,
        }
    }

    #[test]
    fn median_odd_even_and_nan() {
        assert_eq!(median([3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median([4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median([f64::NAN, 5.0]), 5.0);
        assert!(median(std::iter::empty()).is_nan());
    }

    #[test]
    fn sub_minute_quotes_in_trade_minute_qualify() {
        let quotes = vec![
            at(9, 35, 0, 2.0, 2.2),
            at(9, 35, 59, 2.1, 2.3),
            at(9, 36, 0, 9.0, 9.5),
        ];
        let agg = QuoteAggregator::new(clock())
            .aggregate("O:SPXW240102P04480000", &quotes, day())
            .unwrap();
        assert_eq!(agg.quote_count, 2);
        assert_approx(agg.bid_price, 2.05, DEFAULT_EPSILON);
        assert_approx(agg.mid_price, 2.15, DEFAULT_EPSILON);
        assert_eq!(agg.as_of, "2024-01-02 09:35");
    }

    #[test]
    fn single_quote_is_its_own_median() {
        let agg = QuoteAggregator::new(clock())
            .aggregate("X", &[at(9, 35, 10, 1.0, 1.25)], day())
            .unwrap();
        assert_eq!(agg.mid_price, 1.12);
        assert_eq!(agg.bid_size, 10.0);
        assert_eq!(agg.ask_size, 20.0);
    }

    #[test]
    fn only_later_quotes_is_no_quote() {
        let err = QuoteAggregator::new(clock())
            .aggregate("X", &[at(9, 36, 0, 1.0, 1.1)], day())
            .unwrap_err();
        match err {
            PipelineError::NoQuoteInWindow { ticker, cutoff } => {
                assert_eq!(ticker, "X");
                assert_eq!(cutoff, "2024-01-02 09:35");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_sizes_do_not_poison_prices() {
        let mut q = at(9, 35, 0, 2.0, 2.2);
        q.bid_size = f64::NAN;
        let agg = QuoteAggregator::new(clock()).aggregate("X", &[q], day()).unwrap();
        assert!(agg.bid_size.is_nan());
        assert!(agg.has_mid());
    }
}
