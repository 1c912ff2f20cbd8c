//! Strike selection outside the expected-move band.
//!
//! Candidates are the contracts on the requested side whose strike lies on
//! or beyond the band edge (calls at or above `upper_price`, puts at or below
//! `lower_price`), ordered closest-to-edge first. The short leg is the first
//! candidate and the long leg the candidate `spread_width` places further out.

use chrono::NaiveDate;
use std::cmp::Ordering;

use super::expected_move::ExpectedMove;
use crate::domain::{ContractType, OptionContract};
use crate::error::PipelineError;

/// Chosen legs plus the size of the candidate list they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeSelection {
    pub short: OptionContract,
    pub long: OptionContract,
    pub candidates: usize,
}

/// Distance of a strike beyond the band edge on `side`. Negative inside the band.
fn distance_beyond_edge(side: ContractType, band: &ExpectedMove, strike: f64) -> f64 {
    match side {
        ContractType::Call => strike - band.upper_price,
        ContractType::Put => band.lower_price - strike,
    }
}

/// Ordering for candidates on one side: nearest to the band edge first, ties
/// broken by ticker.
pub fn closest_to_band_edge(
    side: ContractType,
    band: &ExpectedMove,
) -> impl Fn(&OptionContract, &OptionContract) -> Ordering + '_ {
    move |a, b| {
        distance_beyond_edge(side, band, a.strike_price)
            .total_cmp(&distance_beyond_edge(side, band, b.strike_price))
            .then_with(|| a.ticker.cmp(&b.ticker))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeSelector {
    underlying_root: String,
    series: String,
    spread_width: usize,
}

impl StrikeSelector {
    /// `series` is a ticker substring (e.g. `SPXW`); empty accepts every series.
    pub fn new(underlying_root: impl Into<String>, series: impl Into<String>, spread_width: usize) -> Self {
        Self {
            underlying_root: underlying_root.into(),
            series: series.into(),
            spread_width,
        }
    }

    /// Qualifying contracts from `chain`, in selection order.
    pub fn candidates(
        &self,
        chain: &[OptionContract],
        side: ContractType,
        band: &ExpectedMove,
        expiration: NaiveDate,
    ) -> Vec<OptionContract> {
        let mut candidates: Vec<OptionContract> = chain
            .iter()
            .filter(|c| {
                c.contract_type == side
                    && c.underlying_ticker == self.underlying_root
                    && c.expiration_date == expiration
                    && c.in_series(&self.series)
                    && c.strike_price.is_finite()
                    && distance_beyond_edge(side, band, c.strike_price) >= 0.0
            })
            .cloned()
            .collect();
        candidates.sort_by(closest_to_band_edge(side, band));
        candidates
    }

    pub fn select(
        &self,
        chain: &[OptionContract],
        side: ContractType,
        band: &ExpectedMove,
        expiration: NaiveDate,
    ) -> Result<StrikeSelection, PipelineError> {
        let candidates = self.candidates(chain, side, band, expiration);
        let required = self.spread_width + 1;
        if candidates.len() < required {
            return Err(PipelineError::NoQualifyingStrike {
                side,
                candidates: candidates.len(),
                required,
            });
        }

        Ok(StrikeSelection {
            short: candidates[0].clone(),
            long: candidates[self.spread_width].clone(),
            candidates: candidates.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ExpectedMoveCalculator;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn band() -> ExpectedMove {
        ExpectedMoveCalculator::new(0.5).unwrap().compute(12.0, 4500.0).unwrap()
    }

    fn contract(side: ContractType, strike: f64) -> OptionContract {
        let letter = match side {
            ContractType::Call => 'C',
            ContractType::Put => 'P',
        };
        OptionContract {
            ticker: format!("O:SPXW240102{letter}{:08}", (strike * 1000.0) as u64),
            underlying_ticker: "SPX".into(),
            contract_type: side,
            strike_price: strike,
            expiration_date: day(),
        }
    }

    fn chain(side: ContractType, strikes: &[f64]) -> Vec<OptionContract> {
        strikes.iter().map(|&s| contract(side, s)).collect()
    }

    #[test]
    fn puts_closest_to_lower_edge_first() {
        let chain = chain(ContractType::Put, &[4470.0, 4490.0, 4480.0, 4475.0, 4500.0]);
        let sel = StrikeSelector::new("SPX", "SPXW", 1)
            .select(&chain, ContractType::Put, &band(), day())
            .unwrap();
        assert_eq!(sel.short.strike_price, 4480.0);
        assert_eq!(sel.long.strike_price, 4475.0);
        assert_eq!(sel.candidates, 3);
    }

    #[test]
    fn calls_closest_to_upper_edge_first() {
        let chain = chain(ContractType::Call, &[4530.0, 4510.0, 4520.0, 4517.0]);
        let sel = StrikeSelector::new("SPX", "SPXW", 2)
            .select(&chain, ContractType::Call, &band(), day())
            .unwrap();
        assert_eq!(sel.short.strike_price, 4517.0);
        assert_eq!(sel.long.strike_price, 4530.0);
        assert!(sel.short.strike_price < sel.long.strike_price);
    }

    #[test]
    fn zero_width_uses_one_contract_for_both_legs() {
        let chain = chain(ContractType::Put, &[4480.0]);
        let sel = StrikeSelector::new("SPX", "", 0)
            .select(&chain, ContractType::Put, &band(), day())
            .unwrap();
        assert_eq!(sel.short, sel.long);
    }

    #[test]
    fn other_series_and_expirations_are_ignored() {
        let mut chain = chain(ContractType::Put, &[4480.0, 4475.0]);
        chain[1].ticker = "O:SPX240102P04475000".into();
        let mut later = contract(ContractType::Put, 4470.0);
        later.expiration_date = day().succ_opt().unwrap();
        chain.push(later);

        let err = StrikeSelector::new("SPX", "SPXW", 1)
            .select(&chain, ContractType::Put, &band(), day())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoQualifyingStrike { candidates: 1, required: 2, .. }
        ));
    }

    #[test]
    fn strikes_inside_the_band_never_qualify() {
        let chain = chain(ContractType::Call, &[4500.0, 4510.0, 4516.0]);
        let err = StrikeSelector::new("SPX", "SPXW", 0)
            .select(&chain, ContractType::Call, &band(), day())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoQualifyingStrike { candidates: 0, .. }));
    }

    #[test]
    fn equal_strikes_tie_break_on_ticker() {
        let mut a = contract(ContractType::Put, 4480.0);
        let mut b = a.clone();
        a.ticker = "O:SPXW-B".into();
        b.ticker = "O:SPXW-A".into();
        let ordered = StrikeSelector::new("SPX", "SPXW", 0).candidates(
            &[a, b],
            ContractType::Put,
            &band(),
            day(),
        );
        assert_eq!(ordered[0].ticker, "O:SPXW-A");
    }
}
