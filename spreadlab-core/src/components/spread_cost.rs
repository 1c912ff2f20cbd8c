//! Net premium of a short vertical spread.

use crate::domain::{AggregatedQuote, OptionContract, Spread};
use crate::error::PipelineError;

/// Short mid minus long mid. Positive is a net credit.
pub fn spread_cost(short: &AggregatedQuote, long: &AggregatedQuote) -> Result<f64, PipelineError> {
    for (leg, quote) in [("short", short), ("long", long)] {
        if !quote.has_mid() {
            return Err(PipelineError::InvalidSpread {
                reason: format!("{leg} leg {} has no mid price", quote.ticker),
            });
        }
    }
    Ok(short.mid_price - long.mid_price)
}

/// Assembles priced spreads from selected contracts and their quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadCostEngine;

impl SpreadCostEngine {
    pub fn price(
        &self,
        short_contract: OptionContract,
        long_contract: OptionContract,
        short_quote: AggregatedQuote,
        long_quote: AggregatedQuote,
    ) -> Result<Spread, PipelineError> {
        if short_contract.contract_type != long_contract.contract_type {
            return Err(PipelineError::InvalidSpread {
                reason: format!(
                    "legs on different sides: short {} / long {}",
                    short_contract.contract_type, long_contract.contract_type
                ),
            });
        }
        let cost = spread_cost(&short_quote, &long_quote)?;
        Ok(Spread {
            short_contract,
            long_contract,
            short_quote,
            long_quote,
            cost,
        })
    }
}
