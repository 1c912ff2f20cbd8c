//! Option contract reference data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Option contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    /// Lowercase name, as used by the reference-data API and the output `side` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "c" | "call" => Some(Self::Call),
            "p" | "put" => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listed option contract, as returned by the reference-data endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Contract identifier, e.g. `O:SPXW240102P04700000`.
    pub ticker: String,
    /// Underlying root, e.g. `SPX`.
    pub underlying_ticker: String,
    pub contract_type: ContractType,
    pub strike_price: f64,
    pub expiration_date: NaiveDate,
}

impl OptionContract {
    /// True if the contract belongs to the given listing series (substring of the ticker).
    pub fn in_series(&self, series: &str) -> bool {
        series.is_empty() || self.ticker.contains(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_type_parses_both_forms() {
        assert_eq!(ContractType::parse("C"), Some(ContractType::Call));
        assert_eq!(ContractType::parse("put"), Some(ContractType::Put));
        assert_eq!(ContractType::parse("straddle"), None);
    }

    #[test]
    fn contract_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContractType::Put).unwrap();
        assert_eq!(json, "\"put\"");
    }

    #[test]
    fn series_filter_matches_ticker_substring() {
        let contract = OptionContract {
            ticker: "O:SPXW240102P04700000".into(),
            underlying_ticker: "SPX".into(),
            contract_type: ContractType::Put,
            strike_price: 4700.0,
            expiration_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        assert!(contract.in_series("SPXW"));
        assert!(!contract.in_series("SPXPM"));
        assert!(contract.in_series(""));
    }
}
