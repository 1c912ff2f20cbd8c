//! In-memory market data: a `MarketDataClient` over pre-loaded rows.
//!
//! Used by tests and for replaying data captured from another source.
//! Queries apply the same range semantics as the HTTP client.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};

use super::provider::{DataError, MarketDataClient};
use crate::domain::{ContractType, DailyBar, MinuteBar, OptionContract, Quote};

#[derive(Debug, Clone)]
pub struct InMemoryMarketData {
    tz: Tz,
    daily: HashMap<String, Vec<DailyBar>>,
    minutes: HashMap<String, Vec<MinuteBar>>,
    contracts: Vec<OptionContract>,
    quotes: HashMap<String, Vec<Quote>>,
    offline: HashSet<String>,
}

impl Default for InMemoryMarketData {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York)
    }
}

impl InMemoryMarketData {
    /// Empty store; `tz` decides which session a minute bar belongs to.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            daily: HashMap::new(),
            minutes: HashMap::new(),
            contracts: Vec::new(),
            quotes: HashMap::new(),
            offline: HashSet::new(),
        }
    }

    pub fn add_daily_bars(&mut self, symbol: &str, bars: impl IntoIterator<Item = DailyBar>) {
        let entry = self.daily.entry(symbol.to_string()).or_default();
        entry.extend(bars);
        entry.sort_by_key(|b| b.date);
    }

    pub fn add_minute_bars(&mut self, symbol: &str, bars: impl IntoIterator<Item = MinuteBar>) {
        let entry = self.minutes.entry(symbol.to_string()).or_default();
        entry.extend(bars);
        entry.sort_by_key(|b| b.timestamp);
    }

    pub fn add_contracts(&mut self, contracts: impl IntoIterator<Item = OptionContract>) {
        self.contracts.extend(contracts);
    }

    pub fn add_quotes(&mut self, contract_ticker: &str, quotes: impl IntoIterator<Item = Quote>) {
        let entry = self.quotes.entry(contract_ticker.to_string()).or_default();
        entry.extend(quotes);
        entry.sort_by_key(|q| q.timestamp);
    }

    /// Every request naming `symbol` fails as if the network were down.
    pub fn set_offline(&mut self, symbol: &str) {
        self.offline.insert(symbol.to_string());
    }

    fn check_online(&self, symbol: &str) -> Result<(), DataError> {
        if self.offline.contains(symbol) {
            return Err(DataError::NetworkUnreachable(format!("{symbol} is offline")));
        }
        Ok(())
    }
}

impl MarketDataClient for InMemoryMarketData {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, DataError> {
        self.check_online(symbol)?;
        Ok(self
            .daily
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= from && b.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn minute_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DataError> {
        self.check_online(symbol)?;
        Ok(self
            .minutes
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp.with_timezone(&self.tz).date_naive() == date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn option_contracts(
        &self,
        underlying_root: &str,
        contract_type: ContractType,
        as_of: NaiveDate,
        expiration: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError> {
        self.check_online(underlying_root)?;
        Ok(self
            .contracts
            .iter()
            .filter(|c| {
                c.underlying_ticker == underlying_root
                    && c.contract_type == contract_type
                    && c.expiration_date == expiration
                    && c.expiration_date >= as_of
            })
            .cloned()
            .collect())
    }

    fn quotes(
        &self,
        contract_ticker: &str,
        from: DateTime<Utc>,
        to_exclusive: DateTime<Utc>,
    ) -> Result<Vec<Quote>, DataError> {
        self.check_online(contract_ticker)?;
        Ok(self
            .quotes
            .get(contract_ticker)
            .map(|qs| {
                qs.iter()
                    .filter(|q| q.timestamp >= from && q.timestamp < to_exclusive)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
