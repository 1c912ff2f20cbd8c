//! Polygon.io market-data client.
//!
//! Daily and minute bars come from the v2 aggregates endpoint, contract
//! reference data from v3 `reference/options/contracts` (following
//! `next_url` pagination), and NBBO quotes from v3 `quotes`. Requests retry
//! with exponential backoff on rate limits, server errors and connection
//! failures, and all of them go through a shared circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataClient};
use crate::domain::{ContractType, DailyBar, MinuteBar, OptionContract, Quote};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Aggregates response (`/v2/aggs/ticker/...`).
#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Option<Vec<AggBar>>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    /// Bar start, epoch milliseconds.
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: Option<f64>,
}

/// Contract reference response (`/v3/reference/options/contracts`).
#[derive(Debug, Deserialize)]
struct ContractsResponse {
    #[serde(default)]
    results: Option<Vec<ContractRecord>>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractRecord {
    ticker: String,
    underlying_ticker: String,
    contract_type: String,
    strike_price: f64,
    expiration_date: NaiveDate,
}

/// Quotes response (`/v3/quotes/{ticker}`).
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    results: Option<Vec<QuoteRecord>>,
}

#[derive(Debug, Deserialize)]
struct QuoteRecord {
    /// SIP timestamp, epoch nanoseconds.
    sip_timestamp: i64,
    #[serde(default)]
    bid_price: Option<f64>,
    #[serde(default)]
    ask_price: Option<f64>,
    #[serde(default)]
    bid_size: Option<f64>,
    #[serde(default)]
    ask_size: Option<f64>,
}

/// Transport settings for the Polygon client.
#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Page size for contract reference requests.
    pub contracts_page_limit: u32,
    /// Maximum pages followed through `next_url` for one contract request.
    pub max_contract_pages: usize,
    /// Page size for quote requests. Only the first page is read.
    pub quotes_page_limit: u32,
    /// Timezone that decides the session date of a daily aggregate.
    pub exchange_tz: Tz,
}

impl Default for PolygonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.polygon.io".into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            contracts_page_limit: 1000,
            max_contract_pages: 10,
            quotes_page_limit: 5000,
            exchange_tz: chrono_tz::America::New_York,
        }
    }
}

pub struct PolygonClient {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    api_key: String,
    config: PolygonConfig,
}

impl PolygonClient {
    pub fn new(
        api_key: impl Into<String>,
        config: PolygonConfig,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            api_key: api_key.into(),
            config,
        })
    }

    /// Build a client whose API key is read from the environment variable `var`.
    pub fn from_env(
        var: &str,
        config: PolygonConfig,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DataError::MissingApiKey { var: var.to_string() })?;
        Self::new(key, config, circuit_breaker)
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, DataError> {
        let mut url = Url::parse(&format!("{}{path}", self.config.base_url.trim_end_matches('/')))
            .map_err(|e| DataError::Other(format!("invalid URL for {path}: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("apiKey", &self.api_key);
        Ok(url)
    }

    fn aggs_url(
        &self,
        symbol: &str,
        timespan: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Url, DataError> {
        self.url(
            &format!("/v2/aggs/ticker/{symbol}/range/1/{timespan}/{from}/{to}"),
            &[
                ("adjusted", "true".into()),
                ("sort", "asc".into()),
                ("limit", "50000".into()),
            ],
        )
    }

    /// `next_url` comes back without credentials.
    fn with_key(&self, next_url: &str) -> Result<Url, DataError> {
        let mut url = Url::parse(next_url)
            .map_err(|e| DataError::ResponseFormatChanged(format!("bad next_url: {e}")))?;
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        Ok(url)
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self.config.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        match retry_after {
            Some(hint) => exp.max(hint.min(Duration::from_secs(60))),
            None => exp,
        }
    }

    /// Execute one GET with retry and circuit breaker logic, decoding JSON into `T`.
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, DataError> {
        let what = url.path().to_string();
        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.backoff(attempt, retry_after.take()));
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            debug!(path = %what, attempt, "GET");
            match self.client.get(url.clone()).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(format!(
                            "{what}: API key rejected"
                        )));
                    }

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // Not entitled: every later request would fail the same way
                        self.circuit_breaker.trip();
                        return Err(DataError::AuthenticationRequired(format!(
                            "{what}: plan not entitled to this data"
                        )));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound { symbol: what });
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let secs = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(path = %what, retry_after_secs = secs, "rate limited");
                        retry_after = Some(Duration::from_secs(secs));
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: secs,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {what}")));
                        continue;
                    }

                    let body: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("failed to parse {what}: {e}"))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.without_url().to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.without_url().to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>, DataError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ms}")))
}

fn parse_daily(resp: AggsResponse, tz: Tz) -> Result<Vec<DailyBar>, DataError> {
    resp.results
        .unwrap_or_default()
        .into_iter()
        .map(|a| {
            let date = timestamp_from_millis(a.t)?.with_timezone(&tz).date_naive();
            Ok(DailyBar {
                date,
                open: a.o,
                high: a.h,
                low: a.l,
                close: a.c,
                volume: a.v.unwrap_or(0.0),
            })
        })
        .collect()
}

fn parse_minutes(resp: AggsResponse) -> Result<Vec<MinuteBar>, DataError> {
    resp.results
        .unwrap_or_default()
        .into_iter()
        .map(|a| {
            Ok(MinuteBar {
                timestamp: timestamp_from_millis(a.t)?,
                open: a.o,
                high: a.h,
                low: a.l,
                close: a.c,
                volume: a.v.unwrap_or(0.0),
            })
        })
        .collect()
}

fn parse_contracts(records: Vec<ContractRecord>) -> Result<Vec<OptionContract>, DataError> {
    records
        .into_iter()
        .map(|r| {
            let contract_type = ContractType::parse(&r.contract_type).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!(
                    "unknown contract_type '{}' for {}",
                    r.contract_type, r.ticker
                ))
            })?;
            Ok(OptionContract {
                ticker: r.ticker,
                underlying_ticker: r.underlying_ticker,
                contract_type,
                strike_price: r.strike_price,
                expiration_date: r.expiration_date,
            })
        })
        .collect()
}

fn parse_quotes(resp: QuotesResponse) -> Vec<Quote> {
    let mut quotes: Vec<Quote> = resp
        .results
        .unwrap_or_default()
        .into_iter()
        .map(|r| Quote {
            timestamp: DateTime::from_timestamp_nanos(r.sip_timestamp),
            bid_price: r.bid_price.unwrap_or(f64::NAN),
            ask_price: r.ask_price.unwrap_or(f64::NAN),
            bid_size: r.bid_size.unwrap_or(f64::NAN),
            ask_size: r.ask_size.unwrap_or(f64::NAN),
        })
        .collect();
    quotes.sort_by_key(|q| q.timestamp);
    quotes
}

impl MarketDataClient for PolygonClient {
    fn name(&self) -> &str {
        "polygon"
    }

    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, DataError> {
        let url = self.aggs_url(symbol, "day", from, to)?;
        let mut bars = parse_daily(self.get_json(&url)?, self.config.exchange_tz)?;
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn minute_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DataError> {
        let url = self.aggs_url(symbol, "minute", date, date)?;
        let mut bars = parse_minutes(self.get_json(&url)?)?;
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn option_contracts(
        &self,
        underlying_root: &str,
        contract_type: ContractType,
        as_of: NaiveDate,
        expiration: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError> {
        let mut url = self.url(
            "/v3/reference/options/contracts",
            &[
                ("underlying_ticker", underlying_root.to_string()),
                ("contract_type", contract_type.as_str().to_string()),
                ("as_of", as_of.to_string()),
                ("expiration_date", expiration.to_string()),
                ("limit", self.config.contracts_page_limit.to_string()),
            ],
        )?;

        let mut contracts = Vec::new();
        for page in 0..self.config.max_contract_pages.max(1) {
            let resp: ContractsResponse = self.get_json(&url)?;
            contracts.extend(parse_contracts(resp.results.unwrap_or_default())?);
            match resp.next_url {
                Some(next) if page + 1 < self.config.max_contract_pages => {
                    url = self.with_key(&next)?;
                }
                Some(_) => {
                    warn!(
                        underlying = underlying_root,
                        pages = self.config.max_contract_pages,
                        "contract listing truncated at page cap"
                    );
                    break;
                }
                None => break,
            }
        }
        Ok(contracts)
    }

    fn quotes(
        &self,
        contract_ticker: &str,
        from: DateTime<Utc>,
        to_exclusive: DateTime<Utc>,
    ) -> Result<Vec<Quote>, DataError> {
        let nanos = |ts: DateTime<Utc>| {
            ts.timestamp_nanos_opt()
                .ok_or_else(|| DataError::Other(format!("timestamp out of range: {ts}")))
        };
        let url = self.url(
            &format!("/v3/quotes/{contract_ticker}"),
            &[
                ("timestamp.gte", nanos(from)?.to_string()),
                ("timestamp.lt", nanos(to_exclusive)?.to_string()),
                ("order", "asc".into()),
                ("sort", "timestamp".into()),
                ("limit", self.config.quotes_page_limit.to_string()),
            ],
        )?;
        Ok(parse_quotes(self.get_json(&url)?))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
