//! Artifact export: CSV, Parquet and a JSON manifest.
//!
//! A run directory `{underlying}_{timestamp}/` under the output root holds:
//! - `rows.csv`: one row per emitted date
//! - `rows.parquet`: the same rows as a typed Polars frame
//! - `manifest.json`: schema version, run id, config, summary, skipped dates
//!
//! Manifests with a newer schema version are rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{BacktestConfig, RunId};
use crate::dataset::{BacktestDataset, BacktestRow, SkippedDate};
use crate::summary::RunSummary;

/// Current manifest schema version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub created_at: String,
    pub config: BacktestConfig,
    pub summary: RunSummary,
    pub skipped: Vec<SkippedDate>,
}

impl Manifest {
    pub fn new(dataset: &BacktestDataset, config: &BacktestConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config: config.clone(),
            summary: dataset.summary(),
            skipped: dataset.skipped().to_vec(),
        }
    }
}

// ─── JSON manifest ──────────────────────────────────────────────────

pub fn export_manifest_json(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize manifest to JSON")
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(json).context("failed to deserialize manifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Rows as CSV, header from the `BacktestRow` field names.
pub fn export_rows_csv(rows: &[BacktestRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("failed to write CSV row for {}", row.date))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn import_rows_csv(csv_text: &str) -> Result<Vec<BacktestRow>> {
    let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
    rdr.deserialize()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("failed to parse CSV row {}", i + 1)))
        .collect()
}

// ─── Parquet ────────────────────────────────────────────────────────

/// Rows as a DataFrame; `date` is a Date column, counts are u64.
pub fn rows_to_dataframe(rows: &[BacktestRow]) -> PolarsResult<DataFrame> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let f = |get: fn(&BacktestRow) -> f64| -> Vec<f64> { rows.iter().map(get).collect() };
    let s = |get: fn(&BacktestRow) -> &str| -> Vec<String> {
        rows.iter().map(|r| get(r).to_string()).collect()
    };
    let n = |get: fn(&BacktestRow) -> usize| -> Vec<u64> {
        rows.iter().map(|r| get(r) as u64).collect()
    };

    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let directions: Vec<i32> = rows.iter().map(|r| i32::from(r.direction)).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new("ticker".into(), s(|r| r.ticker.as_str())),
        Column::new("cost".into(), f(|r| r.cost)),
        Column::new("direction".into(), directions),
        Column::new("side".into(), s(|r| r.side.as_str())),
        Column::new("underlying_closing_price".into(), f(|r| r.underlying_closing_price)),
        Column::new("expected_move".into(), f(|r| r.expected_move)),
        Column::new("underlying_price_at_trade".into(), f(|r| r.underlying_price_at_trade)),
        Column::new("underlying_high".into(), f(|r| r.underlying_high)),
        Column::new("underlying_low".into(), f(|r| r.underlying_low)),
        Column::new("lower_price".into(), f(|r| r.lower_price)),
        Column::new("upper_price".into(), f(|r| r.upper_price)),
        Column::new("vix_value".into(), f(|r| r.vix_value)),
        Column::new("short_ticker".into(), s(|r| r.short_ticker.as_str())),
        Column::new("short_strike".into(), f(|r| r.short_strike)),
        Column::new("short_bid".into(), f(|r| r.short_bid)),
        Column::new("short_ask".into(), f(|r| r.short_ask)),
        Column::new("short_mid".into(), f(|r| r.short_mid)),
        Column::new("short_bid_size".into(), f(|r| r.short_bid_size)),
        Column::new("short_ask_size".into(), f(|r| r.short_ask_size)),
        Column::new("short_as_of".into(), s(|r| r.short_as_of.as_str())),
        Column::new("short_quote_count".into(), n(|r| r.short_quote_count)),
        Column::new("long_ticker".into(), s(|r| r.long_ticker.as_str())),
        Column::new("long_strike".into(), f(|r| r.long_strike)),
        Column::new("long_bid".into(), f(|r| r.long_bid)),
        Column::new("long_ask".into(), f(|r| r.long_ask)),
        Column::new("long_mid".into(), f(|r| r.long_mid)),
        Column::new("long_bid_size".into(), f(|r| r.long_bid_size)),
        Column::new("long_ask_size".into(), f(|r| r.long_ask_size)),
        Column::new("long_as_of".into(), s(|r| r.long_as_of.as_str())),
        Column::new("long_quote_count".into(), n(|r| r.long_quote_count)),
    ])
}

pub fn write_rows_parquet(rows: &[BacktestRow], path: &Path) -> Result<()> {
    let mut df = rows_to_dataframe(rows).context("failed to build rows DataFrame")?;
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn run_dir_name(underlying: &str) -> String {
    let safe: String = underlying
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{safe}_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Write the full artifact set for a run and return its directory.
pub fn save_artifacts(
    dataset: &BacktestDataset,
    config: &BacktestConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let run_dir = output_dir.join(run_dir_name(&config.backtest.underlying));
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let manifest = Manifest::new(dataset, config);
    fs::write(run_dir.join("manifest.json"), export_manifest_json(&manifest)?)?;
    fs::write(run_dir.join("rows.csv"), export_rows_csv(dataset.rows())?)?;
    write_rows_parquet(dataset.rows(), &run_dir.join("rows.parquet"))?;

    Ok(run_dir)
}

/// Load the manifest from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join("manifest.json");
    let json =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest_json(&json)
}
