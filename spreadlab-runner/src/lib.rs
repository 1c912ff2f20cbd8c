//! SpreadLab Runner: walk-forward orchestration, dataset assembly, export.
//!
//! This crate builds on `spreadlab-core` to provide:
//! - TOML run configuration with deterministic run ids
//! - The walk-forward driver (sequential or rayon-parallel over dates)
//! - Row-per-date dataset with skip bookkeeping and a run summary
//! - CSV, Parquet and JSON manifest export
//! - Logging initialization

pub mod config;
pub mod dataset;
pub mod driver;
pub mod export;
pub mod logging;
pub mod summary;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use dataset::{BacktestDataset, BacktestRow, DatasetBuilder, DatasetError, SkippedDate};
pub use driver::{DateOutcome, SessionInputs, Stage, WalkForwardDriver};
pub use export::{load_manifest, save_artifacts, Manifest, SCHEMA_VERSION};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use summary::RunSummary;
