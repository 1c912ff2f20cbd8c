//! SpreadLab CLI: build, check and inspect credit-spread backtest runs.
//!
//! Commands:
//! - `run`: walk every candidate session and write the dataset artifacts
//! - `check`: validate a TOML config and print its run id
//! - `sessions`: list the candidate dates a config would attempt

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use spreadlab_core::data::MarketDataClient;
use spreadlab_runner::{init_logging, save_artifacts, BacktestConfig, LogConfig, WalkForwardDriver};

#[derive(Parser)]
#[command(
    name = "spreadlab",
    about = "SpreadLab CLI: 0DTE credit-spread backtest dataset builder"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset for every candidate session and save artifacts.
    Run {
        /// Path to a TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// First date to attempt (YYYY-MM-DD). Overrides calendar.start.
        #[arg(long)]
        start: Option<String>,

        /// Last date to attempt (YYYY-MM-DD). Overrides calendar.end.
        #[arg(long)]
        end: Option<String>,

        /// Sessions file, one YYYY-MM-DD per line. Overrides calendar.sessions_file.
        #[arg(long)]
        calendar: Option<PathBuf>,

        /// Output directory for artifacts. Overrides run.output_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Evaluate dates on the rayon pool.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Print the summary without writing artifacts.
        #[arg(long, default_value_t = false)]
        no_export: bool,
    },
    /// Validate a config file and print its run id.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// List the dates a run would attempt.
    Sessions {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig::from_env()) {
        eprintln!("warning: logging not initialized: {e}");
    }

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            calendar,
            output_dir,
            parallel,
            no_export,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_range(&mut config, start.as_deref(), end.as_deref())?;
            if let Some(path) = calendar {
                config.calendar.sessions_file = Some(path);
            }
            if let Some(dir) = output_dir {
                config.run.output_dir = dir;
            }
            if parallel {
                config.run.parallel = true;
            }
            config.validate()?;
            run_cmd(&config, !no_export)
        }
        Commands::Check { config } => check_cmd(&config),
        Commands::Sessions { config, start, end } => {
            let mut config = load_config(config.as_deref())?;
            apply_range(&mut config, start.as_deref(), end.as_deref())?;
            sessions_cmd(&config)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    match path {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn apply_range(config: &mut BacktestConfig, start: Option<&str>, end: Option<&str>) -> Result<()> {
    if let Some(s) = start {
        config.calendar.start = Some(parse_date(s)?);
    }
    if let Some(e) = end {
        config.calendar.end = Some(parse_date(e)?);
    }
    if let (Some(s), Some(e)) = (config.calendar.start, config.calendar.end) {
        if e < s {
            bail!("end date {e} is before start date {s}");
        }
    }
    Ok(())
}

fn run_cmd(config: &BacktestConfig, export: bool) -> Result<()> {
    let calendar = config.build_calendar().context("failed to build session calendar")?;
    let dates = config.candidate_dates(&calendar);
    if dates.is_empty() {
        bail!("no candidate dates in the configured range");
    }

    let client = config.polygon_client().context("failed to create market-data client")?;
    if !client.is_available() {
        bail!("market-data client {} is unavailable", client.name());
    }

    let driver = WalkForwardDriver::new(config, &client, &calendar)?;
    let dataset = driver.run(&dates, config.run.parallel)?;
    let summary = dataset.summary();
    info!(
        run_id = %config.run_id(),
        emitted = summary.emitted,
        skipped = summary.skipped,
        "run complete"
    );

    println!("Run {}", config.run_id());
    println!("{summary}");

    if export {
        let run_dir = save_artifacts(&dataset, config, &config.run.output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn check_cmd(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?;
    let b = &config.backtest;
    println!("Config OK: {}", path.display());
    println!("  run id:        {}", config.run_id());
    println!("  underlying:    {} (vol index {})", b.underlying, b.volatility_index);
    println!("  options:       {} series {}", b.options_root, b.series_filter);
    println!("  trade time:    {} ({}, close {})", b.trade_time, b.timezone, b.market_close);
    println!("  adjustment:    {}", b.move_adjustment);
    println!("  spread width:  {}", b.spread_width);

    match config.build_calendar() {
        Ok(calendar) => println!(
            "  candidates:    {}",
            config.candidate_dates(&calendar).len()
        ),
        Err(e) => println!("  candidates:    n/a ({e})"),
    }
    Ok(())
}

fn sessions_cmd(config: &BacktestConfig) -> Result<()> {
    let calendar = config.build_calendar().context("failed to build session calendar")?;
    let dates = config.candidate_dates(&calendar);
    for date in &dates {
        println!("{date}");
    }
    eprintln!("{} candidate date(s)", dates.len());
    Ok(())
}
