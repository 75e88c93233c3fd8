mod calendar;
mod config;
mod error;
mod loader;
mod models;
mod periods;
mod pipeline;
mod report;
mod returns;
mod source;
mod utils;

use anyhow::Result;
use chrono::{Datelike, Local};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::calendar::{Exchange, TradingCalendar};
use crate::config::{AppConfig, ColumnLabels, FetchMode, Precision};
use crate::error::InputError;
use crate::loader::read_tickers;
use crate::periods::{parse_periods, resolve_dates};
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::report::writer::write_csv;
use crate::report::{TableOptions, assemble};
use crate::source::YahooChartSource;

#[derive(Parser)]
#[command(
    name = "stock-growth",
    about = "Price growth per ticker over look-back periods",
    version,
    allow_negative_numbers = true
)]
struct Cli {
    /// File containing the list of tickers, one per line
    ticker_list: PathBuf,

    /// Path of the CSV file to write
    output: PathBuf,

    /// Include the close price for each date in the output (0 or 1)
    #[arg(value_parser = ["0", "1"])]
    include_close_prices: String,

    /// Numbers of days or years to find growth over, e.g. 30 90 360 2y 5y
    periods: Vec<String>,

    /// What to do when a date has no close: record it, or walk back
    #[arg(long, value_enum)]
    mode: Option<FetchMode>,

    /// Extra days to step back per date in retry mode
    #[arg(long)]
    retries: Option<u32>,

    /// Reference exchange for the holiday calendar (NASDAQ, NYSE)
    #[arg(long)]
    exchange: Option<String>,

    /// Number formatting: full or fixed3
    #[arg(long, value_enum)]
    precision: Option<Precision>,

    /// Label period columns by slot date or by the last ticker's used date
    #[arg(long, value_enum)]
    column_labels: Option<ColumnLabels>,

    /// Add a column with each row's resolved date per period
    #[arg(long)]
    used_dates: bool,

    /// Add a second header row with "N days" / "X.Y years"
    #[arg(long)]
    period_row: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if let Some(n) = self.retries {
            config.pipeline.missing_data_retries = n;
        }
        if let Some(exchange) = &self.exchange {
            config.calendar.exchange = exchange.clone();
        }
        if let Some(precision) = self.precision {
            config.report.precision = precision;
        }
        if let Some(labels) = self.column_labels {
            config.report.column_labels = labels;
        }
        config.report.include_used_dates |= self.used_dates;
        config.report.include_period_row |= self.period_row;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "historical_stock_growth=info,warn",
        1 => "historical_stock_growth=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = AppConfig::load()?;
    cli.apply_overrides(&mut config);

    // ── Pre-flight: nothing below touches the network ─────────────────────────
    if !cli.ticker_list.is_file() {
        return Err(InputError::MissingTickerFile(cli.ticker_list.clone()).into());
    }
    let periods = parse_periods(cli.periods.as_slice())?;
    let exchange: Exchange = config.calendar.exchange.parse()?;

    let now = Local::now().naive_local();
    let dates = resolve_dates(now.date(), &periods)?;

    info!("Reading in data...");
    let tickers = read_tickers(&cli.ticker_list)?;

    let first_year = dates.iter().map(|d| d.year()).min().unwrap_or(now.year());
    let last_year = dates.iter().map(|d| d.year()).max().unwrap_or(now.year()).max(now.year());
    let calendar = TradingCalendar::for_exchange(
        exchange,
        first_year - 1,
        last_year + 1,
        &config.calendar.extra_holidays,
    );
    info!("{} calendar: {} holidays loaded", calendar.name(), calendar.holiday_count());

    // ── Fetch ─────────────────────────────────────────────────────────────────
    info!("Fetching and processing data...");
    let source = YahooChartSource::new(&config.provider)?;
    let mut pipeline = Pipeline::new(source, PipelineOptions::from(&config.pipeline));

    let slots = pipeline.prepare_slots(&calendar, &dates);
    let outcome = {
        let _t = utils::Timer::start(format!("Fetching {} tickers", tickers.len()));
        pipeline.run(&tickers, &slots).await?
    };

    // ── Report ────────────────────────────────────────────────────────────────
    info!("Writing data to CSV file...");
    let opts = TableOptions::from_config(cli.include_close_prices == "1", &config.report);
    let table = assemble(&outcome, &slots, &opts, now);
    write_csv(&table, &cli.output, config.report.precision)?;

    info!(
        "All done: {} tickers | {} failed | {} missing closes | {} queries",
        outcome.stats.tickers_processed,
        outcome.stats.tickers_failed,
        outcome.stats.slots_missing,
        outcome.stats.queries,
    );

    Ok(())
}
