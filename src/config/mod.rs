use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Market-data provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Site used for the human-readable history links in diagnostics.
    #[serde(default = "default_history_url")]
    pub history_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Holiday calendar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Closures the rule set does not know about, `YYYY-MM-DD`.
    #[serde(default)]
    pub extra_holidays: Vec<NaiveDate>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: FetchMode,

    /// Extra backward steps per slot in `retry` mode.
    #[serde(default = "default_missing_data_retries")]
    pub missing_data_retries: u32,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub precision: Precision,

    #[serde(default)]
    pub column_labels: ColumnLabels,

    #[serde(default)]
    pub include_used_dates: bool,

    #[serde(default)]
    pub include_period_row: bool,
}

// ── Switches ──────────────────────────────────────────────────────────────────

/// What to do when the provider has no close for a slot date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Record the slot as missing and log a history link.
    Calendar,
    /// Step the date back one day at a time, up to the retry limit.
    #[default]
    Retry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Full,
    /// Round to three decimal places.
    Fixed3,
}

/// Which date a period column is labelled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLabels {
    /// The calendar-corrected slot date, identical for every ticker.
    #[default]
    Slot,
    /// The date the last processed ticker ended up using for the slot.
    LastUsed,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_history_url() -> String {
    "https://finance.yahoo.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) stock-growth/0.1".to_string()
}
fn default_exchange() -> String {
    "NASDAQ".to_string()
}
fn default_missing_data_retries() -> u32 {
    2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            history_url: default_history_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            extra_holidays: Vec::new(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            missing_data_retries: default_missing_data_retries(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("GROWTH").separator("__"))
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }

    /// Parse a TOML document on its own, without files or environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        cfg.try_deserialize().context("Invalid configuration")
    }
}
