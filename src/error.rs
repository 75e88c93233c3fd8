use std::path::PathBuf;
use thiserror::Error;

/// Pre-flight failures. All of these are raised before any network traffic.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Ticker list file '{}' does not exist.", .0.display())]
    MissingTickerFile(PathBuf),

    #[error("'periods' argument is required.")]
    NoPeriods,

    #[error("period argument '{0}' is invalid. Only integer values are allowed.")]
    InvalidPeriod(String),

    #[error("period argument '{0}' reaches outside the supported date range.")]
    DateOutOfRange(String),

    #[error("unknown reference exchange '{0}' (expected NASDAQ or NYSE)")]
    UnknownExchange(String),
}

/// Failures talking to the market-data provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The symbol itself is unknown to the provider (delisted or invalid).
    #[error("{symbol}: not found ({reason})")]
    NotFound { symbol: String, reason: String },

    /// The provider has no bars at all for the requested window, typically
    /// because the symbol was not listed yet.
    #[error("{symbol}: no history ({reason})")]
    NoHistory { symbol: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Errors worth retrying at the HTTP layer: connection trouble, rate
    /// limiting and server-side failures.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    pub fn is_no_history(&self) -> bool {
        matches!(self, FetchError::NoHistory { .. })
    }
}
