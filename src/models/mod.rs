use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Period ────────────────────────────────────────────────────────────────────

/// A look-back distance supplied on the command line: `30` or `2y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Days(i64),
    Years(i32),
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Days(n) => write!(f, "{}", n),
            Period::Years(n) => write!(f, "{}y", n),
        }
    }
}

// ── Price quote ───────────────────────────────────────────────────────────────

/// Result of asking the provider for one ticker's close on one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceQuote {
    Close(f64),
    NoData,
}

// ── Row ───────────────────────────────────────────────────────────────────────

/// One period slot of one ticker. `date` is the day actually queried, which
/// can sit behind the slot date when the backward walk kicked in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotValue {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub return_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub ticker: String,
    pub current_price: Option<f64>,
    pub slots: Vec<SlotValue>,
    /// Set when the ticker could not be priced at all (unknown symbol).
    pub error: Option<String>,
}

impl Row {
    /// A row for a ticker the provider does not know. Every numeric field is
    /// missing; the slot dates are kept so the row lines up with the header.
    pub fn failed(ticker: &str, slot_dates: &[NaiveDate], reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            current_price: None,
            slots: slot_dates
                .iter()
                .map(|&date| SlotValue { date, close: None, return_pct: None })
                .collect(),
            error: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
