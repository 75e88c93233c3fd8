//! Trading-day calendar for one reference exchange.
//!
//! Saturdays and Sundays are never trading days. On top of that the calendar
//! carries the exchange's full-day holidays, generated from the US market
//! holiday rules for a span of years and merged with any operator-supplied
//! extra closures. The calendar is built once per run and read-only after.

pub mod holidays;

use crate::error::InputError;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ── Exchange ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Nasdaq,
    Nyse,
}

impl FromStr for Exchange {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NASDAQ" | "XNAS" => Ok(Exchange::Nasdaq),
            "NYSE" | "XNYS" => Ok(Exchange::Nyse),
            other => Err(InputError::UnknownExchange(other.to_string())),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nasdaq => f.write_str("NASDAQ"),
            Exchange::Nyse => f.write_str("NYSE"),
        }
    }
}

// ── TradingCalendar ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    name: String,
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(name: impl Into<String>, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            name: name.into(),
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Weekend rule only.
    #[cfg(test)]
    pub fn weekends_only() -> Self {
        Self::new("weekends", [])
    }

    /// Holidays for `exchange` covering `first_year..=last_year`, plus `extra`.
    pub fn for_exchange(
        exchange: Exchange,
        first_year: i32,
        last_year: i32,
        extra: &[NaiveDate],
    ) -> Self {
        // Both US venues close on the same days.
        let mut holidays = match exchange {
            Exchange::Nasdaq | Exchange::Nyse => {
                holidays::us_equity_holidays_between(first_year, last_year)
            }
        };
        holidays.extend(extra.iter().copied());
        Self::new(exchange.to_string(), holidays)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Walk backward from `date` (inclusive) to the nearest trading day.
    pub fn roll_back(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        while !self.is_trading_day(day) {
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
        day
    }

    /// Correct every date in place order. Returns `(original, corrected)`
    /// pairs so the caller can report which ones moved.
    pub fn correct_dates(&self, dates: &[NaiveDate]) -> Vec<(NaiveDate, NaiveDate)> {
        dates.iter().map(|&d| (d, self.roll_back(d))).collect()
    }
}
