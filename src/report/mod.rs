//! Row-per-ticker report table.
//!
//! Column layout: `ticker`, `<YYYY-MM-DD HH:MM> price`, then for each slot,
//! most recent first, an optional `<date> date`, an optional `<date> close`
//! and `<date> return`. An `error` column is appended only when some ticker
//! could not be priced.

pub mod writer;

use crate::config::{ColumnLabels, ReportConfig};
use crate::models::Row;
use crate::pipeline::FetchOutcome;
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Missing,
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Missing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub header: Vec<String>,
    /// Optional second header row with `N days` / `X.Y years` per column.
    pub period_row: Option<Vec<String>>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    #[cfg(test)]
    pub fn column(&self, label: &str) -> Option<usize> {
        self.header.iter().position(|h| h == label)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub include_close_prices: bool,
    pub column_labels: ColumnLabels,
    pub include_used_dates: bool,
    pub include_period_row: bool,
}

impl TableOptions {
    pub fn from_config(include_close_prices: bool, cfg: &ReportConfig) -> Self {
        Self {
            include_close_prices,
            column_labels: cfg.column_labels,
            include_used_dates: cfg.include_used_dates,
            include_period_row: cfg.include_period_row,
        }
    }
}

/// Human label for the distance between `today` and `date`, as shown in the
/// optional period row.
pub fn period_label(today: NaiveDate, date: NaiveDate) -> String {
    let days = (today - date).num_days();
    if days >= 365 {
        format!("{:.1} years", days as f64 / 365.25)
    } else {
        format!("{} days", days)
    }
}

/// Merge fetched rows into the final table.
pub fn assemble(
    outcome: &FetchOutcome,
    slots: &[NaiveDate],
    opts: &TableOptions,
    now: NaiveDateTime,
) -> ReportTable {
    let label_dates: &[NaiveDate] = match opts.column_labels {
        ColumnLabels::Slot => slots,
        ColumnLabels::LastUsed => &outcome.last_used,
    };
    let any_failed = outcome.rows.iter().any(Row::is_failed);

    let mut header = vec!["ticker".to_string(), format!("{} price", now.format("%Y-%m-%d %H:%M"))];
    let mut periods = vec![String::new(), String::new()];

    for date in label_dates {
        let period = period_label(now.date(), *date);
        if opts.include_used_dates {
            header.push(format!("{} date", date));
            periods.push(period.clone());
        }
        if opts.include_close_prices {
            header.push(format!("{} close", date));
            periods.push(period.clone());
        }
        header.push(format!("{} return", date));
        periods.push(period);
    }
    if any_failed {
        header.push("error".to_string());
        periods.push(String::new());
    }

    let rows = outcome
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![Cell::Text(row.ticker.clone()), row.current_price.into()];
            for slot in &row.slots {
                if opts.include_used_dates {
                    cells.push(Cell::Date(slot.date));
                }
                if opts.include_close_prices {
                    cells.push(slot.close.into());
                }
                cells.push(slot.return_pct.into());
            }
            if any_failed {
                cells.push(match &row.error {
                    Some(e) => Cell::Text(e.clone()),
                    None => Cell::Missing,
                });
            }
            cells
        })
        .collect();

    ReportTable {
        header,
        period_row: opts.include_period_row.then_some(periods),
        rows,
    }
}
