//! CSV serialisation of a `ReportTable`.

use super::{Cell, ReportTable};
use crate::config::Precision;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

fn format_cell(cell: &Cell, precision: Precision) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        Cell::Date(d) => d.to_string(),
        Cell::Missing => String::new(),
        Cell::Number(n) => match precision {
            Precision::Full => n.to_string(),
            Precision::Fixed3 => format!("{:.3}", n),
        },
    }
}

pub fn write_table<W: Write>(table: &ReportTable, out: W, precision: Precision) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);

    writer.write_record(&table.header)?;
    if let Some(periods) = &table.period_row {
        writer.write_record(periods)?;
    }
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| format_cell(c, precision)))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv(table: &ReportTable, path: &Path, precision: Precision) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file {:?}", path))?;
    write_table(table, file, precision)
        .with_context(|| format!("Failed to write CSV to {:?}", path))?;

    info!("Data written to '{}'.", path.display());
    Ok(())
}
