//! Ticker list reader: one symbol per line.

use crate::error::InputError;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Symbols in file order, trimmed. Blank lines are skipped, duplicates kept.
pub fn read_tickers(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(InputError::MissingTickerFile(path.to_path_buf()).into());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ticker list {:?}", path))?;

    let tickers = parse_tickers(&text);
    info!("{} tickers read from {:?}", tickers.len(), path);
    Ok(tickers)
}

pub fn parse_tickers(text: &str) -> Vec<String> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let symbol = line.trim();
            if symbol.is_empty() {
                debug!("Skipping blank line {}", i + 1);
                None
            } else {
                Some(symbol.to_string())
            }
        })
        .collect()
}
