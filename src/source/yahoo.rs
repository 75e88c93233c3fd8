//! Yahoo v8 chart API payloads and the cleaning rules applied to them.

use crate::error::FetchError;
use crate::models::PriceQuote;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

// ── Payload ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub regular_market_price: Option<f64>,
    /// Exchange offset from UTC in seconds; bar timestamps are shifted by it
    /// to find their trading day.
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteSeries {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Turn a chart response into its single result, classifying failures.
///
/// Yahoo answers an unknown symbol with `404` and `{"chart":{"error":
/// {"code":"Not Found",...}}}`; that becomes `FetchError::NotFound`. A window
/// before the symbol's first bar comes back as `400` with
/// `{"code":"Bad Request","description":"Data doesn't exist for ..."}`; that
/// becomes `FetchError::NoHistory`.
pub fn decode_chart(symbol: &str, status: StatusCode, body: &str) -> Result<ChartResult, FetchError> {
    let envelope: Result<ChartEnvelope, _> = serde_json::from_str(body);

    let envelope = match envelope {
        Ok(env) => env,
        Err(_) if status == StatusCode::NOT_FOUND => {
            return Err(not_found(symbol, "HTTP 404"));
        }
        Err(_) if !status.is_success() => {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: format!("chart/{}", symbol),
            });
        }
        Err(e) => return Err(FetchError::Decode(e)),
    };

    if let Some(err) = envelope.chart.error {
        let reason = err.description.unwrap_or_else(|| err.code.clone());
        if err.code.eq_ignore_ascii_case("Not Found") || status == StatusCode::NOT_FOUND {
            return Err(not_found(symbol, reason));
        }
        if err.code.eq_ignore_ascii_case("Bad Request") && reason.starts_with("Data doesn't exist") {
            return Err(FetchError::NoHistory {
                symbol: symbol.to_string(),
                reason,
            });
        }
        return Err(FetchError::Malformed(format!("{}: {}", err.code, reason)));
    }

    if status == StatusCode::NOT_FOUND {
        return Err(not_found(symbol, "HTTP 404"));
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| not_found(symbol, "empty chart result"))
}

fn not_found(symbol: &str, reason: impl Into<String>) -> FetchError {
    FetchError::NotFound {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

// ── Cleaning ──────────────────────────────────────────────────────────────────

/// Trading day of a bar timestamp, in the exchange's own time zone.
fn bar_day(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// First usable close whose trading day lies in `[start, end)`.
///
/// Null closes are skipped. A non-positive close is treated as no data.
pub fn close_between(result: &ChartResult, start: NaiveDate, end: NaiveDate) -> PriceQuote {
    let Some(series) = result.indicators.quote.first() else {
        return PriceQuote::NoData;
    };

    for (ts, close) in result.timestamp.iter().zip(series.close.iter()) {
        let Some(day) = bar_day(*ts, result.meta.gmtoffset) else {
            continue;
        };
        if day < start || day >= end {
            continue;
        }
        match close {
            Some(c) if *c > 0.0 && c.is_finite() => return PriceQuote::Close(*c),
            Some(c) => {
                warn!(
                    "Invalid close {} for {} on {}",
                    c,
                    result.meta.symbol.as_deref().unwrap_or("?"),
                    day
                );
            }
            None => {}
        }
    }

    PriceQuote::NoData
}

pub fn current_price(symbol: &str, result: &ChartResult) -> Result<f64, FetchError> {
    match result.meta.regular_market_price {
        Some(p) if p.is_finite() => Ok(p),
        _ => Err(not_found(symbol, "no regularMarketPrice in quote")),
    }
}

/// UTC-midnight epoch seconds of `date`.
pub fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Link to the provider's history page for `date` ± 3 days.
pub fn history_link(history_url: &str, symbol: &str, date: NaiveDate) -> String {
    let ts = day_start_ts(date);
    format!(
        "{}/quote/{}/history?period1={}&period2={}",
        history_url.trim_end_matches('/'),
        symbol,
        ts - 3 * SECS_PER_DAY,
        ts + 3 * SECS_PER_DAY
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
