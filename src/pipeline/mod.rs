//! Pipeline orchestrator: slot dates → per-ticker prices → returns.
//!
//! ## Flow
//!
//! 1. `prepare_slots()` rolls every resolved date back to a trading day on the
//!    reference calendar. The result is the run-wide list of period slots,
//!    most recent first.
//! 2. `run()` walks the tickers strictly in order. For each slot it asks the
//!    source for the close in `[date, date + 1)`. In `retry` mode a missing
//!    close steps the date back one calendar day at a time, up to the retry
//!    limit; in `calendar` mode it is recorded as missing straight away.
//!    Then the live price is fetched and returns are filled in.
//!
//! An unknown symbol turns into a failed row and the run carries on. Any
//! other provider error aborts the run.

use crate::calendar::TradingCalendar;
use crate::config::{FetchMode, PipelineConfig};
use crate::error::FetchError;
use crate::models::{PriceQuote, Row, SlotValue};
use crate::returns::apply_returns;
use crate::source::MarketDataSource;
use chrono::NaiveDate;
use tracing::{info, warn};

// ── Progress reporting ────────────────────────────────────────────────────────

/// Hooks for user-facing progress. Every method defaults to doing nothing.
pub trait Progress {
    fn ticker_started(&mut self, _index: usize, _total: usize, _symbol: &str) {}
    fn date_corrected(&mut self, _from: NaiveDate, _to: NaiveDate) {}
    fn missing_data(&mut self, _symbol: &str, _date: NaiveDate, _link: Option<&str>) {}
    fn fell_back(&mut self, _symbol: &str, _slot: NaiveDate, _used: NaiveDate) {}
    fn ticker_failed(&mut self, _symbol: &str, _reason: &str) {}
}

/// Progress as `tracing` events.
#[derive(Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn ticker_started(&mut self, index: usize, total: usize, symbol: &str) {
        info!("Getting data for {} ({}/{})...", symbol, index + 1, total);
    }

    fn date_corrected(&mut self, from: NaiveDate, to: NaiveDate) {
        info!("{} was on a weekend or was a market holiday. Using {}.", from, to);
    }

    fn missing_data(&mut self, symbol: &str, date: NaiveDate, link: Option<&str>) {
        match link {
            Some(link) => warn!("No data found for {} on {}, see: {}", symbol, date, link),
            None => warn!("No data found for {} on {}", symbol, date),
        }
    }

    fn fell_back(&mut self, symbol: &str, slot: NaiveDate, used: NaiveDate) {
        info!("{}: using {} in place of {}", symbol, used, slot);
    }

    fn ticker_failed(&mut self, symbol: &str, reason: &str) {
        warn!("Skipping {}: {}", symbol, reason);
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub mode: FetchMode,
    pub missing_data_retries: u32,
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            mode: cfg.mode,
            missing_data_retries: cfg.missing_data_retries,
        }
    }
}

impl PipelineOptions {
    /// Queries allowed per slot.
    fn attempts(&self) -> u32 {
        match self.mode {
            FetchMode::Calendar => 1,
            FetchMode::Retry => self.missing_data_retries.saturating_add(1),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineStats {
    pub tickers_processed: usize,
    pub tickers_failed: usize,
    pub slots_missing: usize,
    pub queries: usize,
}

/// Everything `run()` produces.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub rows: Vec<Row>,
    /// Per slot, the date the last successfully processed ticker used.
    pub last_used: Vec<NaiveDate>,
    pub stats: PipelineStats,
}

pub struct Pipeline<S, P = LogProgress> {
    source: S,
    options: PipelineOptions,
    progress: P,
}

impl<S: MarketDataSource> Pipeline<S, LogProgress> {
    pub fn new(source: S, options: PipelineOptions) -> Self {
        Self::with_progress(source, options, LogProgress)
    }
}

impl<S: MarketDataSource, P: Progress> Pipeline<S, P> {
    pub fn with_progress(source: S, options: PipelineOptions, progress: P) -> Self {
        Self {
            source,
            options,
            progress,
        }
    }

    #[cfg(test)]
    pub fn progress(&self) -> &P {
        &self.progress
    }

    /// Roll resolved dates back onto trading days. Order is kept; dates that
    /// collapse onto the same trading day share one slot.
    pub fn prepare_slots(&mut self, calendar: &TradingCalendar, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        let mut slots: Vec<NaiveDate> = Vec::with_capacity(dates.len());
        for (from, to) in calendar.correct_dates(dates) {
            if from != to {
                self.progress.date_corrected(from, to);
            }
            if !slots.contains(&to) {
                slots.push(to);
            }
        }
        slots
    }

    pub async fn run(&mut self, tickers: &[String], slots: &[NaiveDate]) -> Result<FetchOutcome, FetchError> {
        let mut rows = Vec::with_capacity(tickers.len());
        let mut last_used = slots.to_vec();
        let mut stats = PipelineStats::default();

        for (idx, symbol) in tickers.iter().enumerate() {
            self.progress.ticker_started(idx, tickers.len(), symbol);

            let row = match self.price_ticker(symbol, slots, &mut stats).await {
                Ok(row) => row,
                Err(e) if e.is_not_found() => {
                    self.progress.ticker_failed(symbol, &e.to_string());
                    stats.tickers_failed += 1;
                    Row::failed(symbol, slots, e.to_string())
                }
                Err(e) => return Err(e),
            };

            if !row.is_failed() {
                for (label, slot) in last_used.iter_mut().zip(&row.slots) {
                    *label = slot.date;
                }
                stats.slots_missing += row.slots.iter().filter(|s| s.close.is_none()).count();
            }

            stats.tickers_processed += 1;
            rows.push(row);
        }

        Ok(FetchOutcome {
            rows,
            last_used,
            stats,
        })
    }

    async fn price_ticker(
        &mut self,
        symbol: &str,
        slots: &[NaiveDate],
        stats: &mut PipelineStats,
    ) -> Result<Row, FetchError> {
        let mut values = Vec::with_capacity(slots.len());
        for &slot in slots {
            values.push(self.price_slot(symbol, slot, stats).await?);
        }

        stats.queries += 1;
        let current = self.source.fetch_current_price(symbol).await?;

        let mut row = Row {
            ticker: symbol.to_string(),
            current_price: Some(current),
            slots: values,
            error: None,
        };
        apply_returns(&mut row);
        Ok(row)
    }

    /// Close for one slot, walking backward on missing data when allowed.
    /// When every attempt comes back empty the last date tried is kept.
    async fn price_slot(
        &mut self,
        symbol: &str,
        slot: NaiveDate,
        stats: &mut PipelineStats,
    ) -> Result<SlotValue, FetchError> {
        let attempts = self.options.attempts();
        let mut date = slot;

        for attempt in 1..=attempts {
            let end = date
                .succ_opt()
                .ok_or_else(|| FetchError::Malformed(format!("no day after {}", date)))?;

            stats.queries += 1;
            match self.source.fetch_close(symbol, date, end).await? {
                PriceQuote::Close(close) if close > 0.0 && close.is_finite() => {
                    if date != slot {
                        self.progress.fell_back(symbol, slot, date);
                    }
                    return Ok(SlotValue {
                        date,
                        close: Some(close),
                        return_pct: None,
                    });
                }
                PriceQuote::Close(_) | PriceQuote::NoData => {
                    let link = self.source.history_link(symbol, date);
                    self.progress.missing_data(symbol, date, link.as_deref());
                }
            }

            if attempt < attempts {
                match date.pred_opt() {
                    Some(prev) => date = prev,
                    None => break,
                }
            }
        }

        Ok(SlotValue {
            date,
            close: None,
            return_pct: None,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// In-memory provider driven by lookup tables.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        pub closes: HashMap<(String, NaiveDate), f64>,
        pub current: HashMap<String, f64>,
        pub unknown: HashSet<String>,
        pub broken: HashSet<String>,
        pub calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl ScriptedSource {
        pub(crate) fn close(mut self, symbol: &str, date: NaiveDate, price: f64) -> Self {
            self.closes.insert((symbol.to_string(), date), price);
            self
        }

        pub(crate) fn current(mut self, symbol: &str, price: f64) -> Self {
            self.current.insert(symbol.to_string(), price);
            self
        }

        pub(crate) fn unknown(mut self, symbol: &str) -> Self {
            self.unknown.insert(symbol.to_string());
            self
        }

        fn calls_for(&self, symbol: &str) -> Vec<NaiveDate> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _, _)| s == symbol)
                .map(|(_, start, _)| *start)
                .collect()
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn fetch_close(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceQuote, FetchError> {
            self.calls.lock().unwrap().push((symbol.to_string(), start, end));
            if self.broken.contains(symbol) {
                return Err(FetchError::Http { status: 503, url: "scripted".into() });
            }
            if self.unknown.contains(symbol) {
                return Err(FetchError::NotFound {
                    symbol: symbol.to_string(),
                    reason: "scripted".into(),
                });
            }
            Ok(self
                .closes
                .get(&(symbol.to_string(), start))
                .map(|&c| PriceQuote::Close(c))
                .unwrap_or(PriceQuote::NoData))
        }

        async fn fetch_current_price(&self, symbol: &str) -> Result<f64, FetchError> {
            self.current.get(symbol).copied().ok_or_else(|| FetchError::NotFound {
                symbol: symbol.to_string(),
                reason: "no live price".into(),
            })
        }

        fn history_link(&self, symbol: &str, date: NaiveDate) -> Option<String> {
            Some(format!("history://{}/{}", symbol, date))
        }
    }

    /// Progress sink that remembers what it was told.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub started: Vec<String>,
        pub corrected: Vec<(NaiveDate, NaiveDate)>,
        pub missing: Vec<(String, NaiveDate, Option<String>)>,
        pub failed: Vec<String>,
    }

    impl Progress for RecordingProgress {
        fn ticker_started(&mut self, _index: usize, _total: usize, symbol: &str) {
            self.started.push(symbol.to_string());
        }
        fn date_corrected(&mut self, from: NaiveDate, to: NaiveDate) {
            self.corrected.push((from, to));
        }
        fn missing_data(&mut self, symbol: &str, date: NaiveDate, link: Option<&str>) {
            self.missing.push((symbol.to_string(), date, link.map(str::to_string)));
        }
        fn ticker_failed(&mut self, symbol: &str, _reason: &str) {
            self.failed.push(symbol.to_string());
        }
    }

    fn retry(n: u32) -> PipelineOptions {
        PipelineOptions {
            mode: FetchMode::Retry,
            missing_data_retries: n,
        }
    }

    fn calendar_only() -> PipelineOptions {
        PipelineOptions {
            mode: FetchMode::Calendar,
            missing_data_retries: 2,
        }
    }

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_close_and_return_for_found_date() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().close("AAA", slot, 50.0).current("AAA", 55.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();
        let row = &out.rows[0];
        assert_eq!(row.current_price, Some(55.0));
        assert_eq!(row.slots[0].date, slot);
        assert_eq!(row.slots[0].close, Some(50.0));
        assert_eq!(row.slots[0].return_pct, Some(10.0));
    }

    #[tokio::test]
    async fn test_query_window_is_one_day_half_open() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().close("AAA", slot, 50.0).current("AAA", 55.0);
        let mut pipeline = Pipeline::new(source, retry(2));
        pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();

        let calls = pipeline.source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("AAA".to_string(), slot, d(2024, 5, 16))]);
    }

    #[tokio::test]
    async fn test_retry_stops_after_two_steps_back() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().current("AAA", 55.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();

        assert_eq!(
            pipeline.source.calls_for("AAA"),
            vec![d(2024, 5, 15), d(2024, 5, 14), d(2024, 5, 13)]
        );
        let row = &out.rows[0];
        assert_eq!(row.current_price, Some(55.0));
        assert_eq!(row.slots[0].close, None);
        assert_eq!(row.slots[0].return_pct, None);
        // The last date tried is what the row reports.
        assert_eq!(row.slots[0].date, d(2024, 5, 13));
        assert_eq!(out.stats.slots_missing, 1);
        assert_eq!(out.stats.queries, 4);
    }

    #[tokio::test]
    async fn test_retry_stops_on_first_success() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default()
            .close("AAA", d(2024, 5, 14), 40.0)
            .close("AAA", d(2024, 5, 13), 1.0)
            .current("AAA", 44.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();

        assert_eq!(pipeline.source.calls_for("AAA"), vec![d(2024, 5, 15), d(2024, 5, 14)]);
        let s = &out.rows[0].slots[0];
        assert_eq!(s.date, d(2024, 5, 14));
        assert_eq!(s.close, Some(40.0));
        assert_eq!(s.return_pct, Some(10.0));
    }

    #[test]
    fn test_calendar_mode_records_missing_without_retry() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().current("AAA", 55.0);
        let mut pipeline =
            Pipeline::with_progress(source, calendar_only(), RecordingProgress::default());

        let out = tokio_test::block_on(pipeline.run(&tickers(&["AAA"]), &[slot])).unwrap();

        assert_eq!(pipeline.source.calls_for("AAA"), vec![slot]);
        assert_eq!(out.rows[0].slots[0].date, slot);
        assert_eq!(out.rows[0].slots[0].close, None);
        assert_eq!(
            pipeline.progress().missing,
            vec![(
                "AAA".to_string(),
                slot,
                Some("history://AAA/2024-05-15".to_string())
            )]
        );
    }

    #[test]
    fn test_unknown_ticker_does_not_abort_the_run() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default()
            .close("AAA", slot, 50.0)
            .current("AAA", 55.0)
            .unknown("ZZZZ")
            .close("BBB", slot, 10.0)
            .current("BBB", 9.0);
        let mut pipeline =
            Pipeline::with_progress(source, retry(2), RecordingProgress::default());

        let out = tokio_test::block_on(pipeline.run(&tickers(&["AAA", "ZZZZ", "BBB"]), &[slot]))
            .unwrap();

        let names: Vec<_> = out.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(names, vec!["AAA", "ZZZZ", "BBB"]);
        assert!(out.rows[1].is_failed());
        assert_eq!(out.rows[1].current_price, None);
        assert_eq!(out.rows[2].slots[0].close, Some(10.0));
        assert_eq!(out.stats.tickers_failed, 1);
        assert_eq!(out.stats.tickers_processed, 3);
        assert_eq!(pipeline.progress().failed, vec!["ZZZZ"]);
        assert_eq!(pipeline.progress().started, vec!["AAA", "ZZZZ", "BBB"]);
    }

    #[tokio::test]
    async fn test_missing_live_price_fails_only_that_row() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().close("GONE", slot, 12.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["GONE"]), &[slot]).await.unwrap();
        let row = &out.rows[0];
        assert!(row.is_failed());
        assert_eq!(row.slots[0].close, None);
        assert_eq!(row.slots[0].return_pct, None);
    }

    #[tokio::test]
    async fn test_provider_outage_aborts() {
        let slot = d(2024, 5, 15);
        let mut source = ScriptedSource::default().current("AAA", 1.0);
        source.broken.insert("AAA".to_string());
        let mut pipeline = Pipeline::new(source, retry(2));

        let err = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_tickers_are_kept() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default().close("AAA", slot, 50.0).current("AAA", 55.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["AAA", "AAA"]), &[slot]).await.unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0], out.rows[1]);
    }

    #[tokio::test]
    async fn test_last_used_follows_last_processed_ticker() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default()
            .close("AAA", slot, 50.0)
            .current("AAA", 55.0)
            .close("BBB", d(2024, 5, 14), 20.0)
            .current("BBB", 22.0)
            .unknown("ZZZZ");
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline
            .run(&tickers(&["AAA", "BBB", "ZZZZ"]), &[slot])
            .await
            .unwrap();
        // Failed rows do not move the label.
        assert_eq!(out.last_used, vec![d(2024, 5, 14)]);
        // Every ticker starts from the slot date, not from an earlier fallback.
        assert_eq!(out.rows[0].slots[0].date, slot);
    }

    #[tokio::test]
    async fn test_zero_close_counts_as_missing() {
        let slot = d(2024, 5, 15);
        let source = ScriptedSource::default()
            .close("AAA", slot, 0.0)
            .close("AAA", d(2024, 5, 14), 40.0)
            .current("AAA", 50.0);
        let mut pipeline = Pipeline::new(source, retry(2));

        let out = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();
        let row = &out.rows[0];
        assert_eq!(row.slots[0].date, d(2024, 5, 14));
        assert_eq!(row.slots[0].close, Some(40.0));
        assert_eq!(row.slots[0].return_pct, Some(25.0));

        let source = ScriptedSource::default().close("AAA", slot, 0.0).current("AAA", 50.0);
        let mut pipeline = Pipeline::new(source, calendar_only());
        let out = pipeline.run(&tickers(&["AAA"]), &[slot]).await.unwrap();
        assert_eq!(out.rows[0].slots[0].close, None);
        assert_eq!(out.rows[0].slots[0].return_pct, None);
    }

    #[test]
    fn test_prepare_slots_corrects_and_merges() {
        let cal = TradingCalendar::weekends_only();
        let mut pipeline = Pipeline::with_progress(
            ScriptedSource::default(),
            retry(2),
            RecordingProgress::default(),
        );
        // Sun and Sat both land on Fri 2024-06-14.
        let slots = pipeline.prepare_slots(&cal, &[d(2024, 6, 16), d(2024, 6, 15), d(2024, 6, 12)]);
        assert_eq!(slots, vec![d(2024, 6, 14), d(2024, 6, 12)]);
        assert_eq!(pipeline.progress().corrected.len(), 2);
    }
}
