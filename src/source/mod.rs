pub mod http_client;
pub mod yahoo;

use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::models::PriceQuote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::debug;
use url::Url;

use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable market-data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Close price for a trading day in the half-open window `[start, end)`.
    /// An empty window is `PriceQuote::NoData`, not an error. Only positive
    /// closes count; callers treat anything else as no data.
    async fn fetch_close(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceQuote, FetchError>;

    /// Live price. Fails with `FetchError::NotFound` for unknown symbols.
    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, FetchError>;

    /// Where a human can look at the provider's history around `date`.
    fn history_link(&self, _symbol: &str, _date: NaiveDate) -> Option<String> {
        None
    }
}

// ── Yahoo chart API ───────────────────────────────────────────────────────────

pub struct YahooChartSource {
    client: HttpClient,
    base_url: Url,
    history_url: String,
}

impl YahooChartSource {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid provider base_url {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Provider base_url {:?} cannot carry a path", config.base_url);
        }

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
            history_url: config.history_url.clone(),
        })
    }

    /// `{base}/v8/finance/chart/{symbol}?{params}`
    fn chart_url(&self, symbol: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Malformed(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    async fn fetch_close(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceQuote, FetchError> {
        // Widen by a day each side: bar timestamps are exchange-local and the
        // window is filtered by trading day after decoding.
        let from = start.checked_sub_days(Days::new(1)).unwrap_or(start);
        let to = end.checked_add_days(Days::new(1)).unwrap_or(end);

        let url = self.chart_url(
            symbol,
            &[
                ("period1", yahoo::day_start_ts(from).to_string()),
                ("period2", yahoo::day_start_ts(to).to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ],
        )?;

        let resp = self.client.get_text(&url).await?;
        let result = match yahoo::decode_chart(symbol, resp.status, &resp.body) {
            Ok(result) => result,
            Err(e) if e.is_no_history() => {
                debug!("{} [{}, {}): {}", symbol, start, end, e);
                return Ok(PriceQuote::NoData);
            }
            Err(e) => return Err(e),
        };
        let quote = yahoo::close_between(&result, start, end);
        debug!("{} [{}, {}): {:?}", symbol, start, end, quote);
        Ok(quote)
    }

    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = self.chart_url(
            symbol,
            &[
                ("range", "1d".to_string()),
                ("interval", "1d".to_string()),
            ],
        )?;

        let resp = self.client.get_text(&url).await?;
        let result = yahoo::decode_chart(symbol, resp.status, &resp.body)?;
        yahoo::current_price(symbol, &result)
    }

    fn history_link(&self, symbol: &str, date: NaiveDate) -> Option<String> {
        Some(yahoo::history_link(&self.history_url, symbol, date))
    }
}
