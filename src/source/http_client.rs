use crate::config::ProviderConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::{Action, RetryIf};
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

/// Body of a response that was not retried. Callers decide what a 404 or
/// other client error means for them.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ProviderConfig,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a consent cookie on first contact
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and retry. Rate limiting, 5xx
    /// and transport errors are retried with exponential backoff; any other
    /// status is handed back to the caller.
    pub async fn get_text(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        self.polite_delay().await;

        let backoff = ExponentialBackoff::from_millis(2)
            .factor(self.config.request_delay_ms.max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.config.max_retries as usize);

        retry_transient(backoff, || self.get_once(url)).await
    }

    async fn get_once(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        debug!("GET {}", url);

        let resp = self.inner.get(url.clone()).send().await.map_err(|e| {
            warn!("Request error for {}: {}", url, e);
            FetchError::Transport(e)
        })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!("HTTP {} from {}, backing off", status, url);
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let base = Duration::from_millis(self.config.request_delay_ms);
        let extra = jitter(Duration::from_millis(self.config.jitter_ms));
        let total = base + extra;
        if !total.is_zero() {
            sleep(total).await;
        }
    }
}

/// Run `action`, retrying transient failures on `strategy`'s schedule. Any
/// other error, or the last transient one, is returned as is.
async fn retry_transient<I, A>(strategy: I, action: A) -> Result<A::Item, FetchError>
where
    I: IntoIterator<Item = Duration>,
    A: Action<Error = FetchError>,
{
    RetryIf::start(strategy, action, FetchError::is_transient).await
}
