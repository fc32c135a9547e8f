//! Async HTTP client for the dataset endpoint.

use std::time::Duration;

use chrono::NaiveDate;
use harvest_core::provider::{FetchError, SeriesTable, TimeSeriesProvider};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{Result, dataset::decode_dataset};

/// Connection settings, deserialised from the `[provider]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuandlConfig {
  pub base_url:     String,
  /// Sent as `api_key`; anonymous access is rate-limited upstream.
  pub api_key:      Option<String>,
  pub timeout_secs: u64,
}

impl Default for QuandlConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://www.quandl.com/api/v3".into(),
      api_key:      None,
      timeout_secs: 30,
    }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct QuandlClient {
  client: Client,
  config: QuandlConfig,
}

impl QuandlClient {
  pub fn new(config: QuandlConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, ticker: &str) -> String {
    format!(
      "{}/datasets/{}.json",
      self.config.base_url.trim_end_matches('/'),
      ticker
    )
  }
}

impl TimeSeriesProvider for QuandlClient {
  async fn fetch(
    &self,
    ticker: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
  ) -> Result<SeriesTable, FetchError> {
    let mut query: Vec<(&str, String)> = vec![("order", "asc".into())];
    if let Some(key) = &self.config.api_key {
      query.push(("api_key", key.clone()));
    }
    if let Some(start) = start {
      query.push(("start_date", start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = end {
      query.push(("end_date", end.format("%Y-%m-%d").to_string()));
    }

    let unavailable = |e: reqwest::Error| FetchError::UpstreamUnavailable(format!("{ticker}: {e}"));

    let resp = self
      .client
      .get(self.url(ticker))
      .query(&query)
      .send()
      .await
      .map_err(unavailable)?;

    check_status(ticker, resp.status())?;

    let body = resp.text().await.map_err(unavailable)?;
    let table = decode_dataset(&body)?;
    debug!(%ticker, rows = table.rows.len(), "dataset fetched");
    Ok(table)
  }
}

/// Any non-2xx answer, including 404 for a contract the provider never
/// listed, means the dataset is unavailable for this run.
fn check_status(ticker: &str, status: StatusCode) -> Result<(), FetchError> {
  if status.is_success() {
    Ok(())
  } else {
    Err(FetchError::UpstreamUnavailable(format!("GET {ticker} → {status}")))
  }
}
