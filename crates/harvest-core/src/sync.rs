//! Incremental Sync Engine for daily market data.
//!
//! A run covers one window of calendar days: `history_start ..= today` on
//! the first run, `last_synced + 1 ..= today` afterwards. Every contract in
//! the universe is fetched for that window; contracts whose fetch fails are
//! recorded in the report and skipped, and everything else is committed in a
//! single store transaction.
//!
//! The window must start strictly after the last stored date. This is what
//! makes plain appends safe, so the engine checks it before fetching and the
//! store checks it again inside the transaction.

use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  calendar::DateWindow,
  config::MarketConfig,
  contract::enumerate,
  market::MarketDataFetcher,
  provider::{FetchError, TimeSeriesProvider},
  reference::ReferenceData,
  report::{FetchFailure, MarketRunReport},
  store::{ContractBatch, MarketRun, MarketStore},
};

pub struct MarketSync<'a, P, S> {
  config:    &'a MarketConfig,
  reference: &'a ReferenceData,
  provider:  &'a P,
  store:     &'a S,
}

impl<'a, P, S> MarketSync<'a, P, S>
where
  P: TimeSeriesProvider,
  S: MarketStore,
{
  pub fn new(
    config: &'a MarketConfig,
    reference: &'a ReferenceData,
    provider: &'a P,
    store: &'a S,
  ) -> Self {
    Self { config, reference, provider, store }
  }

  /// Resolve the window to sync: `start` if given, otherwise the day after
  /// the last stored date, otherwise `history_start`. `end` defaults to
  /// `today`.
  ///
  /// Fails with [`Error::AlreadySynced`] if the window would not start
  /// strictly after the last stored date.
  pub async fn plan(
    &self,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
  ) -> Result<DateWindow> {
    let last = self.store.last_synced_date().await.map_err(Into::<Error>::into)?;
    let end = end.unwrap_or(today);
    let start = match (start, last) {
      (Some(start), _) => start,
      (None, Some(last)) => last + Days::new(1),
      (None, None) => self.config.history_start,
    };

    if let Some(last) = last
      && start <= last
    {
      return Err(Error::AlreadySynced(format!(
        "window starts {start} but data is stored through {last}"
      )));
    }
    if last.is_some() && start > end {
      return Err(Error::AlreadySynced(format!("data is already stored through {end}")));
    }
    DateWindow::new(start, end)
  }

  /// Run one sync and commit it.
  pub async fn run(
    &self,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
  ) -> Result<MarketRunReport> {
    self.store.ensure_schema().await.map_err(Into::<Error>::into)?;

    let window = self.plan(start, end, today).await?;
    let roots = self.reference.selected_roots()?;

    // Cover every delivery year the window touches, plus the forward window.
    let span = (window.end().year() - window.start().year()).max(0) as u32;
    let contracts = enumerate(self.reference, window.start(), span + self.config.years_forward)?;

    info!(
      start = %window.start(),
      end = %window.end(),
      days = window.len(),
      roots = roots.len(),
      contracts = contracts.len(),
      "starting market sync"
    );

    let fetcher = MarketDataFetcher::new(self.provider, &self.config.ticker_prefix);
    let mut batches = Vec::with_capacity(contracts.len());
    let mut failures = Vec::new();

    for contract in &contracts {
      let ticker = fetcher.ticker(contract);
      match fetcher.fetch(contract, window.start(), window.end()).await {
        Ok(observations) => {
          debug!(%ticker, rows = observations.len(), "fetched");
          batches.push(ContractBatch { contract: contract.clone(), observations });
        }
        Err(err) => {
          match &err {
            FetchError::UpstreamUnavailable(msg) => {
              warn!(%ticker, error = %msg, "upstream unavailable; skipping contract");
            }
            FetchError::SchemaMismatch(msg) => {
              error!(%ticker, error = %msg, "upstream schema mismatch; skipping contract");
            }
          }
          failures.push(FetchFailure { ticker, error: err });
        }
      }
    }

    let contracts_attempted = contracts.len();
    let contracts_synced = batches.len();

    let commit = self
      .store
      .commit_market_run(MarketRun { window, roots, contracts, batches })
      .await
      .map_err(Into::<Error>::into)?;

    if commit.out_of_window > 0 {
      warn!(rows = commit.out_of_window, "provider returned rows outside the window");
    }

    let report = MarketRunReport {
      window,
      contracts_attempted,
      contracts_synced,
      roots_inserted: commit.roots_inserted,
      contracts_inserted: commit.contracts_inserted,
      dates_inserted: commit.dates_inserted,
      observations_inserted: commit.observations_inserted,
      failures,
    };
    report.log_summary();
    Ok(report)
  }
}
