//! The `TimeSeriesProvider` trait and the table shape it returns.
//!
//! The trait is implemented by provider clients (e.g. `harvest-quandl`). The
//! sync engines depend on this abstraction, never on a concrete client, and
//! treat every provider as unreliable: it may be down, rename fields, or
//! have no data for a given window.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Table ───────────────────────────────────────────────────────────────────

/// One dated row of a [`SeriesTable`]; `values` is aligned with
/// [`SeriesTable::columns`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
  pub date:   NaiveDate,
  pub values: Vec<Option<f64>>,
}

/// A dated table of numeric fields, as returned by the provider.
///
/// `columns` excludes the date column itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesTable {
  pub columns: Vec<String>,
  pub rows:    Vec<SeriesRow>,
}

impl SeriesTable {
  pub fn column(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a single fetch failed. Recorded per contract; never fatal for a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Network or provider failure, or the ticker does not exist upstream.
  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(String),

  /// The provider answered, but not in a shape we recognise.
  #[error("schema mismatch: {0}")]
  SchemaMismatch(String),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A request/response time-series source keyed by a provider ticker.
pub trait TimeSeriesProvider: Send + Sync {
  /// Fetch `ticker` between the optional inclusive bounds, rows ascending by
  /// date.
  fn fetch<'a>(
    &'a self,
    ticker: &'a str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
  ) -> impl Future<Output = Result<SeriesTable, FetchError>> + Send + 'a;
}
