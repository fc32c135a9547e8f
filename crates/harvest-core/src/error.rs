//! Error types for `harvest-core`.

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal errors: any of these aborts a run before its transaction commits.
///
/// Per-contract fetch failures are not errors at this level; they are
/// recorded as [`FetchError`](crate::provider::FetchError)s in the run
/// report.
#[derive(Debug, Error)]
pub enum Error {
  /// The requested window overlaps history that is already stored.
  #[error("already synced: {0}")]
  AlreadySynced(String),

  /// A lookup against reference data or a parent table failed.
  #[error("referential integrity violation: {0}")]
  ReferentialIntegrityViolation(String),

  #[error("invalid date window: {start} is after {end}")]
  InvalidWindow { start: NaiveDate, end: NaiveDate },

  #[error("invalid reference data: {0}")]
  InvalidReference(String),

  #[error("invalid contract identifier: {0:?}")]
  InvalidContract(String),

  #[error("reference parse error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
