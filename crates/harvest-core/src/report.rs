//! Run reports: what a sync run attempted, wrote, and skipped.

use tracing::{info, warn};

use crate::{calendar::DateWindow, provider::FetchError};

/// A contract or commodity whose fetch failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
  pub ticker: String,
  pub error:  FetchError,
}

impl FetchFailure {
  pub fn is_schema_mismatch(&self) -> bool {
    matches!(self.error, FetchError::SchemaMismatch(_))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRunReport {
  pub window:                DateWindow,
  pub contracts_attempted:   usize,
  pub contracts_synced:      usize,
  pub roots_inserted:        usize,
  pub contracts_inserted:    usize,
  pub dates_inserted:        usize,
  pub observations_inserted: usize,
  pub failures:              Vec<FetchFailure>,
}

impl MarketRunReport {
  pub fn log_summary(&self) {
    info!(
      start = %self.window.start(),
      end = %self.window.end(),
      attempted = self.contracts_attempted,
      synced = self.contracts_synced,
      new_roots = self.roots_inserted,
      new_contracts = self.contracts_inserted,
      dates = self.dates_inserted,
      observations = self.observations_inserted,
      failed = self.failures.len(),
      "market sync committed"
    );
    log_failures(&self.failures);
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositioningRunReport {
  pub commodities_attempted: usize,
  pub commodities_synced:    usize,
  pub dates_inserted:        usize,
  pub positions_inserted:    usize,
  pub failures:              Vec<FetchFailure>,
}

impl PositioningRunReport {
  pub fn log_summary(&self) {
    info!(
      attempted = self.commodities_attempted,
      synced = self.commodities_synced,
      dates = self.dates_inserted,
      positions = self.positions_inserted,
      failed = self.failures.len(),
      "positioning sync committed"
    );
    log_failures(&self.failures);
  }
}

fn log_failures(failures: &[FetchFailure]) {
  let mismatches = failures.iter().filter(|f| f.is_schema_mismatch()).count();
  if mismatches > 0 {
    warn!(count = mismatches, "upstream schema changed for some tickers; check the provider");
  }
  for failure in failures {
    info!(ticker = %failure.ticker, error = %failure.error, "skipped");
  }
}
