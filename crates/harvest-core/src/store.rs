//! The `MarketStore` and `PositioningStore` traits and the run payloads they
//! commit.
//!
//! The traits are implemented by storage backends (e.g.
//! `harvest-store-sqlite`). The sync engines and the export depend on this
//! abstraction, not on any concrete backend.
//!
//! History is append-only: neither trait exposes an update or delete of fact
//! rows. Each `commit_*` call is one transaction; a backend must either apply
//! the whole payload or nothing.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  calendar::DateWindow,
  contract::ContractId,
  export::PriceTriple,
  market::Observation,
  positioning::PositionRow,
  reference::{CotSpec, RootSpec},
};

// ─── Market payloads ─────────────────────────────────────────────────────────

/// Observations fetched for one contract.
#[derive(Debug, Clone)]
pub struct ContractBatch {
  pub contract:     ContractId,
  pub observations: Vec<Observation>,
}

/// Everything one market sync run writes.
#[derive(Debug, Clone)]
pub struct MarketRun {
  /// Calendar days to register; must start strictly after the last stored
  /// date.
  pub window:    DateWindow,
  /// Root commodities to register if absent.
  pub roots:     Vec<RootSpec>,
  /// The full contract universe; absent contracts are created even when
  /// their fetch failed.
  pub contracts: Vec<ContractId>,
  pub batches:   Vec<ContractBatch>,
}

/// Row counts written by [`MarketStore::commit_market_run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketCommit {
  pub roots_inserted:        usize,
  pub contracts_inserted:    usize,
  pub dates_inserted:        usize,
  pub observations_inserted: usize,
  /// Provider rows dated outside the window; not stored.
  pub out_of_window:         usize,
}

// ─── Positioning payloads ────────────────────────────────────────────────────

/// Positions fetched for one commodity.
#[derive(Debug, Clone)]
pub struct CommodityBatch {
  pub commodity: CotSpec,
  pub rows:      Vec<PositionRow>,
}

/// The precondition a positioning commit re-checks inside its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositioningGuard {
  /// No position may exist at all (historical backfill).
  Empty,
  /// No position may exist on this date (weekly update).
  DateAbsent(NaiveDate),
}

/// Everything one positioning run writes.
#[derive(Debug, Clone)]
pub struct PositioningRun {
  pub guard:       PositioningGuard,
  /// Report type, e.g. `"Legacy"`.
  pub report:      String,
  pub actors:      Vec<String>,
  pub crop:        String,
  pub commodities: Vec<CotSpec>,
  pub batches:     Vec<CommodityBatch>,
}

/// Row counts written by [`PositioningStore::commit_positioning_run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositioningCommit {
  pub dates_inserted:     usize,
  pub positions_inserted: usize,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Storage for daily contract observations.
///
/// `Self::Error` converts into [`crate::Error`]; backends map a violated
/// append-only guard to [`crate::Error::AlreadySynced`].
pub trait MarketStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Create any missing tables. Running twice is a no-op.
  fn ensure_schema(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The latest calendar date registered, if any.
  fn last_synced_date(
    &self,
  ) -> impl Future<Output = Result<Option<NaiveDate>, Self::Error>> + Send + '_;

  /// Apply `run` as a single transaction.
  fn commit_market_run(
    &self,
    run: MarketRun,
  ) -> impl Future<Output = Result<MarketCommit, Self::Error>> + Send + '_;

  /// `(date, contract alias, price)` for every observation inside `window`.
  fn price_triples(
    &self,
    window: DateWindow,
  ) -> impl Future<Output = Result<Vec<PriceTriple>, Self::Error>> + Send + '_;
}

/// Storage for weekly actor-level positioning records.
pub trait PositioningStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Create any missing tables. Running twice is a no-op.
  fn ensure_schema(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Whether any position is recorded on `date`.
  fn has_positions_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Whether any position is recorded at all.
  fn has_any_positions(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Apply `run` as a single transaction.
  fn commit_positioning_run(
    &self,
    run: PositioningRun,
  ) -> impl Future<Output = Result<PositioningCommit, Self::Error>> + Send + '_;
}
