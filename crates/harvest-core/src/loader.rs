//! Positioning Report Loader: the weekly CFTC Commitments of Traders sync.
//!
//! Structurally the same as the market sync (fetch every commodity, skip and
//! record failures, commit once) but keyed by report date rather than by a
//! window of days. The guard is also stricter: an update is refused as soon
//! as the target Tuesday has any position at all.

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  calendar::previous_tuesday,
  config::PositioningConfig,
  positioning::{actor_columns, cot_ticker, position_rows},
  provider::{FetchError, TimeSeriesProvider},
  reference::ReferenceData,
  report::{FetchFailure, PositioningRunReport},
  store::{CommodityBatch, PositioningGuard, PositioningRun, PositioningStore},
};

/// What a positioning run loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
  /// Full history of every commodity into an empty store.
  Backfill,
  /// The report published for the most recent Tuesday.
  Update,
}

pub struct PositioningLoader<'a, P, S> {
  config:    &'a PositioningConfig,
  reference: &'a ReferenceData,
  provider:  &'a P,
  store:     &'a S,
}

impl<'a, P, S> PositioningLoader<'a, P, S>
where
  P: TimeSeriesProvider,
  S: PositioningStore,
{
  pub fn new(
    config: &'a PositioningConfig,
    reference: &'a ReferenceData,
    provider: &'a P,
    store: &'a S,
  ) -> Self {
    Self { config, reference, provider, store }
  }

  /// Run one load and commit it. `today` anchors the weekly target date.
  pub async fn run(&self, mode: LoadMode, today: NaiveDate) -> Result<PositioningRunReport> {
    self.store.ensure_schema().await.map_err(Into::<Error>::into)?;

    let (guard, start) = match mode {
      LoadMode::Backfill => {
        if self.store.has_any_positions().await.map_err(Into::<Error>::into)? {
          return Err(Error::AlreadySynced(
            "positions already exist; use an update instead of a backfill".into(),
          ));
        }
        (PositioningGuard::Empty, None)
      }
      LoadMode::Update => {
        let target = previous_tuesday(today);
        if self.store.has_positions_on(target).await.map_err(Into::<Error>::into)? {
          return Err(Error::AlreadySynced(format!("positions for {target} are already stored")));
        }
        (PositioningGuard::DateAbsent(target), Some(target))
      }
    };

    info!(?mode, ?start, commodities = self.reference.cot.len(), "starting positioning sync");

    let mut batches = Vec::with_capacity(self.reference.cot.len());
    let mut failures = Vec::new();

    for commodity in &self.reference.cot {
      let ticker =
        cot_ticker(&self.config.ticker_prefix, &commodity.code, &self.config.ticker_suffix);

      match self.provider.fetch(&ticker, start, None).await {
        Ok(table) => {
          if actor_columns(&table.columns, &self.config.actors).is_empty() {
            let err = FetchError::SchemaMismatch(format!(
              "no columns for actors {:?} among {:?}",
              self.config.actors, table.columns
            ));
            error!(%ticker, error = %err, "upstream schema mismatch; skipping commodity");
            failures.push(FetchFailure { ticker, error: err });
            continue;
          }
          let rows = position_rows(&table, &self.config.actors);
          debug!(%ticker, rows = rows.len(), "fetched");
          batches.push(CommodityBatch { commodity: commodity.clone(), rows });
        }
        Err(err) => {
          match &err {
            FetchError::UpstreamUnavailable(msg) => {
              warn!(%ticker, error = %msg, "upstream unavailable; skipping commodity");
            }
            FetchError::SchemaMismatch(msg) => {
              error!(%ticker, error = %msg, "upstream schema mismatch; skipping commodity");
            }
          }
          failures.push(FetchFailure { ticker, error: err });
        }
      }
    }

    let commodities_attempted = self.reference.cot.len();
    let commodities_synced = batches.len();

    let commit = self
      .store
      .commit_positioning_run(PositioningRun {
        guard,
        report: self.config.report.clone(),
        actors: self.config.actors.clone(),
        crop: self.config.crop.clone(),
        commodities: self.reference.cot.clone(),
        batches,
      })
      .await
      .map_err(Into::<Error>::into)?;

    let report = PositioningRunReport {
      commodities_attempted,
      commodities_synced,
      dates_inserted: commit.dates_inserted,
      positions_inserted: commit.positions_inserted,
      failures,
    };
    report.log_summary();
    Ok(report)
  }
}
