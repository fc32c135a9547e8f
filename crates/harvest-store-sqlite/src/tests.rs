//! Integration tests for the sync engines against in-memory SQLite stores.

use std::collections::HashMap;

use chrono::NaiveDate;
use harvest_core::{
  Error as CoreError,
  calendar::DateWindow,
  config::{MarketConfig, PositioningConfig},
  export::ExportFlattener,
  loader::{LoadMode, PositioningLoader},
  provider::{FetchError, SeriesRow, SeriesTable, TimeSeriesProvider},
  reference::ReferenceData,
  store::{MarketStore, PositioningStore},
  sync::MarketSync,
};

use crate::{SqliteMarketStore, SqlitePositioningStore};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Serves canned tables by ticker, clipped to the requested bounds. Unknown
/// tickers are reported as unavailable.
#[derive(Default)]
struct ScriptedProvider {
  tables: HashMap<String, Result<SeriesTable, FetchError>>,
}

impl ScriptedProvider {
  fn with(mut self, ticker: &str, table: Result<SeriesTable, FetchError>) -> Self {
    self.tables.insert(ticker.to_owned(), table);
    self
  }
}

impl TimeSeriesProvider for ScriptedProvider {
  async fn fetch(
    &self,
    ticker: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
  ) -> Result<SeriesTable, FetchError> {
    let mut table = self
      .tables
      .get(ticker)
      .cloned()
      .unwrap_or_else(|| Err(FetchError::UpstreamUnavailable(format!("{ticker}: not found"))))?;
    table.rows.retain(|r| {
      start.is_none_or(|s| r.date >= s) && end.is_none_or(|e| r.date <= e)
    });
    Ok(table)
  }
}

fn d(m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2018, m, day).unwrap() }

const REFERENCE: &str = r#"
[[roots]]
alias  = "C"
name   = "Corn"
market = "CBOT"
months = "KZ"

[[cot]]
code      = "002602"
alias     = "C"
commodity = "Corn"
market    = "CBOT"

[[cot]]
code      = "001602"
alias     = "W"
commodity = "Wheat"
market    = "CBOT"
"#;

fn reference() -> ReferenceData { ReferenceData::from_toml_str(REFERENCE).unwrap() }

fn market_config() -> MarketConfig {
  MarketConfig {
    years_forward: 1,
    history_start: d(4, 16),
    ..MarketConfig::default()
  }
}

/// CME-style settlement table; `rows` are `(date, settle)`.
fn settle_table(rows: &[(NaiveDate, f64)]) -> SeriesTable {
  SeriesTable {
    columns: vec!["Settle".into(), "Volume".into(), "Previous Day Open Interest".into()],
    rows:    rows
      .iter()
      .map(|(date, px)| SeriesRow {
        date:   *date,
        values: vec![Some(*px), Some(100.0), Some(2000.0)],
      })
      .collect(),
  }
}

async fn market_store() -> SqliteMarketStore {
  SqliteMarketStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn count(store: &SqliteMarketStore, table: &'static str) -> i64 {
  store
    .conn
    .call(move |conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
    .await
    .unwrap()
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_schema_is_idempotent() {
  let s = market_store().await;
  s.ensure_schema().await.unwrap();
  s.ensure_schema().await.unwrap();
  assert_eq!(s.last_synced_date().await.unwrap(), None);

  let p = SqlitePositioningStore::open_in_memory().await.unwrap();
  p.ensure_schema().await.unwrap();
  p.ensure_schema().await.unwrap();
  assert!(!p.has_any_positions().await.unwrap());
}

// ─── Market sync ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn initial_sync_inserts_one_row_per_provider_day() {
  let s = market_store().await;
  let provider = ScriptedProvider::default().with(
    "CME/CK2018",
    Ok(settle_table(&[(d(4, 16), 380.0), (d(4, 17), 381.0), (d(4, 20), 380.25)])),
  );
  let config = market_config();
  let reference = reference();

  let report = MarketSync::new(&config, &reference, &provider, &s)
    .run(None, None, d(4, 20))
    .await
    .unwrap();

  assert_eq!(report.window, DateWindow::new(d(4, 16), d(4, 20)).unwrap());
  assert_eq!(report.contracts_attempted, 2);
  assert_eq!(report.contracts_synced, 1);
  assert_eq!(report.roots_inserted, 1);
  assert_eq!(report.contracts_inserted, 2);
  assert_eq!(report.dates_inserted, 5);
  assert_eq!(report.observations_inserted, 3);

  // Days without provider data get a date row but no observation.
  assert_eq!(count(&s, "trade_date").await, 5);
  assert_eq!(count(&s, "contract_date").await, 3);
  assert_eq!(s.last_synced_date().await.unwrap(), Some(d(4, 20)));

  let triples = s.price_triples(report.window).await.unwrap();
  assert!(triples.iter().all(|t| t.alias == "CK2018"));
  assert_eq!(triples.iter().map(|t| t.date).collect::<Vec<_>>(), vec![d(4, 16), d(4, 17), d(4, 20)]);
}

#[tokio::test]
async fn failed_contract_does_not_block_others() {
  let s = market_store().await;
  // CZ2018 is unknown upstream.
  let provider = ScriptedProvider::default()
    .with("CME/CK2018", Ok(settle_table(&[(d(4, 18), 390.0)])));
  let config = market_config();
  let reference = reference();

  let report = MarketSync::new(&config, &reference, &provider, &s)
    .run(None, None, d(4, 20))
    .await
    .unwrap();

  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].ticker, "CME/CZ2018");
  assert!(matches!(report.failures[0].error, FetchError::UpstreamUnavailable(_)));
  assert_eq!(count(&s, "contract_date").await, 1);

  // The failed contract still exists, ready for the next run.
  assert!(s.contract_id("C", 'Z', 2018).await.unwrap().is_some());
}

#[tokio::test]
async fn schema_mismatch_is_recorded_and_skipped() {
  let s = market_store().await;
  let renamed = SeriesTable {
    columns: vec!["Settle".into(), "Volume".into(), "OI".into()],
    rows:    vec![SeriesRow { date: d(4, 18), values: vec![Some(1.0), Some(1.0), Some(1.0)] }],
  };
  let provider = ScriptedProvider::default()
    .with("CME/CK2018", Ok(settle_table(&[(d(4, 18), 390.0)])))
    .with("CME/CZ2018", Ok(renamed));
  let config = market_config();
  let reference = reference();

  let report = MarketSync::new(&config, &reference, &provider, &s)
    .run(None, None, d(4, 20))
    .await
    .unwrap();

  assert_eq!(report.failures.len(), 1);
  assert!(report.failures[0].is_schema_mismatch());
  assert_eq!(report.observations_inserted, 1);
}

#[tokio::test]
async fn resync_of_stored_window_fails_without_writes() {
  let s = market_store().await;
  let provider = ScriptedProvider::default()
    .with("CME/CK2018", Ok(settle_table(&[(d(4, 17), 381.0), (d(4, 19), 383.0)])));
  let config = market_config();
  let reference = reference();
  let sync = MarketSync::new(&config, &reference, &provider, &s);

  sync.run(None, None, d(4, 20)).await.unwrap();
  let dates_before = count(&s, "trade_date").await;
  let rows_before = count(&s, "contract_date").await;

  let err = sync.run(Some(d(4, 10)), Some(d(4, 18)), d(4, 20)).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadySynced(_)));

  // Same day as the last stored date is still an overlap.
  let err = sync.run(Some(d(4, 20)), None, d(4, 20)).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadySynced(_)));

  // Nothing new to sync today.
  let err = sync.run(None, None, d(4, 20)).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadySynced(_)));

  assert_eq!(count(&s, "trade_date").await, dates_before);
  assert_eq!(count(&s, "contract_date").await, rows_before);
}

#[tokio::test]
async fn incremental_sync_appends_the_tail() {
  let s = market_store().await;
  let provider = ScriptedProvider::default().with(
    "CME/CK2018",
    Ok(settle_table(&[(d(4, 19), 383.0), (d(4, 20), 384.0), (d(4, 23), 385.0)])),
  );
  let config = market_config();
  let reference = reference();
  let sync = MarketSync::new(&config, &reference, &provider, &s);

  sync.run(None, None, d(4, 20)).await.unwrap();
  let report = sync.run(None, None, d(4, 24)).await.unwrap();

  assert_eq!(report.window, DateWindow::new(d(4, 21), d(4, 24)).unwrap());
  assert_eq!(report.roots_inserted, 0);
  assert_eq!(report.contracts_inserted, 0);
  assert_eq!(report.observations_inserted, 1);
  assert_eq!(count(&s, "contract_date").await, 3);
  assert_eq!(s.last_synced_date().await.unwrap(), Some(d(4, 24)));
}

#[tokio::test]
async fn store_rejects_overlapping_commit_directly() {
  use harvest_core::store::MarketRun;

  let s = market_store().await;
  let run = |start, end| MarketRun {
    window:    DateWindow::new(start, end).unwrap(),
    roots:     reference().roots.clone(),
    contracts: vec![],
    batches:   vec![],
  };

  s.commit_market_run(run(d(4, 16), d(4, 18))).await.unwrap();
  let err = s.commit_market_run(run(d(4, 18), d(4, 19))).await.unwrap_err();
  assert!(matches!(err, crate::Error::AlreadySynced(_)));
  assert_eq!(count(&s, "trade_date").await, 3);
  assert_eq!(count(&s, "root_commodity").await, 1);
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_round_trips_stored_prices() {
  let s = market_store().await;
  let provider = ScriptedProvider::default()
    .with("CME/CK2018", Ok(settle_table(&[(d(4, 16), 380.0), (d(4, 20), 380.25)])))
    .with("CME/CZ2018", Ok(settle_table(&[(d(4, 17), 401.5), (d(4, 23), 402.0)])));
  let config = market_config();
  let reference = reference();
  MarketSync::new(&config, &reference, &provider, &s)
    .run(None, None, d(4, 23))
    .await
    .unwrap();

  let matrix = ExportFlattener::new(&s)
    .export(DateWindow::new(d(4, 16), d(4, 23)).unwrap())
    .await
    .unwrap();

  assert_eq!(matrix.aliases, vec!["CK2018", "CZ2018"]);
  // Mon..Fri plus the following Monday; the weekend is dropped.
  let dates: Vec<_> = matrix.rows.iter().map(|r| r.date).collect();
  assert_eq!(dates, vec![d(4, 16), d(4, 17), d(4, 18), d(4, 19), d(4, 20), d(4, 23)]);

  let at = |date: NaiveDate| &matrix.rows.iter().find(|r| r.date == date).unwrap().cells;
  assert_eq!(at(d(4, 16)), &vec![Some(380.0), None]);
  assert_eq!(at(d(4, 17)), &vec![Some(380.0), Some(401.5)]);
  assert_eq!(at(d(4, 20)), &vec![Some(380.25), Some(401.5)]);
  // CK carried Fri -> Mon; CZ has its own Monday value.
  assert_eq!(at(d(4, 23)), &vec![Some(380.25), Some(402.0)]);
}

// ─── Positioning ─────────────────────────────────────────────────────────────

fn cot_table(rows: &[(NaiveDate, f64)]) -> SeriesTable {
  SeriesTable {
    columns: vec![
      "Open Interest".into(),
      "Noncommercial Long".into(),
      "Commercial Short".into(),
      "Nonreportable Positions Long".into(),
    ],
    rows:    rows
      .iter()
      .map(|(date, v)| SeriesRow {
        date:   *date,
        values: vec![Some(10_000.0), Some(*v), Some(*v + 1.0), Some(*v + 2.0)],
      })
      .collect(),
  }
}

#[tokio::test]
async fn positioning_backfill_then_weekly_update() {
  let p = SqlitePositioningStore::open_in_memory().await.unwrap();
  let config = PositioningConfig::default();
  let reference = reference();

  // 2018-04-17 and 2018-04-24 are Tuesdays.
  let provider = ScriptedProvider::default()
    .with("CFTC/002602_FO_L_ALL", Ok(cot_table(&[(d(4, 10), 100.0), (d(4, 17), 200.0)])));
  let loader = PositioningLoader::new(&config, &reference, &provider, &p);

  let report = loader.run(LoadMode::Backfill, d(4, 20)).await.unwrap();
  assert_eq!(report.commodities_attempted, 2);
  assert_eq!(report.commodities_synced, 1);
  assert_eq!(report.failures[0].ticker, "CFTC/001602_FO_L_ALL");
  assert_eq!(report.dates_inserted, 2);
  assert_eq!(report.positions_inserted, 6);

  assert_eq!(
    p.position_value(d(4, 17), "C", "Nonreportable", "Long").await.unwrap(),
    Some(202)
  );
  assert_eq!(p.position_value(d(4, 17), "C", "Commercial", "Short").await.unwrap(), Some(201));

  // A second backfill is refused.
  let err = loader.run(LoadMode::Backfill, d(4, 20)).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadySynced(_)));

  // This week's report arrives.
  let provider = ScriptedProvider::default().with(
    "CFTC/002602_FO_L_ALL",
    Ok(cot_table(&[(d(4, 10), 100.0), (d(4, 17), 200.0), (d(4, 24), 300.0)])),
  );
  let loader = PositioningLoader::new(&config, &reference, &provider, &p);

  let report = loader.run(LoadMode::Update, d(4, 26)).await.unwrap();
  assert_eq!(report.dates_inserted, 1);
  assert_eq!(report.positions_inserted, 3);
  assert!(p.has_positions_on(d(4, 24)).await.unwrap());

  // Re-running the same week is refused before any write.
  let err = loader.run(LoadMode::Update, d(4, 27)).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadySynced(_)));
}

#[tokio::test]
async fn duplicate_positions_are_already_synced() {
  use harvest_core::{
    positioning::{PositionCell, PositionRow},
    store::{CommodityBatch, PositioningGuard, PositioningRun},
  };

  let p = SqlitePositioningStore::open_in_memory().await.unwrap();
  let config = PositioningConfig::default();
  let reference = reference();

  let run = |date| PositioningRun {
    guard:       PositioningGuard::DateAbsent(date),
    report:      config.report.clone(),
    actors:      config.actors.clone(),
    crop:        config.crop.clone(),
    commodities: reference.cot.clone(),
    batches:     vec![CommodityBatch {
      commodity: reference.cot[0].clone(),
      rows:      vec![PositionRow {
        date:  d(4, 17),
        cells: vec![PositionCell {
          actor:         "Commercial".into(),
          position_type: "Long".into(),
          value:         5,
        }],
      }],
    }],
  };

  p.commit_positioning_run(run(d(4, 17))).await.unwrap();

  // Guard date differs, but the holding for 04-17 is already stored.
  let err = p.commit_positioning_run(run(d(4, 24))).await.unwrap_err();
  assert!(matches!(err, crate::Error::AlreadySynced(_)));
  assert!(!p.has_positions_on(d(4, 24)).await.unwrap());
}

#[tokio::test]
async fn renamed_actor_columns_are_schema_mismatch_even_without_rows() {
  let p = SqlitePositioningStore::open_in_memory().await.unwrap();
  let config = PositioningConfig::default();
  let reference = reference();

  let renamed = SeriesTable {
    columns: vec!["Non-Commercial Long".into(), "Commercials Short".into()],
    rows:    vec![],
  };
  let provider = ScriptedProvider::default()
    .with("CFTC/002602_FO_L_ALL", Ok(renamed))
    .with("CFTC/001602_FO_L_ALL", Ok(cot_table(&[(d(4, 17), 50.0)])));
  let loader = PositioningLoader::new(&config, &reference, &provider, &p);

  let report = loader.run(LoadMode::Update, d(4, 20)).await.unwrap();
  assert_eq!(report.commodities_synced, 1);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].ticker, "CFTC/002602_FO_L_ALL");
  assert!(report.failures[0].is_schema_mismatch());
  assert_eq!(report.positions_inserted, 3);
}

#[tokio::test]
async fn null_actor_cells_are_not_a_schema_mismatch() {
  let p = SqlitePositioningStore::open_in_memory().await.unwrap();
  let config = PositioningConfig::default();
  let reference = reference();

  let mut unreported = cot_table(&[(d(4, 17), 0.0)]);
  unreported.rows[0].values = vec![Some(10_000.0), None, None, None];
  let provider = ScriptedProvider::default()
    .with("CFTC/002602_FO_L_ALL", Ok(unreported))
    .with("CFTC/001602_FO_L_ALL", Ok(cot_table(&[])));
  let loader = PositioningLoader::new(&config, &reference, &provider, &p);

  let report = loader.run(LoadMode::Backfill, d(4, 20)).await.unwrap();
  assert_eq!(report.commodities_synced, 2);
  assert!(report.failures.is_empty());
  assert_eq!(report.dates_inserted, 0);
  assert_eq!(report.positions_inserted, 0);
  assert!(!p.has_any_positions().await.unwrap());
}
