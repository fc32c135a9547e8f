//! [`SqlitePositioningStore`]: the SQLite implementation of
//! [`PositioningStore`].

use std::{collections::HashMap, path::Path};

use chrono::{Datelike, NaiveDate};
use harvest_core::store::{PositioningCommit, PositioningGuard, PositioningRun, PositioningStore};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{Error, Result, error::abort, schema::POSITIONING_SCHEMA};

const POSITION_ON_DATE: &str = "SELECT EXISTS (
   SELECT 1 FROM position p
   JOIN observation_date d ON d.id_date = p.id_date
   WHERE d.year = ?1 AND d.month = ?2 AND d.day = ?3
 )";

const ANY_POSITION: &str = "SELECT EXISTS (SELECT 1 FROM position)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// The CFTC positioning database, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqlitePositioningStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqlitePositioningStore {
  /// Open (or create) a store at `path` and ensure its schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(POSITIONING_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Stored value of one holding, if present.
  pub async fn position_value(
    &self,
    date: NaiveDate,
    commodity_alias: &str,
    actor: &str,
    position_type: &str,
  ) -> Result<Option<i64>> {
    let alias = commodity_alias.to_owned();
    let actor = actor.to_owned();
    let position_type = position_type.to_owned();

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT p.value FROM position p
                 JOIN observation_date d ON d.id_date  = p.id_date
                 JOIN commodity        c ON c.id_commo = p.id_commo
                 JOIN actor            a ON a.id_actor = p.id_actor
                 WHERE d.year = ?1 AND d.month = ?2 AND d.day = ?3
                   AND c.alias = ?4 AND a.name = ?5 AND p.position_type = ?6",
                rusqlite::params![
                  date.year(),
                  date.month(),
                  date.day(),
                  alias,
                  actor,
                  position_type
                ],
                |r| r.get(0),
              )
              .optional()?,
          )
        })
        .await?,
    )
  }
}

// ─── PositioningStore impl ───────────────────────────────────────────────────

impl PositioningStore for SqlitePositioningStore {
  type Error = Error;

  async fn ensure_schema(&self) -> Result<()> { self.init_schema().await }

  async fn has_positions_on(&self, date: NaiveDate) -> Result<bool> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(
            POSITION_ON_DATE,
            rusqlite::params![date.year(), date.month(), date.day()],
            |r| r.get(0),
          )?)
        })
        .await?,
    )
  }

  async fn has_any_positions(&self) -> Result<bool> {
    Ok(
      self
        .conn
        .call(|conn| Ok(conn.query_row(ANY_POSITION, [], |r| r.get(0))?))
        .await?,
    )
  }

  async fn commit_positioning_run(&self, run: PositioningRun) -> Result<PositioningCommit> {
    let commit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut commit = PositioningCommit::default();

        // Re-check the guard under the write lock.
        let violated: bool = match run.guard {
          PositioningGuard::Empty => tx.query_row(ANY_POSITION, [], |r| r.get(0))?,
          PositioningGuard::DateAbsent(date) => tx.query_row(
            POSITION_ON_DATE,
            rusqlite::params![date.year(), date.month(), date.day()],
            |r| r.get(0),
          )?,
        };
        if violated {
          return Err(abort(Error::AlreadySynced(format!(
            "positions already stored ({:?})",
            run.guard
          ))));
        }

        // Report type and its actors.
        tx.execute(
          "INSERT INTO report (type) VALUES (?1) ON CONFLICT (type) DO NOTHING",
          rusqlite::params![run.report],
        )?;
        let id_report: i64 = tx.query_row(
          "SELECT id_report FROM report WHERE type = ?1",
          rusqlite::params![run.report],
          |r| r.get(0),
        )?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO actor (name, id_report) VALUES (?1, ?2)
             ON CONFLICT (name, id_report) DO NOTHING",
          )?;
          for actor in &run.actors {
            insert.execute(rusqlite::params![actor, id_report])?;
          }
        }
        let actors: HashMap<String, i64> = {
          let mut stmt = tx.prepare("SELECT name, id_actor FROM actor WHERE id_report = ?1")?;
          stmt
            .query_map(rusqlite::params![id_report], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
        };

        // Commodities.
        {
          let mut insert = tx.prepare(
            "INSERT INTO commodity (alias, commodity, market) VALUES (?1, ?2, ?3)
             ON CONFLICT (alias) DO NOTHING",
          )?;
          for c in &run.commodities {
            insert.execute(rusqlite::params![c.alias, c.commodity, c.market])?;
          }
        }
        let commodities: HashMap<String, i64> = {
          let mut stmt = tx.prepare("SELECT alias, id_commo FROM commodity")?;
          stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
        };

        // Positions, resolving report dates as they appear.
        let mut dates: HashMap<NaiveDate, i64> = HashMap::new();
        {
          let mut find_date = tx.prepare(
            "SELECT id_date FROM observation_date WHERE year = ?1 AND month = ?2 AND day = ?3",
          )?;
          let mut insert_date =
            tx.prepare("INSERT INTO observation_date (day, month, year) VALUES (?1, ?2, ?3)")?;
          let mut insert = tx.prepare(
            "INSERT INTO position (value, position_type, crop, id_actor, id_date, id_commo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;

          for batch in &run.batches {
            let id_commo = commodities.get(&batch.commodity.alias).copied().ok_or_else(|| {
              abort(Error::ReferentialIntegrity(format!(
                "unknown commodity {:?}",
                batch.commodity.alias
              )))
            })?;

            for row in batch.rows.iter().filter(|r| !r.cells.is_empty()) {
              let id_date = match dates.get(&row.date) {
                Some(id) => *id,
                None => {
                  let (y, m, d) = (row.date.year(), row.date.month(), row.date.day());
                  let id = match find_date
                    .query_row(rusqlite::params![y, m, d], |r| r.get(0))
                    .optional()?
                  {
                    Some(id) => id,
                    None => {
                      insert_date.execute(rusqlite::params![d, m, y])?;
                      commit.dates_inserted += 1;
                      tx.last_insert_rowid()
                    }
                  };
                  dates.insert(row.date, id);
                  id
                }
              };

              for cell in &row.cells {
                let id_actor = actors.get(&cell.actor).copied().ok_or_else(|| {
                  abort(Error::ReferentialIntegrity(format!("unknown actor {:?}", cell.actor)))
                })?;
                insert.execute(rusqlite::params![
                  cell.value,
                  cell.position_type,
                  run.crop,
                  id_actor,
                  id_date,
                  id_commo,
                ])?;
                commit.positions_inserted += 1;
              }
            }
          }
        }

        tx.commit()?;
        Ok(commit)
      })
      .await?;

    debug!(?commit, "positioning run committed");
    Ok(commit)
  }
}
