//! [`SqliteMarketStore`]: the SQLite implementation of [`MarketStore`].

use std::{collections::HashMap, path::Path};

use chrono::NaiveDate;
use harvest_core::{
  calendar::DateWindow,
  export::PriceTriple,
  store::{MarketCommit, MarketRun, MarketStore},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Error, Result,
  encode::{decode_date, encode_date},
  error::abort,
  schema::MARKET_SCHEMA,
};

/// `(root alias, month letter, year)`
type ContractKey = (String, String, i32);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The market-data database, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteMarketStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteMarketStore {
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
        conn.execute_batch(MARKET_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── MarketStore impl ────────────────────────────────────────────────────────

impl MarketStore for SqliteMarketStore {
  type Error = Error;

  async fn ensure_schema(&self) -> Result<()> { self.init_schema().await }

  async fn last_synced_date(&self) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT MAX(date) FROM trade_date", [], |r| r.get(0))?))
      .await?;

    raw.as_deref().map(decode_date).transpose()
  }

  async fn commit_market_run(&self, run: MarketRun) -> Result<MarketCommit> {
    let start_str = encode_date(run.window.start());
    let days: Vec<(NaiveDate, String)> =
      run.window.days().map(|d| (d, encode_date(d))).collect();

    let commit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut commit = MarketCommit::default();

        // Re-check the append-only guard under the write lock.
        let last: Option<String> =
          tx.query_row("SELECT MAX(date) FROM trade_date", [], |r| r.get(0))?;
        if let Some(last) = last
          && last >= start_str
        {
          return Err(abort(Error::AlreadySynced(format!(
            "window starts {start_str} but data is stored through {last}"
          ))));
        }

        // Roots: insert if new, then memoise alias -> id.
        {
          let mut insert = tx.prepare(
            "INSERT INTO root_commodity (name, market, alias) VALUES (?1, ?2, ?3)
             ON CONFLICT (alias) DO NOTHING",
          )?;
          for root in &run.roots {
            commit.roots_inserted +=
              insert.execute(rusqlite::params![root.name, root.market, root.alias])?;
          }
        }
        let roots: HashMap<String, i64> = {
          let mut stmt = tx.prepare("SELECT alias, id_root FROM root_commodity")?;
          stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
        };

        // Contracts: memoise the existing ones, create the rest.
        let mut contracts: HashMap<ContractKey, i64> = {
          let mut stmt = tx.prepare(
            "SELECT r.alias, c.month, c.year, c.id_contract
             FROM contract c
             JOIN root_commodity r ON r.id_root = c.id_root",
          )?;
          stmt
            .query_map([], |r| Ok(((r.get(0)?, r.get(1)?, r.get(2)?), r.get(3)?)))?
            .collect::<rusqlite::Result<_>>()?
        };
        {
          let mut insert =
            tx.prepare("INSERT INTO contract (month, year, id_root) VALUES (?1, ?2, ?3)")?;
          for contract in &run.contracts {
            let key = (contract.root.clone(), contract.month.to_string(), contract.year);
            if contracts.contains_key(&key) {
              continue;
            }
            let id_root = roots.get(&contract.root).copied().ok_or_else(|| {
              abort(Error::ReferentialIntegrity(format!(
                "contract {contract} references unknown root {:?}",
                contract.root
              )))
            })?;
            insert.execute(rusqlite::params![key.1, key.2, id_root])?;
            contracts.insert(key, tx.last_insert_rowid());
            commit.contracts_inserted += 1;
          }
        }

        // Dates: every calendar day of the window.
        let mut dates: HashMap<NaiveDate, i64> = HashMap::with_capacity(days.len());
        {
          let mut insert = tx.prepare("INSERT INTO trade_date (date) VALUES (?1)")?;
          for (day, day_str) in &days {
            insert.execute(rusqlite::params![day_str])?;
            dates.insert(*day, tx.last_insert_rowid());
          }
          commit.dates_inserted = days.len();
        }

        // Observations.
        {
          let mut insert = tx.prepare(
            "INSERT INTO contract_date (price, open_interest, volume, id_date, id_contract)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for batch in &run.batches {
            let c = &batch.contract;
            let key = (c.root.clone(), c.month.to_string(), c.year);
            let id_contract = contracts.get(&key).copied().ok_or_else(|| {
              abort(Error::ReferentialIntegrity(format!(
                "observations for {c}, which is not in the contract universe"
              )))
            })?;

            for obs in &batch.observations {
              let Some(id_date) = dates.get(&obs.date).copied() else {
                commit.out_of_window += 1;
                continue;
              };
              insert.execute(rusqlite::params![
                obs.price,
                obs.open_interest,
                obs.volume,
                id_date,
                id_contract,
              ])?;
              commit.observations_inserted += 1;
            }
          }
        }

        tx.commit()?;
        Ok(commit)
      })
      .await?;

    debug!(?commit, "market run committed");
    Ok(commit)
  }

  async fn price_triples(&self, window: DateWindow) -> Result<Vec<PriceTriple>> {
    let from = encode_date(window.start());
    let to = encode_date(window.end());

    let raws: Vec<(String, String, f64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.date, r.alias || c.month || c.year AS alias, cd.price
           FROM contract_date cd
           JOIN trade_date     d ON d.id_date     = cd.id_date
           JOIN contract       c ON c.id_contract = cd.id_contract
           JOIN root_commodity r ON r.id_root     = c.id_root
           WHERE d.date BETWEEN ?1 AND ?2
           ORDER BY d.date, alias",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from, to], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(date, alias, price)| Ok(PriceTriple { date: decode_date(&date)?, alias, price }))
      .collect()
  }
}

impl SqliteMarketStore {
  /// The stored id of a contract, if it exists.
  pub async fn contract_id(&self, root: &str, month: char, year: i32) -> Result<Option<i64>> {
    let root = root.to_owned();
    let month = month.to_string();
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT c.id_contract FROM contract c
                 JOIN root_commodity r ON r.id_root = c.id_root
                 WHERE r.alias = ?1 AND c.month = ?2 AND c.year = ?3",
                rusqlite::params![root, month, year],
                |r| r.get(0),
              )
              .optional()?,
          )
        })
        .await?,
    )
  }
}
