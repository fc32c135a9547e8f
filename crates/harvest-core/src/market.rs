//! Market Data Fetcher: daily settlement rows for a single futures contract.
//!
//! The provider's open-interest column has gone by several names over the
//! years; [`normalize`] folds them into [`Observation::open_interest`] and
//! refuses tables that carry none of them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  contract::ContractId,
  provider::{FetchError, SeriesTable, TimeSeriesProvider},
};

pub const SETTLE_COLUMN: &str = "Settle";
pub const VOLUME_COLUMN: &str = "Volume";

/// Known spellings of the open-interest column, in lookup order.
pub const OPEN_INTEREST_ALIASES: [&str; 4] = [
  "Previous Day Open Interest",
  "Prev. Day Open Interest",
  "Open Interest",
  "Prev Day Open Interest",
];

/// One day of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub date:          NaiveDate,
  pub price:         f64,
  pub volume:        Option<i64>,
  pub open_interest: Option<i64>,
}

/// Map a provider table onto [`Observation`]s, ascending by date.
///
/// Rows without a settlement price carry no data for that day and are
/// dropped.
pub fn normalize(table: &SeriesTable) -> Result<Vec<Observation>, FetchError> {
  let settle = table
    .column(SETTLE_COLUMN)
    .ok_or_else(|| missing_column(table, SETTLE_COLUMN))?;
  let volume = table
    .column(VOLUME_COLUMN)
    .ok_or_else(|| missing_column(table, VOLUME_COLUMN))?;
  let open_interest = OPEN_INTEREST_ALIASES
    .iter()
    .find_map(|alias| table.column(alias))
    .ok_or_else(|| missing_column(table, "open interest"))?;

  let mut observations: Vec<Observation> = table
    .rows
    .iter()
    .filter_map(|row| {
      Some(Observation {
        date:          row.date,
        price:         cell(&row.values, settle)?,
        volume:        cell(&row.values, volume).map(|v| v.round() as i64),
        open_interest: cell(&row.values, open_interest).map(|v| v.round() as i64),
      })
    })
    .collect();

  observations.sort_by_key(|o| o.date);
  Ok(observations)
}

fn cell(values: &[Option<f64>], i: usize) -> Option<f64> { values.get(i).copied().flatten() }

fn missing_column(table: &SeriesTable, what: &str) -> FetchError {
  FetchError::SchemaMismatch(format!(
    "no {what} column among {:?}",
    table.columns
  ))
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

/// Wraps a [`TimeSeriesProvider`] with contract-to-ticker mapping and
/// normalization.
pub struct MarketDataFetcher<'a, P> {
  provider:      &'a P,
  ticker_prefix: &'a str,
}

impl<'a, P: TimeSeriesProvider> MarketDataFetcher<'a, P> {
  pub fn new(provider: &'a P, ticker_prefix: &'a str) -> Self {
    Self { provider, ticker_prefix }
  }

  pub fn ticker(&self, contract: &ContractId) -> String {
    format!("{}{contract}", self.ticker_prefix)
  }

  pub async fn fetch(
    &self,
    contract: &ContractId,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<Observation>, FetchError> {
    let ticker = self.ticker(contract);
    let table = self.provider.fetch(&ticker, Some(start), Some(end)).await?;
    normalize(&table)
  }
}
