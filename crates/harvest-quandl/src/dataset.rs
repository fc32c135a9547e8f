//! Decoding of the v3 dataset JSON payload into a [`SeriesTable`].
//!
//! ```json
//! {"dataset": {
//!   "column_names": ["Date", "Open", "Settle", "Volume", "Open Interest"],
//!   "data": [["2018-04-20", 381.0, 380.25, 1200, 5400], ...]
//! }}
//! ```
//!
//! The first column is always the date. Non-numeric cells become `None`.

use chrono::NaiveDate;
use harvest_core::provider::{FetchError, SeriesRow, SeriesTable};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct Envelope {
  dataset: Dataset,
}

#[derive(Deserialize)]
struct Dataset {
  column_names: Vec<String>,
  #[serde(default)]
  data:         Vec<Vec<Value>>,
}

pub fn decode_dataset(body: &str) -> Result<SeriesTable, FetchError> {
  let envelope: Envelope = serde_json::from_str(body)
    .map_err(|e| FetchError::SchemaMismatch(format!("unexpected dataset payload: {e}")))?;
  let Dataset { mut column_names, data } = envelope.dataset;

  if column_names.is_empty() {
    return Err(FetchError::SchemaMismatch("dataset has no columns".into()));
  }
  column_names.remove(0);

  let mut rows = data
    .into_iter()
    .map(|cells| decode_row(cells, column_names.len()))
    .collect::<Result<Vec<_>, _>>()?;
  rows.sort_by_key(|r| r.date);

  Ok(SeriesTable { columns: column_names, rows })
}

fn decode_row(cells: Vec<Value>, width: usize) -> Result<SeriesRow, FetchError> {
  let mut cells = cells.into_iter();
  let date = cells
    .next()
    .as_ref()
    .and_then(Value::as_str)
    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    .ok_or_else(|| FetchError::SchemaMismatch("row without a leading date".into()))?;

  let mut values: Vec<Option<f64>> = cells.map(|v| v.as_f64()).collect();
  values.resize(width, None);

  Ok(SeriesRow { date, values })
}
