//! Export Flattener: the date x contract price matrix written to CSV.
//!
//! Observations are pivoted into one column per contract alias, reindexed
//! over every calendar day of the range, forward-filled across gaps of at
//! most [`FORWARD_FILL_LIMIT`] days, and finally stripped of weekend rows.
//! Longer gaps stay empty so real data outages remain visible.

use std::{collections::BTreeMap, fs::File, io, path::Path};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  calendar::{DateWindow, is_weekend},
  store::MarketStore,
};

/// Longest run of empty days a value is carried across.
pub const FORWARD_FILL_LIMIT: usize = 3;

/// One stored settlement price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTriple {
  pub date:  NaiveDate,
  /// Contract identifier, e.g. `CZ2018`.
  pub alias: String,
  pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
  pub date:  NaiveDate,
  pub cells: Vec<Option<f64>>,
}

/// Wide price table; `cells` of every row align with `aliases`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
  pub aliases: Vec<String>,
  pub rows:    Vec<MatrixRow>,
}

impl PriceMatrix {
  /// Pivot `triples` into one row per calendar day of `window`, columns
  /// sorted by alias. Triples outside the window are ignored.
  pub fn pivot(triples: &[PriceTriple], window: DateWindow) -> Self {
    let mut columns: BTreeMap<&str, usize> = BTreeMap::new();
    for t in triples.iter().filter(|t| window.contains(t.date)) {
      columns.entry(t.alias.as_str()).or_default();
    }
    for (i, index) in columns.values_mut().enumerate() {
      *index = i;
    }

    let mut rows: Vec<MatrixRow> = window
      .days()
      .map(|date| MatrixRow { date, cells: vec![None; columns.len()] })
      .collect();

    for t in triples.iter().filter(|t| window.contains(t.date)) {
      let row = (t.date - window.start()).num_days() as usize;
      rows[row].cells[columns[t.alias.as_str()]] = Some(t.price);
    }

    Self {
      aliases: columns.keys().map(|a| a.to_string()).collect(),
      rows,
    }
  }

  /// Carry each value forward into at most `limit` consecutive empty cells.
  pub fn forward_fill(&mut self, limit: usize) {
    for col in 0..self.aliases.len() {
      let mut last = None;
      let mut run = 0;
      for row in &mut self.rows {
        match row.cells[col] {
          Some(v) => {
            last = Some(v);
            run = 0;
          }
          None => {
            run += 1;
            if run <= limit {
              row.cells[col] = last;
            }
          }
        }
      }
    }
  }

  pub fn drop_weekends(&mut self) {
    self.rows.retain(|r| !is_weekend(r.date));
  }

  /// Write a `Date` column followed by one column per alias. Empty cells are
  /// written as empty fields.
  pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(self.aliases.len() + 1);
    header.push("Date");
    header.extend(self.aliases.iter().map(String::as_str));
    out.write_record(&header)?;

    for row in &self.rows {
      let mut record = Vec::with_capacity(row.cells.len() + 1);
      record.push(row.date.format("%Y-%m-%d").to_string());
      record.extend(row.cells.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()));
      out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
  }
}

// ─── Flattener ───────────────────────────────────────────────────────────────

pub struct ExportFlattener<'a, S> {
  store: &'a S,
}

impl<'a, S: MarketStore> ExportFlattener<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Build the exported matrix for `window`.
  pub async fn export(&self, window: DateWindow) -> Result<PriceMatrix> {
    let triples = self.store.price_triples(window).await.map_err(Into::<Error>::into)?;

    let mut matrix = PriceMatrix::pivot(&triples, window);
    matrix.forward_fill(FORWARD_FILL_LIMIT);
    matrix.drop_weekends();
    Ok(matrix)
  }

  /// Export `window` to a CSV file at `path`; returns the number of rows
  /// written.
  pub async fn export_to_path(&self, window: DateWindow, path: impl AsRef<Path>) -> Result<usize> {
    let matrix = self.export(window).await?;
    matrix.write_csv(File::create(path.as_ref())?)?;

    info!(
      path = %path.as_ref().display(),
      rows = matrix.rows.len(),
      contracts = matrix.aliases.len(),
      "export written"
    );
    Ok(matrix.rows.len())
  }
}
