//! Shape of the CFTC Commitments of Traders data.
//!
//! The provider publishes one column per actor and position type, named
//! `"{Actor} {Position Type}"` (`"Commercial Long"`,
//! `"Nonreportable Positions Short"`). The actor is the first word and the
//! position type the last; columns whose first word is not a tracked actor
//! (`"Open Interest"`, `"Total Long"`) are ignored.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::SeriesTable;

/// Build the provider ticker for a report code.
pub fn cot_ticker(prefix: &str, code: &str, suffix: &str) -> String {
  let code: String = code.chars().filter(|c| *c != '#' && *c != ' ').collect();
  format!("{prefix}{code}{suffix}")
}

/// A provider column that carries one actor's position of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorColumn {
  pub index:         usize,
  pub actor:         String,
  pub position_type: String,
}

/// Pick out the columns belonging to `actors`.
///
/// If two columns resolve to the same (actor, position type) only the first
/// is kept, so a single row never yields duplicate records.
pub fn actor_columns(columns: &[String], actors: &[String]) -> Vec<ActorColumn> {
  let mut seen = HashSet::new();
  let mut out = Vec::new();

  for (index, name) in columns.iter().enumerate() {
    let (Some(actor), Some(position_type)) =
      (name.split_whitespace().next(), name.split_whitespace().last())
    else {
      continue;
    };
    if !actors.iter().any(|a| a == actor) {
      continue;
    }
    if !seen.insert((actor, position_type)) {
      debug!(column = %name, "skipping duplicate actor column");
      continue;
    }
    out.push(ActorColumn {
      index,
      actor: actor.to_owned(),
      position_type: position_type.to_owned(),
    });
  }

  out
}

/// One actor's holding of one position type on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCell {
  pub actor:         String,
  pub position_type: String,
  pub value:         i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
  pub date:  NaiveDate,
  pub cells: Vec<PositionCell>,
}

/// Split a provider table into per-date actor positions. Null cells are
/// skipped.
pub fn position_rows(table: &SeriesTable, actors: &[String]) -> Vec<PositionRow> {
  let columns = actor_columns(&table.columns, actors);

  table
    .rows
    .iter()
    .map(|row| PositionRow {
      date:  row.date,
      cells: columns
        .iter()
        .filter_map(|col| {
          let value = row.values.get(col.index).copied().flatten()?;
          Some(PositionCell {
            actor:         col.actor.clone(),
            position_type: col.position_type.clone(),
            value:         value.round() as i64,
          })
        })
        .collect(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::SeriesRow;

  fn actors() -> Vec<String> {
    vec!["Noncommercial".into(), "Commercial".into(), "Nonreportable".into()]
  }

  fn legacy_columns() -> Vec<String> {
    [
      "Open Interest",
      "Noncommercial Long",
      "Noncommercial Short",
      "Noncommercial Spreads",
      "Commercial Long",
      "Commercial Short",
      "Total Long",
      "Total Short",
      "Nonreportable Positions Long",
      "Nonreportable Positions Short",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
  }

  #[test]
  fn ticker_strips_hash_and_spaces() {
    assert_eq!(cot_ticker("CFTC/", "#0026 02", "_FO_L_ALL"), "CFTC/002602_FO_L_ALL");
  }

  #[test]
  fn splits_actor_and_position_type() {
    let cols = actor_columns(&legacy_columns(), &actors());
    let pairs: Vec<_> = cols
      .iter()
      .map(|c| (c.actor.as_str(), c.position_type.as_str()))
      .collect();

    assert_eq!(
      pairs,
      vec![
        ("Noncommercial", "Long"),
        ("Noncommercial", "Short"),
        ("Noncommercial", "Spreads"),
        ("Commercial", "Long"),
        ("Commercial", "Short"),
        ("Nonreportable", "Long"),
        ("Nonreportable", "Short"),
      ]
    );
    assert_eq!(cols[0].index, 1);
  }

  #[test]
  fn duplicate_actor_columns_keep_the_first() {
    let columns = vec!["Commercial Long".to_string(), "Commercial Positions Long".to_string()];
    let cols = actor_columns(&columns, &actors());
    assert_eq!(cols.len(), 1);
    assert_eq!(cols[0].index, 0);
  }

  #[test]
  fn rows_skip_null_cells() {
    let table = SeriesTable {
      columns: vec!["Open Interest".into(), "Commercial Long".into(), "Commercial Short".into()],
      rows:    vec![SeriesRow {
        date:   NaiveDate::from_ymd_opt(2018, 4, 24).unwrap(),
        values: vec![Some(1000.0), Some(250.0), None],
      }],
    };
    let rows = position_rows(&table, &actors());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cells, vec![PositionCell {
      actor:         "Commercial".into(),
      position_type: "Long".into(),
      value:         250,
    }]);
  }
}
