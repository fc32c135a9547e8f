//! Pipeline configuration, deserialised from the `[market]`, `[positioning]`
//! and `[export]` tables of `harvest.toml`.
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

// ─── Market ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
  /// SQLite file holding the market-data schema.
  pub database:      PathBuf,
  /// Reference metadata TOML.
  pub reference:     PathBuf,
  /// Prepended to a contract identifier to form the provider ticker.
  pub ticker_prefix: String,
  /// Forward window of delivery years to enumerate.
  pub years_forward: u32,
  /// First day of the initial historical load.
  pub history_start: NaiveDate,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      database:      PathBuf::from("MarketData.db"),
      reference:     PathBuf::from("reference.toml"),
      ticker_prefix: "CME/".into(),
      years_forward: 4,
      history_start: default_history_start(),
    }
  }
}

// ─── Positioning ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
  pub database:      PathBuf,
  pub reference:     PathBuf,
  pub ticker_prefix: String,
  pub ticker_suffix: String,
  /// Report type the actors belong to.
  pub report:        String,
  /// Actor categories to keep; matched against the first word of each
  /// provider column.
  pub actors:        Vec<String>,
  pub crop:          String,
}

impl Default for PositioningConfig {
  fn default() -> Self {
    Self {
      database:      PathBuf::from("COT.db"),
      reference:     PathBuf::from("reference.toml"),
      ticker_prefix: "CFTC/".into(),
      ticker_suffix: "_FO_L_ALL".into(),
      report:        "Legacy".into(),
      actors:        vec![
        "Noncommercial".into(),
        "Commercial".into(),
        "Nonreportable".into(),
      ],
      crop:          "All".into(),
    }
  }
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
  /// Market-data SQLite file to read.
  pub database: PathBuf,
  pub output:   PathBuf,
  pub from:     NaiveDate,
  /// Defaults to today when unset.
  pub to:       Option<NaiveDate>,
}

impl Default for ExportConfig {
  fn default() -> Self {
    Self {
      database: PathBuf::from("MarketData.db"),
      output:   PathBuf::from("mx_px.csv"),
      from:     default_history_start(),
      to:       None,
    }
  }
}

fn default_history_start() -> NaiveDate {
  NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default()
}
