//! Static reference metadata: which instruments exist, which delivery months
//! they trade, and which CFTC report codes map onto which commodities.
//!
//! Read once at startup from a TOML file:
//!
//! ```toml
//! symbols = ["C", "W"]          # roots to sync; empty means every root
//!
//! [[roots]]
//! alias  = "C"
//! name   = "Corn"
//! market = "CBOT"
//! months = "HKNUZ"
//!
//! [[cot]]
//! code      = "002602"
//! alias     = "C"
//! commodity = "Corn"
//! market    = "CBOT"
//! ```

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, contract::MonthCode};

/// One root commodity and the delivery months it trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
  pub alias:  String,
  pub name:   String,
  pub market: String,
  /// Delivery-month letters, e.g. `"HKNUZ"`.
  pub months: String,
}

impl RootSpec {
  pub fn month_codes(&self) -> Result<Vec<MonthCode>> {
    self
      .months
      .chars()
      .map(|c| {
        MonthCode::from_letter(c).ok_or_else(|| {
          Error::InvalidReference(format!(
            "root {:?}: {c:?} is not a delivery-month code",
            self.alias
          ))
        })
      })
      .collect()
  }
}

/// One commodity tracked in the CFTC positioning report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CotSpec {
  /// Upstream report code; `#` and spaces are stripped when building the
  /// ticker.
  pub code:      String,
  pub alias:     String,
  pub commodity: String,
  pub market:    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
  #[serde(default)]
  pub symbols: Vec<String>,
  #[serde(default)]
  pub roots:   Vec<RootSpec>,
  #[serde(default)]
  pub cot:     Vec<CotSpec>,
}

impl ReferenceData {
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_toml_str(&raw)
  }

  pub fn from_toml_str(raw: &str) -> Result<Self> {
    let data: Self = toml::from_str(raw)?;
    data.validate()?;
    Ok(data)
  }

  fn validate(&self) -> Result<()> {
    let mut aliases = HashSet::new();
    for root in &self.roots {
      if !aliases.insert(root.alias.as_str()) {
        return Err(Error::InvalidReference(format!(
          "root {:?} is listed twice",
          root.alias
        )));
      }
      let months = root.month_codes()?;
      if months.iter().collect::<HashSet<_>>().len() != months.len() {
        return Err(Error::InvalidReference(format!(
          "root {:?} repeats a delivery month",
          root.alias
        )));
      }
    }

    let mut cot_aliases = HashSet::new();
    for entry in &self.cot {
      if !cot_aliases.insert(entry.alias.as_str()) {
        return Err(Error::InvalidReference(format!(
          "cot commodity {:?} is listed twice",
          entry.alias
        )));
      }
    }
    Ok(())
  }

  pub fn root(&self, alias: &str) -> Option<&RootSpec> {
    self.roots.iter().find(|r| r.alias == alias)
  }

  /// The root aliases to sync: `symbols` when given, otherwise every root.
  pub fn selected_symbols(&self) -> Vec<&str> {
    if self.symbols.is_empty() {
      self.roots.iter().map(|r| r.alias.as_str()).collect()
    } else {
      self.symbols.iter().map(String::as_str).collect()
    }
  }

  /// The [`RootSpec`]s behind [`selected_symbols`](Self::selected_symbols).
  pub fn selected_roots(&self) -> Result<Vec<RootSpec>> {
    self
      .selected_symbols()
      .into_iter()
      .map(|alias| {
        self.root(alias).cloned().ok_or_else(|| {
          Error::ReferentialIntegrityViolation(format!(
            "root symbol {alias:?} is not in the reference table"
          ))
        })
      })
      .collect()
  }
}
