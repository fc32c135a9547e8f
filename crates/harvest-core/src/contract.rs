//! Futures contract identifiers and the Contract Enumerator.
//!
//! A contract is written `root + month letter + four-digit year`, e.g.
//! `CZ2018` for December 2018 corn. The root may itself be several
//! characters long, so parsing works from the end of the string.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};

use crate::{Error, Result, reference::ReferenceData};

// ─── MonthCode ───────────────────────────────────────────────────────────────

/// Exchange delivery-month letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MonthCode {
  F,
  G,
  H,
  J,
  K,
  M,
  N,
  Q,
  U,
  V,
  X,
  Z,
}

impl MonthCode {
  pub const ALL: [MonthCode; 12] = [
    Self::F,
    Self::G,
    Self::H,
    Self::J,
    Self::K,
    Self::M,
    Self::N,
    Self::Q,
    Self::U,
    Self::V,
    Self::X,
    Self::Z,
  ];

  pub fn letter(self) -> char {
    match self {
      Self::F => 'F',
      Self::G => 'G',
      Self::H => 'H',
      Self::J => 'J',
      Self::K => 'K',
      Self::M => 'M',
      Self::N => 'N',
      Self::Q => 'Q',
      Self::U => 'U',
      Self::V => 'V',
      Self::X => 'X',
      Self::Z => 'Z',
    }
  }

  pub fn from_letter(c: char) -> Option<Self> {
    Self::ALL.into_iter().find(|m| m.letter() == c)
  }
}

impl fmt::Display for MonthCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.letter())
  }
}

// ─── ContractId ──────────────────────────────────────────────────────────────

/// A deliverable instance of a root commodity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractId {
  pub root:  String,
  pub month: MonthCode,
  pub year:  i32,
}

impl ContractId {
  pub fn new(root: impl Into<String>, month: MonthCode, year: i32) -> Self {
    Self { root: root.into(), month, year }
  }
}

impl fmt::Display for ContractId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}{:04}", self.root, self.month, self.year)
  }
}

impl FromStr for ContractId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidContract(s.to_owned());

    if !s.is_ascii() || s.len() < 6 {
      return Err(invalid());
    }
    let (root, tail) = s.split_at(s.len() - 5);
    let (month, year) = tail.split_at(1);

    let month = month
      .chars()
      .next()
      .and_then(MonthCode::from_letter)
      .ok_or_else(invalid)?;
    if !year.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let year = year.parse().map_err(|_| invalid())?;

    Ok(Self::new(root, month, year))
  }
}

// ─── Enumerator ──────────────────────────────────────────────────────────────

/// Every contract of every selected root, for each year in
/// `[reference_date.year, reference_date.year + years_forward)`.
///
/// Output is grouped by root (in selection order), then year, then month in
/// the order the reference lists them. Fails with
/// [`Error::ReferentialIntegrityViolation`] if a selected root has no entry
/// in the reference table.
pub fn enumerate(
  reference:      &ReferenceData,
  reference_date: NaiveDate,
  years_forward:  u32,
) -> Result<Vec<ContractId>> {
  let first_year = reference_date.year();
  let mut contracts = Vec::new();

  for alias in reference.selected_symbols() {
    let root = reference.root(alias).ok_or_else(|| {
      Error::ReferentialIntegrityViolation(format!(
        "root symbol {alias:?} is not in the reference table"
      ))
    })?;
    let months = root.month_codes()?;

    for year in first_year..first_year + years_forward as i32 {
      contracts.extend(
        months
          .iter()
          .map(|m| ContractId::new(root.alias.clone(), *m, year)),
      );
    }
  }

  Ok(contracts)
}
