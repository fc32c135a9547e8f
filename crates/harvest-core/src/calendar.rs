//! Calendar helpers: inclusive date windows, the weekly CFTC anchor, and the
//! weekend test used by the export.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::{Error, Result};

// ─── DateWindow ──────────────────────────────────────────────────────────────

/// An inclusive range of calendar dates, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
  start: NaiveDate,
  end:   NaiveDate,
}

impl DateWindow {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::InvalidWindow { start, end });
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> NaiveDate { self.start }

  pub fn end(&self) -> NaiveDate { self.end }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// Number of calendar days covered, both ends included.
  pub fn len(&self) -> usize {
    (self.end - self.start).num_days() as usize + 1
  }

  /// Every calendar day in the window, in ascending order.
  pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }
}

// ─── Anchors ─────────────────────────────────────────────────────────────────

/// The most recent Tuesday on or before `now`.
///
/// CFTC positions are reported as of Tuesday, so this is the date a weekly
/// update targets.
pub fn previous_tuesday(now: NaiveDate) -> NaiveDate {
  let mut day = now;
  while day.weekday() != Weekday::Tue {
    day = day - Days::new(1);
  }
  day
}

pub fn is_weekend(date: NaiveDate) -> bool {
  matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn window_rejects_reversed_bounds() {
    let err = DateWindow::new(d(2018, 4, 24), d(2018, 4, 20)).unwrap_err();
    assert!(matches!(err, Error::InvalidWindow { .. }));
  }

  #[test]
  fn window_days_are_inclusive() {
    let w = DateWindow::new(d(2018, 4, 20), d(2018, 4, 23)).unwrap();
    let days: Vec<_> = w.days().collect();
    assert_eq!(days, vec![d(2018, 4, 20), d(2018, 4, 21), d(2018, 4, 22), d(2018, 4, 23)]);
    assert_eq!(w.len(), 4);
    assert!(w.contains(d(2018, 4, 23)));
    assert!(!w.contains(d(2018, 4, 24)));
  }

  #[test]
  fn tuesday_anchor_walks_backwards() {
    // 2018-04-24 was a Tuesday.
    assert_eq!(previous_tuesday(d(2018, 4, 24)), d(2018, 4, 24));
    assert_eq!(previous_tuesday(d(2018, 4, 27)), d(2018, 4, 24));
    assert_eq!(previous_tuesday(d(2018, 4, 23)), d(2018, 4, 17));
  }

  #[test]
  fn weekends() {
    assert!(is_weekend(d(2018, 4, 21)));
    assert!(is_weekend(d(2018, 4, 22)));
    assert!(!is_weekend(d(2018, 4, 20)));
  }
}
