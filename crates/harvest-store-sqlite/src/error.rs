//! Error type for `harvest-store-sqlite`.

use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// A run would write over history that is already stored.
  #[error("already synced: {0}")]
  AlreadySynced(String),

  /// A parent row the run depends on is missing.
  #[error("referential integrity violation: {0}")]
  ReferentialIntegrity(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Smuggle a store error out of a `Connection::call` closure.
pub(crate) fn abort(err: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(own) => *own,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      tokio_rusqlite::Error::Rusqlite(e) => Error::from(e),
      other => Error::Database(other),
    }
  }
}

impl From<rusqlite::Error> for Error {
  /// Uniqueness violations can only come from fact rows (every other insert
  /// is get-or-insert), so they mean the run overlaps stored history.
  fn from(err: rusqlite::Error) -> Self {
    if let rusqlite::Error::SqliteFailure(ffi_err, msg) = &err {
      let detail = msg.clone().unwrap_or_else(|| ffi_err.to_string());
      match ffi_err.extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
          return Error::AlreadySynced(detail);
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Error::ReferentialIntegrity(detail),
        _ => {}
      }
    }
    Error::Database(tokio_rusqlite::Error::Rusqlite(err))
  }
}

impl From<Error> for harvest_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::AlreadySynced(msg) => harvest_core::Error::AlreadySynced(msg),
      Error::ReferentialIntegrity(msg) => harvest_core::Error::ReferentialIntegrityViolation(msg),
      other => harvest_core::Error::Store(Box::new(other)),
    }
  }
}
