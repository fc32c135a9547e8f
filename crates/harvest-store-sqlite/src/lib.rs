//! SQLite backends for the Harvest market-data and positioning stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each store owns one database file and
//! commits each sync run as a single transaction.

mod encode;
mod market;
mod positioning;
mod schema;

pub mod error;

pub use error::{Error, Result};
pub use market::SqliteMarketStore;
pub use positioning::SqlitePositioningStore;

#[cfg(test)]
mod tests;
