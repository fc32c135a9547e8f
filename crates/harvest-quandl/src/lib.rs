//! Quandl-compatible HTTP provider for Harvest.
//!
//! Implements [`harvest_core::provider::TimeSeriesProvider`] over the v3
//! dataset endpoint, `GET {base_url}/datasets/{ticker}.json`.

mod client;
mod dataset;

pub mod error;

pub use client::{QuandlClient, QuandlConfig};
pub use dataset::decode_dataset;
pub use error::{Error, Result};
