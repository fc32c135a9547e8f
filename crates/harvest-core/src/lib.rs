//! Core types and pipeline logic for the Harvest market-data loader.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! external data provider and the persistent stores are reached through the
//! [`provider::TimeSeriesProvider`], [`store::MarketStore`] and
//! [`store::PositioningStore`] traits; concrete backends live in their own
//! crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod loader;
pub mod market;
pub mod positioning;
pub mod provider;
pub mod reference;
pub mod report;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
