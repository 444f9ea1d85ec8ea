//! Semi-join filter benchmark.
//!
//! Generates users and orders with a controlled fraction of orders pointing
//! at an existing user, loads them into a store and times how long it takes
//! to keep only the orders whose user exists.
//!
//! # Engines
//!
//! - **duckdb**: columnar store, the filter is a single `SEMI JOIN` query
//! - **sled**: ordered key-value store, orders are filtered against a batched
//!   user lookup while loading and read back with a forward scan

pub mod backends;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod report;

pub use backends::{ColumnarAdapter, KeyValueAdapter, LoadStats, StoreAdapter};
pub use config::{Args, BenchConfig, Engine, Mode, StoreOptions, TimeUnit, TimingScope};
pub use error::{Error, Result};
pub use fixtures::{Dataset, DatasetGenerator, Order, User};
pub use harness::{BenchmarkDriver, Blackhole, RunOutcome};
pub use report::{render_json, render_table, Summary};
