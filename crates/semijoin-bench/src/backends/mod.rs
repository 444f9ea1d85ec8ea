//! Storage backends under test.
//!
//! Every engine is driven through [`StoreAdapter`], so the benchmark driver
//! never needs to know which engine it is timing.

pub mod columnar;
pub mod kv;

use std::path::Path;

use serde::Serialize;

use crate::config::StoreOptions;
use crate::error::Result;
use crate::fixtures::{Order, User};

pub use columnar::ColumnarAdapter;
pub use kv::KeyValueAdapter;

/// Counters collected while loading a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub users_written: usize,
    pub orders_written: usize,
    pub user_flushes: usize,
    pub order_flushes: usize,
}

/// A storage engine that can bulk-load the benchmark dataset and answer the
/// semi-join filter.
pub trait StoreAdapter: Sized {
    /// Short engine name, also the store directory name.
    const NAME: &'static str;

    /// Row type yielded by [`StoreAdapter::filter_semi_join`].
    type Row;

    /// Open or create the store inside `dir`, batching writes every `chunk`
    /// rows.
    fn open(dir: &Path, chunk: usize, options: &StoreOptions) -> Result<Self>;

    /// Load users and orders, replacing anything loaded before.
    ///
    /// Every batch is applied before this returns.
    fn load(&mut self, users: &[User], orders: &[Order]) -> Result<LoadStats>;

    /// Stream every order whose user exists into `sink`, each at most once.
    ///
    /// Returns the number of rows streamed.
    fn filter_semi_join<F>(&mut self, sink: F) -> Result<u64>
    where
        F: FnMut(Self::Row);

    /// Close the store and remove its on-disk state.
    fn destroy(self) -> Result<()>;
}
