//! Key-value backend (sled).
//!
//! sled has no join operator, so the semi-join is done at write time: the
//! user ids of each chunk of orders are checked against the user store and
//! only orders with an existing user go into that chunk's write batch.
//! Reading back is a plain forward scan of the order store.
//!
//! sled has no native multi-get either. [`multi_get`] gathers a chunk's
//! lookups into one call, but inside it every key is still a separate point
//! lookup, so the existence check costs one `get` per order.
//!
//! Users and orders live in two separate sled databases, `users/` and
//! `orders/`, under the store directory.

use std::path::{Path, PathBuf};

use sled::{Batch, Db, IVec, Mode, Tree};
use tracing::debug;

use crate::config::StoreOptions;
use crate::error::{Phase, Result};
use crate::fixtures::{Order, User};
use crate::harness::delete_directories;

use super::{LoadStats, StoreAdapter};

const USERS_DIR: &str = "users";
const ORDERS_DIR: &str = "orders";

/// Order-store key for an order id.
///
/// Big-endian with the sign bit flipped, so byte order matches numeric order
/// and a forward scan yields orders by ascending id.
pub fn order_key(order_id: i32) -> [u8; 4] {
    ((order_id as u32) ^ 0x8000_0000).to_be_bytes()
}

/// User-store key for a user id.
pub fn user_key(user_id: i32) -> String {
    user_id.to_string()
}

/// Look up every key of a chunk. Results are aligned with `keys`.
///
/// One point lookup per key.
pub fn multi_get<K: AsRef<[u8]>>(tree: &Tree, keys: &[K]) -> sled::Result<Vec<Option<IVec>>> {
    keys.iter().map(|key| tree.get(key)).collect()
}

fn sled_config(path: &Path, options: &StoreOptions) -> sled::Config {
    // No periodic fsync: the benchmark measures throughput, not crash safety.
    sled::Config::new()
        .path(path)
        .cache_capacity(options.kv_cache_capacity)
        .use_compression(options.kv_compression)
        .mode(Mode::HighThroughput)
        .flush_every_ms(None)
}

/// sled store for the semi-join benchmark.
pub struct KeyValueAdapter {
    users: Db,
    orders: Db,
    users_path: PathBuf,
    orders_path: PathBuf,
    chunk: usize,
}

impl KeyValueAdapter {
    /// Fetch a stored order record by its order id.
    pub fn get_order(&self, order_id: i32) -> Result<Option<IVec>> {
        self.orders.get(order_key(order_id)).query("get order")
    }

    /// Number of users in the user store.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of orders in the order store.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn load_users(&self, users: &[User], stats: &mut LoadStats) -> Result<()> {
        for chunk in users.chunks(self.chunk) {
            let mut batch = Batch::default();
            for user in chunk {
                batch.insert(user_key(user.user_id).as_bytes(), user.to_record().as_bytes());
            }
            self.users.apply_batch(batch).load("write users")?;
            stats.users_written += chunk.len();
            stats.user_flushes += 1;
            debug!(rows = stats.users_written, "flushed users");
        }
        Ok(())
    }

    fn load_orders(&self, orders: &[Order], stats: &mut LoadStats) -> Result<()> {
        for chunk in orders.chunks(self.chunk) {
            let keys: Vec<String> = chunk.iter().map(|o| user_key(o.user_id)).collect();
            let existing = multi_get(&self.users, &keys).load("look up users")?;

            let mut batch = Batch::default();
            let mut written = 0;
            for (order, user) in chunk.iter().zip(existing) {
                if user.is_some() {
                    batch.insert(&order_key(order.order_id)[..], order.to_record().as_bytes());
                    written += 1;
                }
            }
            self.orders.apply_batch(batch).load("write orders")?;
            stats.orders_written += written;
            stats.order_flushes += 1;
            debug!(checked = chunk.len(), written, "flushed orders");
        }
        Ok(())
    }
}

impl StoreAdapter for KeyValueAdapter {
    const NAME: &'static str = "sled";

    type Row = IVec;

    fn open(dir: &Path, chunk: usize, options: &StoreOptions) -> Result<Self> {
        let users_path = dir.join(USERS_DIR);
        let orders_path = dir.join(ORDERS_DIR);

        let users = sled_config(&users_path, options)
            .open()
            .setup(format!("open {}", users_path.display()))?;
        let orders = sled_config(&orders_path, options)
            .open()
            .setup(format!("open {}", orders_path.display()))?;

        Ok(Self {
            users,
            orders,
            users_path,
            orders_path,
            chunk,
        })
    }

    fn load(&mut self, users: &[User], orders: &[Order]) -> Result<LoadStats> {
        let mut stats = LoadStats::default();

        self.users.clear().load("clear users")?;
        self.orders.clear().load("clear orders")?;

        self.load_users(users, &mut stats)?;
        self.load_orders(orders, &mut stats)?;

        Ok(stats)
    }

    fn filter_semi_join<F>(&mut self, mut sink: F) -> Result<u64>
    where
        F: FnMut(IVec),
    {
        let mut count = 0u64;
        for record in self.orders.iter().values() {
            sink(record.query("scan orders")?);
            count += 1;
        }
        Ok(count)
    }

    fn destroy(self) -> Result<()> {
        let Self {
            users,
            orders,
            users_path,
            orders_path,
            ..
        } = self;
        drop(users);
        drop(orders);

        delete_directories(&[users_path.as_path(), orders_path.as_path()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DatasetGenerator;

    fn open(dir: &Path, chunk: usize) -> KeyValueAdapter {
        let options = StoreOptions {
            kv_cache_capacity: 8 * 1024 * 1024,
            ..Default::default()
        };
        KeyValueAdapter::open(dir, chunk, &options).unwrap()
    }

    fn parse_order_id(record: &[u8]) -> i32 {
        let text = std::str::from_utf8(record).unwrap();
        text.split('|').next().unwrap().parse().unwrap()
    }

    #[test]
    fn test_load_batches_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 10);
        let dataset = DatasetGenerator::new(1).generate(25, 1.0).unwrap();

        let stats = adapter.load(&dataset.users, &dataset.orders).unwrap();

        assert_eq!(stats.user_flushes, 3);
        assert_eq!(stats.order_flushes, 3);
        assert_eq!(stats.users_written, 25);
        assert_eq!(stats.orders_written, 25);
        assert_eq!(adapter.user_count(), 25);
        assert_eq!(adapter.order_count(), 25);
    }

    #[test]
    fn test_order_store_holds_only_matches() {
        for &selectivity in &[1.0, 0.5, 0.0] {
            let dir = tempfile::tempdir().unwrap();
            let mut adapter = open(dir.path(), 100);
            let dataset = DatasetGenerator::new(99).generate(1000, selectivity).unwrap();

            let stats = adapter.load(&dataset.users, &dataset.orders).unwrap();

            assert_eq!(stats.orders_written, dataset.matching);
            assert_eq!(adapter.order_count(), dataset.matching);
            let streamed = adapter.filter_semi_join(|_| {}).unwrap();
            assert_eq!(streamed as usize, dataset.matching);
        }
    }

    #[test]
    fn test_filtered_orders_retrievable_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 64);
        let dataset = DatasetGenerator::new(5).generate(300, 0.5).unwrap();
        adapter.load(&dataset.users, &dataset.orders).unwrap();

        let mut records = Vec::new();
        adapter.filter_semi_join(|r| records.push(r)).unwrap();
        assert_eq!(records.len(), 150);

        for record in &records {
            let id = parse_order_id(record);
            let stored = adapter.get_order(id).unwrap().unwrap();
            assert_eq!(&stored, record);
        }

        let expected = dataset
            .orders
            .iter()
            .find(|o| o.user_id > 300)
            .unwrap();
        assert!(adapter.get_order(expected.order_id).unwrap().is_none());
    }

    #[test]
    fn test_scan_yields_ascending_order_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 7);
        let dataset = DatasetGenerator::new(21).generate(100, 0.5).unwrap();
        adapter.load(&dataset.users, &dataset.orders).unwrap();

        let mut ids = Vec::new();
        adapter
            .filter_semi_join(|r| ids.push(parse_order_id(&r)))
            .unwrap();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 10);
        let dataset = DatasetGenerator::new(3).generate(5, 1.0).unwrap();
        adapter.load(&dataset.users, &dataset.orders).unwrap();

        let user = adapter.users.get(user_key(3)).unwrap().unwrap();
        assert_eq!(&user[..], b"3|user_3|user_3@example.com");

        let order = &dataset.orders[0];
        let stored = adapter.get_order(order.order_id).unwrap().unwrap();
        assert_eq!(&stored[..], order.to_record().as_bytes());
    }

    #[test]
    fn test_reload_replaces_previous_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 10);
        let mut gen = DatasetGenerator::new(6);

        let first = gen.generate(50, 1.0).unwrap();
        adapter.load(&first.users, &first.orders).unwrap();
        let second = gen.generate(20, 0.0).unwrap();
        adapter.load(&second.users, &second.orders).unwrap();

        assert_eq!(adapter.user_count(), 20);
        assert_eq!(adapter.order_count(), 0);
    }

    #[test]
    fn test_multi_get_aligned_with_keys() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = open(dir.path(), 10);
        adapter.users.insert("1", "one").unwrap();
        adapter.users.insert("3", "three").unwrap();

        let hits = multi_get(&adapter.users, &["1", "2", "3"]).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].as_deref(), Some(&b"one"[..]));
        assert!(hits[1].is_none());
        assert_eq!(hits[2].as_deref(), Some(&b"three"[..]));
    }

    #[test]
    fn test_multi_get_unsorted_and_repeated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = open(dir.path(), 10);
        let dataset = DatasetGenerator::new(8).generate(20, 1.0).unwrap();
        adapter.load(&dataset.users, &[]).unwrap();

        let keys: Vec<String> = [17, 3, 999, 3, 20, -4]
            .iter()
            .map(|&id| user_key(id))
            .collect();
        let hits = multi_get(&adapter.users, &keys).unwrap();

        let found: Vec<bool> = hits.iter().map(Option::is_some).collect();
        assert_eq!(found, vec![true, true, false, true, true, false]);
        assert_eq!(hits[1], hits[3]);
        assert_eq!(hits[0].as_deref(), Some(&b"17|user_17|user_17@example.com"[..]));
    }

    #[test]
    fn test_order_key_preserves_numeric_order() {
        assert!(order_key(-1) < order_key(0));
        assert!(order_key(1) < order_key(2));
        assert!(order_key(255) < order_key(256));
        assert!(order_key(i32::MAX - 1) < order_key(i32::MAX));
    }

    #[test]
    fn test_destroy_removes_both_stores() {
        let root = tempfile::tempdir().unwrap();
        let mut adapter = open(root.path(), 10);
        let dataset = DatasetGenerator::new(1).generate(10, 0.5).unwrap();
        adapter.load(&dataset.users, &dataset.orders).unwrap();
        assert!(root.path().join(USERS_DIR).exists());
        assert!(root.path().join(ORDERS_DIR).exists());

        adapter.destroy().unwrap();

        assert!(!root.path().join(USERS_DIR).exists());
        assert!(!root.path().join(ORDERS_DIR).exists());
    }
}
