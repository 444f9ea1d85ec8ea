//! Columnar backend (DuckDB).
//!
//! Rows are ingested through the appender and flushed every `chunk` rows.
//! The filter is a native `SEMI JOIN`.

use std::path::{Path, PathBuf};

use duckdb::{params, Connection};
use tracing::debug;

use crate::config::StoreOptions;
use crate::error::{Phase, Result};
use crate::fixtures::{Order, User};
use crate::harness::delete_directory;

use super::{LoadStats, StoreAdapter};

/// Database file name inside the store directory.
const DB_FILE: &str = "bench.duckdb";

const SCHEMA: &str = r#"
DROP TABLE IF EXISTS orders;
DROP TABLE IF EXISTS users;

CREATE TABLE users (
    user_id INTEGER PRIMARY KEY,
    username VARCHAR(50) NOT NULL,
    email VARCHAR(100) NOT NULL
);

CREATE TABLE orders (
    order_id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    order_date TIMESTAMP NOT NULL,
    amount DECIMAL(10, 2) NOT NULL
);
"#;

const SEMI_JOIN_QUERY: &str = r#"
SELECT o.order_id, o.user_id, o.order_date, CAST(o.amount AS DOUBLE)
FROM orders o
SEMI JOIN users u ON u.user_id = o.user_id
"#;

/// DuckDB store for the semi-join benchmark.
pub struct ColumnarAdapter {
    conn: Connection,
    dir: PathBuf,
    chunk: usize,
}

impl ColumnarAdapter {
    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(DB_FILE)
    }
}

impl StoreAdapter for ColumnarAdapter {
    const NAME: &'static str = "duckdb";

    type Row = Order;

    fn open(dir: &Path, chunk: usize, options: &StoreOptions) -> Result<Self> {
        std::fs::create_dir_all(dir).setup(format!("create {}", dir.display()))?;
        let conn = Connection::open(dir.join(DB_FILE)).setup("open duckdb")?;

        let mut settings = String::new();
        if let Some(threads) = options.duckdb_threads {
            settings.push_str(&format!("SET threads = {};", threads));
        }
        if let Some(limit) = &options.duckdb_memory_limit {
            settings.push_str(&format!("SET memory_limit = '{}';", limit.replace('\'', "''")));
        }
        if !settings.is_empty() {
            conn.execute_batch(&settings).setup("configure duckdb")?;
        }

        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
            chunk,
        })
    }

    fn load(&mut self, users: &[User], orders: &[Order]) -> Result<LoadStats> {
        let mut stats = LoadStats::default();

        self.conn.execute_batch(SCHEMA).load("create tables")?;

        {
            let mut appender = self.conn.appender("users").load("users appender")?;
            for batch in users.chunks(self.chunk) {
                for user in batch {
                    appender
                        .append_row(params![user.user_id, &user.username, &user.email])
                        .load("append user")?;
                }
                appender.flush().load("flush users")?;
                stats.users_written += batch.len();
                stats.user_flushes += 1;
                debug!(rows = stats.users_written, "flushed users");
            }
        }

        {
            let mut appender = self.conn.appender("orders").load("orders appender")?;
            for batch in orders.chunks(self.chunk) {
                for order in batch {
                    appender
                        .append_row(params![
                            order.order_id,
                            order.user_id,
                            order.order_date,
                            order.amount
                        ])
                        .load("append order")?;
                }
                appender.flush().load("flush orders")?;
                stats.orders_written += batch.len();
                stats.order_flushes += 1;
                debug!(rows = stats.orders_written, "flushed orders");
            }
        }

        Ok(stats)
    }

    fn filter_semi_join<F>(&mut self, mut sink: F) -> Result<u64>
    where
        F: FnMut(Order),
    {
        let mut stmt = self.conn.prepare(SEMI_JOIN_QUERY).query("prepare semi-join")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Order {
                    order_id: row.get(0)?,
                    user_id: row.get(1)?,
                    order_date: row.get(2)?,
                    amount: row.get(3)?,
                })
            })
            .query("execute semi-join")?;

        let mut count = 0u64;
        for row in rows {
            sink(row.query("read semi-join row")?);
            count += 1;
        }
        Ok(count)
    }

    fn destroy(self) -> Result<()> {
        let Self { conn, dir, .. } = self;
        drop(conn);
        delete_directory(&dir)
    }
}
