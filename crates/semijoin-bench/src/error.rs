//! Benchmark error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the storage engines under test.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Key-value engine error.
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Columnar engine error.
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Benchmark run errors.
///
/// `Setup`, `Load`, `Query` and `RowCount` abort the current run. `Cleanup`
/// is reported but never replaces a measurement.
#[derive(Debug, Error)]
pub enum Error {
    /// A store could not be created or opened.
    #[error("setup error: {context}: {source}")]
    Setup {
        context: String,
        #[source]
        source: EngineError,
    },

    /// A write or append failed while loading data.
    #[error("load error: {context}: {source}")]
    Load {
        context: String,
        #[source]
        source: EngineError,
    },

    /// The filter query or result iteration failed.
    #[error("query error: {context}: {source}")]
    Query {
        context: String,
        #[source]
        source: EngineError,
    },

    /// The filter completed but yielded the wrong number of rows.
    #[error("query error: {store} semi-join yielded {rows} rows, expected {expected}")]
    RowCount {
        store: &'static str,
        rows: u64,
        expected: usize,
    },

    /// On-disk state could not be removed.
    #[error("cleanup error: {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid benchmark configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Report serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tags an engine result with the benchmark phase it failed in.
pub trait Phase<T> {
    fn setup(self, context: impl Into<String>) -> Result<T>;
    fn load(self, context: impl Into<String>) -> Result<T>;
    fn query(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<EngineError>> Phase<T> for std::result::Result<T, E> {
    fn setup(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Setup {
            context: context.into(),
            source: e.into(),
        })
    }

    fn load(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Load {
            context: context.into(),
            source: e.into(),
        })
    }

    fn query(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Query {
            context: context.into(),
            source: e.into(),
        })
    }
}
