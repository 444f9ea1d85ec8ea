//! Benchmark configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::error::{Error, Result};

/// Default number of users (and orders) generated per run.
pub const DEFAULT_NUMBER_OF_RECORDS: usize = 1_000_000;

/// Default rows per flush / batch.
pub const DEFAULT_CHUNK: usize = 10_000;

/// Default warmup iterations per configuration.
pub const DEFAULT_WARMUP_ITERATIONS: usize = 2;

/// Default measured iterations per configuration.
pub const DEFAULT_MEASUREMENT_ITERATIONS: usize = 15;

/// Default root directory for on-disk stores.
pub const DEFAULT_DATA_DIR: &str = "/tmp/semijoin-bench";

/// Selectivities enumerated when none are given.
pub const DEFAULT_SELECTIVITIES: [f64; 3] = [1.0, 0.5, 0.0];

/// Default key-value page cache (256 MB).
pub const DEFAULT_KV_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// Largest record count for which real ids `1..=n` and synthetic ids
/// `i32::MAX - k` cannot overlap.
pub const MAX_RECORDS: usize = (i32::MAX / 2) as usize;

/// Storage engine under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Columnar engine (DuckDB).
    Duckdb,
    /// Ordered key-value engine (sled).
    Sled,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Duckdb => write!(f, "duckdb"),
            Engine::Sled => write!(f, "sled"),
        }
    }
}

/// Unit used when reporting elapsed times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum TimeUnit {
    #[value(name = "s")]
    Seconds,
    #[value(name = "ms")]
    Milliseconds,
    #[value(name = "us")]
    Microseconds,
}

impl TimeUnit {
    /// Express a duration in this unit.
    pub fn convert(&self, duration: Duration) -> f64 {
        match self {
            TimeUnit::Seconds => duration.as_secs_f64(),
            TimeUnit::Milliseconds => duration.as_nanos() as f64 / 1_000_000.0,
            TimeUnit::Microseconds => duration.as_nanos() as f64 / 1_000.0,
        }
    }

    /// Short suffix for display.
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
        }
    }
}

/// How samples are aggregated in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Mode {
    /// Mean of all measured iterations.
    #[value(name = "avgt")]
    AverageTime,
    /// Every measured iteration reported individually.
    #[value(name = "ss")]
    SingleShot,
}

/// Which part of a run the clock covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TimingScope {
    /// Load, filter and drain.
    #[default]
    LoadAndQuery,
    /// Load, filter, drain and store teardown.
    IncludeTeardown,
}

/// Engine-specific knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// sled page cache capacity in bytes.
    pub kv_cache_capacity: u64,

    /// Enable sled's zstd compression.
    pub kv_compression: bool,

    /// DuckDB worker threads. None keeps the engine default.
    pub duckdb_threads: Option<usize>,

    /// DuckDB memory limit, e.g. "2GB". None keeps the engine default.
    pub duckdb_memory_limit: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            kv_cache_capacity: DEFAULT_KV_CACHE_BYTES,
            kv_compression: false,
            duckdb_threads: None,
            duckdb_memory_limit: None,
        }
    }
}

/// Immutable configuration for a benchmark suite.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Users generated per run; the same number of orders is generated.
    pub number_of_records: usize,

    /// Rows per flush (columnar) or per write batch (key-value).
    pub chunk: usize,

    /// Fractions of orders referencing an existing user.
    pub selectivities: Vec<f64>,

    /// Engines to benchmark.
    pub engines: Vec<Engine>,

    /// Unrecorded iterations before measuring.
    pub warmup_iterations: usize,

    /// Recorded iterations.
    pub measurement_iterations: usize,

    /// Reporting unit.
    pub time_unit: TimeUnit,

    /// Aggregation mode.
    pub mode: Mode,

    /// Root directory under which each engine gets its own store directory.
    pub data_dir: PathBuf,

    /// Whether teardown is inside the timed block.
    pub timing: TimingScope,

    /// Fixed seed for the dataset generator. None draws fresh entropy.
    pub seed: Option<u64>,

    /// Engine-specific options.
    pub store: StoreOptions,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            number_of_records: DEFAULT_NUMBER_OF_RECORDS,
            chunk: DEFAULT_CHUNK,
            selectivities: DEFAULT_SELECTIVITIES.to_vec(),
            engines: vec![Engine::Duckdb, Engine::Sled],
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            measurement_iterations: DEFAULT_MEASUREMENT_ITERATIONS,
            time_unit: TimeUnit::Seconds,
            mode: Mode::AverageTime,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timing: TimingScope::LoadAndQuery,
            seed: None,
            store: StoreOptions::default(),
        }
    }
}

impl BenchConfig {
    /// Create a configuration rooted at the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the number of records.
    pub fn with_records(mut self, n: usize) -> Self {
        self.number_of_records = n;
        self
    }

    /// Set the chunk size.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Set the selectivities to enumerate.
    pub fn with_selectivities(mut self, selectivities: impl Into<Vec<f64>>) -> Self {
        self.selectivities = selectivities.into();
        self
    }

    /// Set the engines to run.
    pub fn with_engines(mut self, engines: impl Into<Vec<Engine>>) -> Self {
        self.engines = engines.into();
        self
    }

    /// Set warmup and measurement iteration counts.
    pub fn with_iterations(mut self, warmup: usize, measurement: usize) -> Self {
        self.warmup_iterations = warmup;
        self.measurement_iterations = measurement;
        self
    }

    /// Set the reporting unit.
    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    /// Set the aggregation mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the timing scope.
    pub fn with_timing(mut self, timing: TimingScope) -> Self {
        self.timing = timing;
        self
    }

    /// Fix the generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set engine-specific options.
    pub fn with_store_options(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }

    /// Check the configuration before any store is touched.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_records == 0 {
            return Err(Error::Config("number of records must be at least 1".into()));
        }
        if self.number_of_records > MAX_RECORDS {
            return Err(Error::Config(format!(
                "number of records must not exceed {}",
                MAX_RECORDS
            )));
        }
        if self.chunk == 0 {
            return Err(Error::Config("chunk must be at least 1".into()));
        }
        if self.selectivities.is_empty() {
            return Err(Error::Config("at least one selectivity is required".into()));
        }
        for &s in &self.selectivities {
            validate_selectivity(s)?;
        }
        if self.engines.is_empty() {
            return Err(Error::Config("at least one engine is required".into()));
        }
        if self.measurement_iterations == 0 {
            return Err(Error::Config(
                "measurement iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Reject selectivities outside `[0, 1]`.
pub fn validate_selectivity(selectivity: f64) -> Result<()> {
    if !selectivity.is_finite() || !(0.0..=1.0).contains(&selectivity) {
        return Err(Error::Config(format!(
            "selectivity must be within [0, 1], got {}",
            selectivity
        )));
    }
    Ok(())
}

/// Command-line arguments for the benchmark runner.
#[derive(Parser, Debug)]
#[command(name = "semijoin-bench")]
#[command(version, about = "Semi-join filter benchmark: DuckDB vs sled", long_about = None)]
pub struct Args {
    /// Users (and orders) generated per run.
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUMBER_OF_RECORDS)]
    pub records: usize,

    /// Rows per flush or write batch.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK)]
    pub chunk: usize,

    /// Selectivities to enumerate (comma-separated).
    #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_SELECTIVITIES)]
    pub selectivity: Vec<f64>,

    /// Engines to run (comma-separated).
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = [Engine::Duckdb, Engine::Sled])]
    pub engine: Vec<Engine>,

    /// Warmup iterations.
    #[arg(long, default_value_t = DEFAULT_WARMUP_ITERATIONS)]
    pub warmup: usize,

    /// Measured iterations.
    #[arg(short, long, default_value_t = DEFAULT_MEASUREMENT_ITERATIONS)]
    pub iterations: usize,

    /// Reporting unit.
    #[arg(long, value_enum, default_value = "s")]
    pub time_unit: TimeUnit,

    /// Aggregation mode.
    #[arg(long, value_enum, default_value = "avgt")]
    pub mode: Mode,

    /// Root directory for on-disk stores.
    #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Include store teardown in the measured time.
    #[arg(long)]
    pub include_teardown: bool,

    /// Fixed seed for dataset generation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print results as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// sled page cache in megabytes.
    #[arg(long, default_value_t = DEFAULT_KV_CACHE_BYTES / (1024 * 1024))]
    pub kv_cache_mb: u64,

    /// Enable sled compression.
    #[arg(long)]
    pub kv_compression: bool,

    /// DuckDB worker threads.
    #[arg(long)]
    pub duckdb_threads: Option<usize>,

    /// DuckDB memory limit (e.g. "2GB").
    #[arg(long)]
    pub duckdb_memory_limit: Option<String>,
}

impl Args {
    /// Convert command-line arguments to a validated configuration.
    pub fn into_config(self) -> Result<BenchConfig> {
        let timing = if self.include_teardown {
            TimingScope::IncludeTeardown
        } else {
            TimingScope::LoadAndQuery
        };

        let mut engines = self.engine;
        engines.dedup();

        let config = BenchConfig {
            number_of_records: self.records,
            chunk: self.chunk,
            selectivities: self.selectivity,
            engines,
            warmup_iterations: self.warmup,
            measurement_iterations: self.iterations,
            time_unit: self.time_unit,
            mode: self.mode,
            data_dir: self.data_dir,
            timing,
            seed: self.seed,
            store: StoreOptions {
                kv_cache_capacity: self.kv_cache_mb * 1024 * 1024,
                kv_compression: self.kv_compression,
                duckdb_threads: self.duckdb_threads,
                duckdb_memory_limit: self.duckdb_memory_limit,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
