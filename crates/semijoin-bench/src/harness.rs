//! Benchmark driver.
//!
//! A run recreates the store directory, generates a fresh dataset, loads it,
//! runs the semi-join filter and drains every row into a [`Blackhole`]. The
//! clock covers load, filter and drain, plus teardown when
//! [`TimingScope::IncludeTeardown`] is configured.

use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::backends::{ColumnarAdapter, KeyValueAdapter, LoadStats, StoreAdapter};
use crate::config::{validate_selectivity, BenchConfig, Engine, TimingScope};
use crate::error::{Error, Result};
use crate::fixtures::DatasetGenerator;
use crate::report::Summary;

/// Remove `path` and everything under it, children before parents.
///
/// A missing path is not an error.
pub fn delete_directory(path: &Path) -> Result<()> {
    let cleanup = |source| Error::Cleanup {
        path: path.to_path_buf(),
        source,
    };

    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(cleanup(e)),
    };

    if !metadata.is_dir() {
        return std::fs::remove_file(path).map_err(cleanup);
    }

    for entry in std::fs::read_dir(path).map_err(cleanup)? {
        let entry = entry.map_err(cleanup)?;
        delete_directory(&entry.path())?;
    }
    std::fs::remove_dir(path).map_err(cleanup)
}

/// Remove every path in `paths`, attempting all of them even after a
/// failure. Returns the first error.
pub fn delete_directories(paths: &[&Path]) -> Result<()> {
    let mut first = None;
    for path in paths {
        if let Err(e) = delete_directory(path) {
            warn!(path = %path.display(), error = %e, "failed to remove directory");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Remove leftovers of an earlier run. Failures are setup errors.
fn clear_stale(dir: &Path) -> Result<()> {
    delete_directory(dir).map_err(|e| match e {
        Error::Cleanup { path, source } => Error::Setup {
            context: format!("remove stale {}", path.display()),
            source: source.into(),
        },
        other => other,
    })
}

/// Removes a directory when dropped, whether or not the run succeeded.
pub struct DirGuard {
    path: PathBuf,
}

impl DirGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(e) = delete_directory(&self.path) {
            warn!(error = %e, "failed to remove store directory");
        }
    }
}

/// Sink that consumes rows so the optimizer cannot discard the work.
#[derive(Debug, Default)]
pub struct Blackhole {
    consumed: u64,
}

impl Blackhole {
    pub fn consume<T>(&mut self, value: T) {
        black_box(value);
        self.consumed += 1;
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

/// Result of one successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Wall-clock time of the timed scope.
    pub elapsed: Duration,

    /// Rows yielded by the semi-join.
    pub rows: u64,

    /// Rows the generator made match.
    pub expected_rows: usize,

    /// Load counters.
    pub load: LoadStats,
}

/// Runs benchmark iterations against any [`StoreAdapter`].
pub struct BenchmarkDriver {
    config: BenchConfig,
}

impl BenchmarkDriver {
    /// Create a driver for a validated configuration.
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Directory holding the store for adapter `S`.
    pub fn store_dir<S: StoreAdapter>(&self) -> PathBuf {
        self.config.data_dir.join(S::NAME)
    }

    fn generator(&self) -> DatasetGenerator {
        match self.config.seed {
            Some(seed) => DatasetGenerator::new(seed),
            None => DatasetGenerator::from_entropy(),
        }
    }

    /// Execute one run at the given selectivity.
    pub fn run<S: StoreAdapter>(&self, selectivity: f64) -> Result<RunOutcome> {
        validate_selectivity(selectivity)?;

        let dir = self.store_dir::<S>();
        clear_stale(&dir)?;
        let _guard = DirGuard::new(&dir);

        let dataset = self
            .generator()
            .generate(self.config.number_of_records, selectivity)?;

        let mut store = S::open(&dir, self.config.chunk, &self.config.store)?;
        let mut sink = Blackhole::default();

        let started = Instant::now();
        let load = store.load(&dataset.users, &dataset.orders)?;
        let streamed = store.filter_semi_join(|row| sink.consume(row))?;
        let (elapsed, teardown) = match self.config.timing {
            TimingScope::LoadAndQuery => {
                let elapsed = started.elapsed();
                (elapsed, store.destroy())
            }
            TimingScope::IncludeTeardown => {
                let teardown = store.destroy();
                (started.elapsed(), teardown)
            }
        };

        if let Err(e) = teardown {
            warn!(store = S::NAME, error = %e, "store teardown failed");
        }

        let rows = sink.consumed();
        if rows != streamed || rows as usize != dataset.matching {
            return Err(Error::RowCount {
                store: S::NAME,
                rows,
                expected: dataset.matching,
            });
        }

        Ok(RunOutcome {
            elapsed,
            rows,
            expected_rows: dataset.matching,
            load,
        })
    }

    /// Warm up, then measure adapter `S` at one selectivity.
    pub fn measure<S: StoreAdapter>(&self, selectivity: f64) -> Summary {
        for iteration in 1..=self.config.warmup_iterations {
            match self.run::<S>(selectivity) {
                Ok(outcome) => info!(
                    store = S::NAME,
                    selectivity,
                    iteration,
                    elapsed = ?outcome.elapsed,
                    "warmup iteration"
                ),
                Err(e) => warn!(store = S::NAME, selectivity, iteration, error = %e, "warmup iteration failed"),
            }
        }

        let mut summary = Summary::new(S::NAME, selectivity);
        for iteration in 1..=self.config.measurement_iterations {
            match self.run::<S>(selectivity) {
                Ok(outcome) => {
                    info!(
                        store = S::NAME,
                        selectivity,
                        iteration,
                        rows = outcome.rows,
                        elapsed = ?outcome.elapsed,
                        "measurement iteration"
                    );
                    summary.record(&outcome);
                }
                Err(e) => {
                    error!(store = S::NAME, selectivity, iteration, error = %e, "measurement iteration failed");
                    summary.record_failure(&e);
                }
            }
        }
        summary
    }

    /// Measure every configured engine at every configured selectivity.
    pub fn run_suite(&self) -> Vec<Summary> {
        let mut summaries = Vec::new();
        for &engine in &self.config.engines {
            for &selectivity in &self.config.selectivities {
                info!(%engine, selectivity, "starting benchmark");
                let summary = match engine {
                    Engine::Duckdb => self.measure::<ColumnarAdapter>(selectivity),
                    Engine::Sled => self.measure::<KeyValueAdapter>(selectivity),
                };
                summaries.push(summary);
            }
        }
        summaries
    }
}
