//! Result aggregation and output.

use std::time::Duration;

use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::config::{Mode, TimeUnit};
use crate::error::{Error, Result};
use crate::harness::RunOutcome;

/// Samples collected for one engine at one selectivity.
#[derive(Debug, Clone)]
pub struct Summary {
    engine: String,
    selectivity: f64,
    samples: Vec<Duration>,
    rows: Option<u64>,
    failures: Vec<String>,
}

impl Summary {
    pub fn new(engine: impl Into<String>, selectivity: f64) -> Self {
        Self {
            engine: engine.into(),
            selectivity,
            samples: Vec::new(),
            rows: None,
            failures: Vec::new(),
        }
    }

    /// Record a successful iteration.
    pub fn record(&mut self, outcome: &RunOutcome) {
        self.samples.push(outcome.elapsed);
        self.rows = Some(outcome.rows);
    }

    /// Record a failed iteration. Failures never contribute a sample.
    pub fn record_failure(&mut self, error: &Error) {
        self.failures.push(error.to_string());
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn selectivity(&self) -> f64 {
        self.selectivity
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Semi-join rows yielded by the last successful iteration.
    pub fn rows(&self) -> Option<u64> {
        self.rows
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<Duration>() / self.samples.len() as u32)
    }

    pub fn min(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    /// Sample standard deviation; zero with fewer than two samples.
    pub fn stddev(&self) -> Option<Duration> {
        let mean = self.mean()?.as_secs_f64();
        if self.samples.len() < 2 {
            return Some(Duration::ZERO);
        }
        let variance = self
            .samples
            .iter()
            .map(|s| (s.as_secs_f64() - mean).powi(2))
            .sum::<f64>()
            / (self.samples.len() - 1) as f64;
        Some(Duration::from_secs_f64(variance.sqrt()))
    }

    /// Flatten into a serializable record expressed in `unit`.
    pub fn to_record(&self, mode: Mode, unit: TimeUnit) -> SummaryRecord {
        let convert = |d: Duration| unit.convert(d);
        SummaryRecord {
            engine: self.engine.clone(),
            selectivity: self.selectivity,
            mode,
            unit,
            samples: self.samples.iter().copied().map(convert).collect(),
            mean: self.mean().map(convert),
            stddev: self.stddev().map(convert),
            min: self.min().map(convert),
            max: self.max().map(convert),
            rows: self.rows,
            failures: self.failures.clone(),
        }
    }
}

/// Serializable view of a [`Summary`].
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub engine: String,
    pub selectivity: f64,
    pub mode: Mode,
    pub unit: TimeUnit,
    pub samples: Vec<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub rows: Option<u64>,
    pub failures: Vec<String>,
}

fn format_score(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "FAILED".to_string())
}

/// Error column: stddev, failure count, or both.
fn error_cell(stddev: Option<f64>, failed: &str) -> String {
    match (stddev, failed.is_empty()) {
        (Some(v), true) => format!("± {:.3}", v),
        (Some(v), false) => format!("± {:.3} ({})", v, failed),
        (None, _) => failed.to_string(),
    }
}

/// Render summaries as a text table.
///
/// Average-time mode prints one row per configuration; single-shot mode
/// prints one row per measured iteration.
pub fn render_table(summaries: &[Summary], mode: Mode, unit: TimeUnit) -> String {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Benchmark"),
        Cell::new("selectivity"),
        Cell::new("Mode"),
        Cell::new("Cnt"),
        Cell::new("Score"),
        Cell::new("Error"),
        Cell::new("Rows"),
        Cell::new("Units"),
    ]);

    let mode_name = match mode {
        Mode::AverageTime => "avgt",
        Mode::SingleShot => "ss",
    };
    let rows_cell = |s: &Summary| {
        s.rows()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    for summary in summaries {
        let record = summary.to_record(mode, unit);
        let failed = if summary.is_failed() {
            format!("{} failed", summary.failures().len())
        } else {
            String::new()
        };

        match mode {
            Mode::AverageTime => {
                table.add_row(vec![
                    Cell::new(summary.engine()),
                    Cell::new(summary.selectivity()),
                    Cell::new(mode_name),
                    Cell::new(summary.samples().len()),
                    Cell::new(format_score(record.mean)),
                    Cell::new(error_cell(record.stddev, &failed)),
                    Cell::new(rows_cell(summary)),
                    Cell::new(unit.suffix()),
                ]);
            }
            Mode::SingleShot => {
                if record.samples.is_empty() {
                    table.add_row(vec![
                        Cell::new(summary.engine()),
                        Cell::new(summary.selectivity()),
                        Cell::new(mode_name),
                        Cell::new(0),
                        Cell::new(format_score(None)),
                        Cell::new(&failed),
                        Cell::new(rows_cell(summary)),
                        Cell::new(unit.suffix()),
                    ]);
                }
                for (i, sample) in record.samples.iter().enumerate() {
                    table.add_row(vec![
                        Cell::new(summary.engine()),
                        Cell::new(summary.selectivity()),
                        Cell::new(mode_name),
                        Cell::new(i + 1),
                        Cell::new(format_score(Some(*sample))),
                        Cell::new(&failed),
                        Cell::new(rows_cell(summary)),
                        Cell::new(unit.suffix()),
                    ]);
                }
            }
        }
    }

    table.to_string()
}

/// Render summaries as pretty-printed JSON.
pub fn render_json(summaries: &[Summary], mode: Mode, unit: TimeUnit) -> Result<String> {
    let records: Vec<SummaryRecord> = summaries.iter().map(|s| s.to_record(mode, unit)).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}
