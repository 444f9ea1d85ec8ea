//! Semi-join benchmark runner.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use semijoin_bench::{render_json, render_table, Args, BenchmarkDriver};

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "semijoin_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let json = args.json;
    let config = args.into_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        records = config.number_of_records,
        chunk = config.chunk,
        selectivities = ?config.selectivities,
        engines = ?config.engines,
        warmup = config.warmup_iterations,
        iterations = config.measurement_iterations,
        timing = ?config.timing,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    let mode = config.mode;
    let unit = config.time_unit;
    let driver = BenchmarkDriver::new(config)?;
    let summaries = driver.run_suite();

    if json {
        println!("{}", render_json(&summaries, mode, unit)?);
    } else {
        println!("{}", render_table(&summaries, mode, unit));
    }

    let failed = summaries.iter().filter(|s| s.is_failed()).count();
    if failed > 0 {
        tracing::error!(failed, "some benchmarks had failed iterations");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
