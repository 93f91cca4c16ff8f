//! # smooth-tracks
//!
//! Command line entry point: reads observations as JSON, smooths every track
//! with the adaptive Metropolis sampler and writes trajectory rows as JSON.
//!
//! Environment:
//! - `TRACK_INPUT` / `TRACK_OUTPUT`: input and output files (stdin/stdout when unset)
//! - `TRACK_METRICS_OUTPUT`: file receiving Prometheus metrics after the run
//! - `TRACK_*` smoother settings, see `SmootherConfig::from_env`

mod io;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use track_sampler::MetropolisSampler;
use track_smoother::{SmootherConfig, TrackSmoother};
use track_telemetry::MetricsCollector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting track smoother v{}", env!("CARGO_PKG_VERSION"));

    let config = SmootherConfig::from_env()?;
    info!("Configuration loaded");
    info!("   Interval: {} ({})", config.interval, config.probability);
    info!("   Model: {:?}", config.model);
    info!("   Failure policy: {}", config.failure_policy);
    match &config.output_dir {
        Some(dir) => info!("   Fits saved to: {}", dir.display()),
        None => info!("   Fit persistence disabled"),
    }

    let input = env_path("TRACK_INPUT");
    let output = env_path("TRACK_OUTPUT");
    let metrics_output = env_path("TRACK_METRICS_OUTPUT");

    let metrics = Arc::new(MetricsCollector::new()?);
    let smoother = TrackSmoother::new(config, Arc::new(MetropolisSampler::new()))
        .with_metrics(metrics.clone());

    // Sampling is CPU bound and parallelizes chains itself
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let observations = io::load_observations(input.as_deref())?;
        info!("Loaded {} observations", observations.len());
        Ok(smoother.run(observations)?)
    })
    .await??;

    for failure in &result.failures {
        warn!("Track {} was not smoothed: {}", failure.id, failure.message);
    }

    io::store_rows(output.as_deref(), &result.rows)?;
    info!("Wrote {} rows", result.rows.len());

    if let Some(path) = metrics_output {
        std::fs::write(&path, metrics.export()?)?;
        info!("Metrics written to {}", path.display());
    }

    Ok(())
}

/// Initialize logging with tracing
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,track_smoother=debug"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
