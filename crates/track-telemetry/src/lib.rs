//! # Track Telemetry - Metrics
//!
//! Prometheus metrics for the track smoothing pipeline:
//! - Tracks fitted, excluded and failed
//! - Fit duration
//! - Sampler acceptance rates per track
//! - Summary rows produced

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use tracing::info;

/// Metrics collector for a smoothing run
pub struct MetricsCollector {
    registry: Registry,

    tracks_fitted: IntCounter,
    tracks_excluded: IntCounter,
    fit_failures: IntCounter,
    fit_duration: Histogram,
    summary_rows: IntCounter,
    acceptance_rate: GaugeVec,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let tracks_fitted = IntCounter::new(
            "track_smoother_tracks_fitted_total",
            "Tracks with a completed posterior fit",
        )?;
        registry.register(Box::new(tracks_fitted.clone()))?;

        let tracks_excluded = IntCounter::new(
            "track_smoother_tracks_excluded_total",
            "Tracks excluded for having too few observations",
        )?;
        registry.register(Box::new(tracks_excluded.clone()))?;

        let fit_failures = IntCounter::new(
            "track_smoother_fit_failures_total",
            "Sampler invocations that returned an error",
        )?;
        registry.register(Box::new(fit_failures.clone()))?;

        let fit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "track_smoother_fit_duration_seconds",
                "Wall time of one sampler invocation",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(fit_duration.clone()))?;

        let summary_rows = IntCounter::new(
            "track_smoother_summary_rows_total",
            "Trajectory summary rows produced",
        )?;
        registry.register(Box::new(summary_rows.clone()))?;

        let acceptance_rate = GaugeVec::new(
            Opts::new(
                "track_smoother_acceptance_rate",
                "Mean post-warmup acceptance rate of the last fit",
            ),
            &["track_id"],
        )?;
        registry.register(Box::new(acceptance_rate.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            tracks_fitted,
            tracks_excluded,
            fit_failures,
            fit_duration,
            summary_rows,
            acceptance_rate,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    // ========================================================================
    // FIT METRICS
    // ========================================================================

    /// Record a completed fit
    pub fn record_fit(&self, track_id: &str, duration_secs: f64, acceptance_rates: &[f64]) {
        self.tracks_fitted.inc();
        self.fit_duration.observe(duration_secs);
        if !acceptance_rates.is_empty() {
            let mean = acceptance_rates.iter().sum::<f64>() / acceptance_rates.len() as f64;
            self.acceptance_rate.with_label_values(&[track_id]).set(mean);
        }
    }

    /// Record a failed sampler invocation
    pub fn record_failure(&self, duration_secs: f64) {
        self.fit_failures.inc();
        self.fit_duration.observe(duration_secs);
    }

    /// Record tracks dropped before fitting
    pub fn record_excluded(&self, count: usize) {
        self.tracks_excluded.inc_by(count as u64);
    }

    // ========================================================================
    // SUMMARY METRICS
    // ========================================================================

    /// Record summary rows produced for one track
    pub fn record_rows(&self, count: usize) {
        self.summary_rows.inc_by(count as u64);
    }

    pub fn tracks_fitted(&self) -> u64 {
        self.tracks_fitted.get()
    }

    pub fn fit_failures(&self) -> u64 {
        self.fit_failures.get()
    }

    pub fn tracks_excluded(&self) -> u64 {
        self.tracks_excluded.get()
    }

    pub fn summary_rows(&self) -> u64 {
        self.summary_rows.get()
    }
}

// ============================================================================
// TESTS
// ============================================================================
