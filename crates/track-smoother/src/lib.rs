//! # Track Smoother - Inference Driver
//!
//! Turns raw telemetry fixes into smoothed trajectories:
//! - Groups observations into tracks and drops tracks too short to model
//! - Fits a movement model to each track through an injected [`Sampler`]
//! - Optionally persists every fit
//! - Summarizes posterior draws into one row per timestamp
//!
//! Tracks are fitted one at a time in order of first appearance. The sampler
//! may run its chains in parallel, so tracks are never fitted concurrently.

pub mod config;
pub mod error;

pub use config::{FailurePolicy, ModelVariant, SmootherConfig};
pub use error::{SmootherError, SmootherResult};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use track_core::{group_tracks, Observation, Track, TrackId, TrajectoryRow, MIN_TRACK_OBSERVATIONS};
use track_model::{CrwModel, DataBundle, MovementModel, MultiStateCrwModel};
use track_sampler::{Fit, Sampler};
use track_summary::{summarize_track, CredibleLevel};
use track_telemetry::MetricsCollector;
use tracing::{debug, info, warn};

/// Split R-hat above which a fit is reported as unconverged
pub const RHAT_WARNING_THRESHOLD: f64 = 1.1;

/// Label used for the joint multi-state fit in errors and persisted files
pub const JOINT_FIT_LABEL: &str = "multistate";

/// A track whose fit failed during an isolating run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFailure {
    pub id: TrackId,
    pub message: String,
}

/// Result of a smoothing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothingOutput {
    /// Rows in track processing order, then timestamp order
    pub rows: Vec<TrajectoryRow>,
    pub warnings: Vec<String>,
    /// Tracks dropped for having too few observations
    pub excluded: Vec<TrackId>,
    /// Tracks skipped after a failed fit
    pub failures: Vec<TrackFailure>,
}

/// Warning naming every excluded track, or `None` when nothing was excluded
pub fn exclusion_warning(excluded: &[TrackId]) -> Option<String> {
    match excluded {
        [] => None,
        [id] => Some(format!(
            "Track {id} has fewer than {MIN_TRACK_OBSERVATIONS} observations and was excluded"
        )),
        ids => {
            let names: Vec<&str> = ids.iter().map(TrackId::as_str).collect();
            Some(format!(
                "Tracks {} have fewer than {MIN_TRACK_OBSERVATIONS} observations and were excluded",
                names.join(", ")
            ))
        }
    }
}

/// File name for a persisted fit
///
/// Track IDs come from input data, so path separators and dot-only names are
/// replaced to keep every fit a direct child of the output directory.
pub fn fit_file_name(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        return format!("{}.json", "_".repeat(stem.len().max(1)));
    }
    format!("{stem}.json")
}

/// Inference driver
pub struct TrackSmoother {
    config: SmootherConfig,
    sampler: Arc<dyn Sampler>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl TrackSmoother {
    pub fn new(config: SmootherConfig, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            config,
            sampler,
            metrics: None,
        }
    }

    /// Record run metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Smooth every track in `observations`
    pub fn run(&self, observations: Vec<Observation>) -> SmootherResult<SmoothingOutput> {
        if observations.is_empty() {
            return Err(SmootherError::invalid_input("no data provided"));
        }
        let level = self.config.validate()?;

        let (tracks, short): (Vec<Track>, Vec<Track>) = group_tracks(observations)
            .into_iter()
            .partition(Track::is_modellable);
        let excluded: Vec<TrackId> = short.into_iter().map(|t| t.id).collect();

        let mut output = SmoothingOutput {
            excluded,
            ..Default::default()
        };
        if let Some(warning) = exclusion_warning(&output.excluded) {
            warn!("{}", warning);
            output.warnings.push(warning);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_excluded(output.excluded.len());
        }

        info!(
            "Smoothing {} tracks with {} ({} {} intervals, sampler {})",
            tracks.len(),
            match self.config.model {
                ModelVariant::Crw => "crw".to_string(),
                ModelVariant::MultiState { states } => format!("{states}-state crw"),
            },
            self.config.interval,
            level.value(),
            self.sampler.name()
        );

        let per_track = match self.config.model {
            ModelVariant::Crw => self.smooth_individually(&tracks, level, &mut output.failures)?,
            ModelVariant::MultiState { states } => {
                self.smooth_jointly(&tracks, states, level, &mut output.failures)?
            }
        };
        output.rows = per_track.concat();

        info!(
            "Smoothing finished: {} rows, {} excluded, {} failed",
            output.rows.len(),
            output.excluded.len(),
            output.failures.len()
        );
        Ok(output)
    }

    fn smooth_individually(
        &self,
        tracks: &[Track],
        level: CredibleLevel,
        failures: &mut Vec<TrackFailure>,
    ) -> SmootherResult<Vec<Vec<TrajectoryRow>>> {
        let mut results = Vec::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            match self.smooth_track(track, level) {
                Ok(rows) => {
                    info!("Track {} smoothed ({}/{})", track.id, i + 1, tracks.len());
                    results.push(rows);
                }
                Err(err) => self.handle_failure(std::slice::from_ref(&track.id), err, failures)?,
            }
        }
        Ok(results)
    }

    fn smooth_track(&self, track: &Track, level: CredibleLevel) -> SmootherResult<Vec<TrajectoryRow>> {
        let label = track.id.to_string();
        let data = DataBundle::from_track(track).map_err(|source| SmootherError::Model {
            id: label.clone(),
            source,
        })?;
        let model = CrwModel::new(self.config.sigma_rate);

        let fit = self.sample(&label, &model, &data)?;
        self.persist(&fit, &label)?;
        self.check_convergence(&label, &fit);

        let mut draws = fit.locations;
        let [lon, lat] = data.decenter([0.0, 0.0]);
        draws.translate(lon, lat);
        let rows = summarize_track(&track.id, &track.timestamps(), &draws, self.config.interval, level)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_rows(rows.len());
        }
        Ok(rows)
    }

    fn smooth_jointly(
        &self,
        tracks: &[Track],
        states: usize,
        level: CredibleLevel,
        failures: &mut Vec<TrackFailure>,
    ) -> SmootherResult<Vec<Vec<TrajectoryRow>>> {
        if tracks.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<TrackId> = tracks.iter().map(|t| t.id.clone()).collect();

        let data = match DataBundle::from_tracks(tracks, states) {
            Ok(data) => data,
            Err(source) => {
                let err = SmootherError::Model {
                    id: JOINT_FIT_LABEL.to_string(),
                    source,
                };
                self.handle_failure(&ids, err, failures)?;
                return Ok(Vec::new());
            }
        };
        let model = MultiStateCrwModel::new(states).with_sigma_rate(self.config.sigma_rate);

        let fit = match self
            .sample(JOINT_FIT_LABEL, &model, &data)
            .and_then(|fit| self.persist(&fit, JOINT_FIT_LABEL).map(|_| fit))
        {
            Ok(fit) => fit,
            Err(err) => {
                self.handle_failure(&ids, err, failures)?;
                return Ok(Vec::new());
            }
        };
        self.check_convergence(JOINT_FIT_LABEL, &fit);

        let mut draws = fit.locations;
        let [lon, lat] = data.decenter([0.0, 0.0]);
        draws.translate(lon, lat);

        let mut results = Vec::with_capacity(tracks.len());
        for (track, range) in tracks.iter().zip(data.track_ranges()) {
            let slice = draws.slice_timesteps(range)?;
            let rows = summarize_track(&track.id, &track.timestamps(), &slice, self.config.interval, level)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_rows(rows.len());
            }
            info!("Track {} smoothed ({} rows)", track.id, rows.len());
            results.push(rows);
        }
        Ok(results)
    }

    fn sample(&self, label: &str, model: &dyn MovementModel, data: &DataBundle) -> SmootherResult<Fit> {
        debug!("Fitting {} to {} ({} observations)", model.name(), label, data.n);
        let started = Instant::now();
        let result = self.sampler.sample(model, data, &self.config.sampler_options);
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(fit) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_fit(label, elapsed, &fit.acceptance_rates);
                }
                debug!("Fitted {} in {:.2}s ({} draws)", label, elapsed, fit.n_draws());
                Ok(fit)
            }
            Err(source) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(elapsed);
                }
                Err(SmootherError::Sampler {
                    id: label.to_string(),
                    source,
                })
            }
        }
    }

    fn persist(&self, fit: &Fit, label: &str) -> SmootherResult<()> {
        let Some(dir) = &self.config.output_dir else {
            return Ok(());
        };
        let path = dir.join(fit_file_name(label));
        fit.save(&path)
            .map_err(|source| SmootherError::Persistence { path, source })
    }

    fn check_convergence(&self, label: &str, fit: &Fit) {
        for name in &fit.parameter_names {
            if let Some(rhat) = fit.split_rhat(name) {
                if rhat > RHAT_WARNING_THRESHOLD {
                    warn!("Fit for {} may not have converged: R-hat of {} is {:.3}", label, name, rhat);
                }
            }
        }
    }

    fn handle_failure(
        &self,
        ids: &[TrackId],
        err: SmootherError,
        failures: &mut Vec<TrackFailure>,
    ) -> SmootherResult<()> {
        if self.config.failure_policy == FailurePolicy::Abort || !err.is_per_track() {
            return Err(err);
        }

        warn!("Skipping after failed fit: {}", err);
        let message = err.to_string();
        failures.extend(ids.iter().map(|id| TrackFailure {
            id: id.clone(),
            message: message.clone(),
        }));
        Ok(())
    }
}
