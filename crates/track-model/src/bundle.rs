//! Per-fit data bundle handed to the sampler

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use track_core::Track;

/// Model inputs for one fit, with locations centered on their mean.
///
/// A single-track fit has one entry in `track_starts`; a joint multi-state fit
/// stacks several tracks and records where each one begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBundle {
    /// Centered observed locations `[lon, lat]`
    pub locations: Vec<[f64; 2]>,
    /// Measurement standard errors `[lon_sd, lat_sd]`
    pub std_errors: Vec<[f64; 2]>,
    /// Interpolation weight between the previous and current latent location
    pub weights: Vec<f64>,
    /// Total number of observations
    pub n: usize,
    /// Mean location subtracted from the observations
    pub center: [f64; 2],
    /// Transition design rows, intercept first
    pub covariates: Vec<Vec<f64>>,
    /// First row index of each track
    pub track_starts: Vec<usize>,
    /// Number of behavioural states
    pub n_states: usize,
}

impl DataBundle {
    /// Bundle a single track for the correlated random walk
    pub fn from_track(track: &Track) -> ModelResult<Self> {
        Self::from_tracks(std::slice::from_ref(track), 1)
    }

    /// Bundle several tracks for a joint fit with `n_states` behavioural states
    pub fn from_tracks(tracks: &[Track], n_states: usize) -> ModelResult<Self> {
        if n_states == 0 {
            return Err(ModelError::InvalidConfig(
                "at least one behavioural state is required".to_string(),
            ));
        }

        let n: usize = tracks.iter().map(Track::len).sum();
        let mut locations = Vec::with_capacity(n);
        let mut std_errors = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);
        let mut covariates = Vec::with_capacity(n);
        let mut track_starts = Vec::with_capacity(tracks.len());
        let n_covariates = tracks
            .iter()
            .flat_map(|t| t.observations.first())
            .map(|o| o.covariates.len())
            .next()
            .unwrap_or(0);

        for track in tracks {
            if track.is_empty() {
                return Err(ModelError::EmptyTrack(track.id.to_string()));
            }
            track_starts.push(locations.len());

            for (i, obs) in track.observations.iter().enumerate() {
                let row = locations.len();

                if !obs.lon.is_finite() || !obs.lat.is_finite() {
                    return Err(ModelError::invalid_data(row, "non-finite location"));
                }
                if !(obs.lon_sd.is_finite() && obs.lon_sd > 0.0)
                    || !(obs.lat_sd.is_finite() && obs.lat_sd > 0.0)
                {
                    return Err(ModelError::invalid_data(
                        row,
                        "standard errors must be positive and finite",
                    ));
                }

                // The first observation sits on its own latent location
                let weight = if i == 0 {
                    1.0
                } else {
                    obs.interval_weight.unwrap_or(1.0)
                };
                if !(0.0..=1.0).contains(&weight) {
                    return Err(ModelError::invalid_data(
                        row,
                        format!("interval weight {weight} outside [0, 1]"),
                    ));
                }

                let design = if n_states > 1 {
                    if obs.covariates.len() != n_covariates {
                        return Err(ModelError::CovariateMismatch {
                            row,
                            expected: n_covariates,
                            actual: obs.covariates.len(),
                        });
                    }
                    std::iter::once(1.0).chain(obs.covariates.iter().copied()).collect()
                } else {
                    vec![1.0]
                };

                locations.push([obs.lon, obs.lat]);
                std_errors.push([obs.lon_sd, obs.lat_sd]);
                weights.push(weight);
                covariates.push(design);
            }
        }

        let center = if n == 0 {
            [0.0, 0.0]
        } else {
            let sum = locations
                .iter()
                .fold([0.0, 0.0], |acc, l| [acc[0] + l[0], acc[1] + l[1]]);
            [sum[0] / n as f64, sum[1] / n as f64]
        };
        for l in &mut locations {
            l[0] -= center[0];
            l[1] -= center[1];
        }

        Ok(Self {
            locations,
            std_errors,
            weights,
            n,
            center,
            covariates,
            track_starts,
            n_states,
        })
    }

    /// Row range of every track in the bundle
    pub fn track_ranges(&self) -> Vec<Range<usize>> {
        self.track_starts
            .iter()
            .enumerate()
            .map(|(k, &start)| {
                let end = self.track_starts.get(k + 1).copied().unwrap_or(self.n);
                start..end
            })
            .collect()
    }

    /// Width of each transition design row
    pub fn n_covariates(&self) -> usize {
        self.covariates.first().map_or(1, Vec::len)
    }

    /// Undo centering for a single location
    pub fn decenter(&self, location: [f64; 2]) -> [f64; 2] {
        [location[0] + self.center[0], location[1] + self.center[1]]
    }
}
