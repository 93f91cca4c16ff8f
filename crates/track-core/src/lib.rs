//! # Track Core
//!
//! Core domain models and types for telemetry track smoothing.
//! This crate provides the observation and summary types shared by the
//! model, sampler, summarizer and driver crates, plus spherical geodesy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod draws;
pub mod error;
pub mod geo;

pub use draws::{Coordinate, DrawsEnsemble};
pub use error::{CoreError, CoreResult};
pub use geo::*;

/// Fewest observations a track needs before it can be modelled
pub const MIN_TRACK_OBSERVATIONS: usize = 3;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Unique identifier for a tracked individual
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// OBSERVATIONS
// ============================================================================

/// A single location estimate derived from telemetry detections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: TrackId,
    pub timestamp: DateTime<Utc>,
    /// Estimated longitude in degrees
    pub lon: f64,
    /// Estimated latitude in degrees
    pub lat: f64,
    /// Standard error of the longitude estimate
    pub lon_sd: f64,
    /// Standard error of the latitude estimate
    pub lat_sd: f64,
    /// Fraction of the sampling interval elapsed at this observation
    #[serde(default)]
    pub interval_weight: Option<f64>,
    /// Behavioural covariates, used only by multi-state models
    #[serde(default)]
    pub covariates: Vec<f64>,
}

impl Observation {
    pub fn new(
        id: impl Into<TrackId>,
        timestamp: DateTime<Utc>,
        lon: f64,
        lat: f64,
        lon_sd: f64,
        lat_sd: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            lon,
            lat,
            lon_sd,
            lat_sd,
            interval_weight: None,
            covariates: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.interval_weight = Some(weight);
        self
    }

    pub fn with_covariates(mut self, covariates: Vec<f64>) -> Self {
        self.covariates = covariates;
        self
    }
}

/// One individual's detection history ordered by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub observations: Vec<Observation>,
}

impl Track {
    /// Create a track, sorting observations by ascending timestamp
    pub fn new(id: impl Into<TrackId>, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.timestamp);
        Self {
            id: id.into(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Whether the track has enough observations to be modelled
    pub fn is_modellable(&self) -> bool {
        self.len() >= MIN_TRACK_OBSERVATIONS
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }
}

/// Group observations into tracks, one per identifier, in order of first appearance
pub fn group_tracks(observations: Vec<Observation>) -> Vec<Track> {
    let mut order: Vec<TrackId> = Vec::new();
    let mut grouped: HashMap<TrackId, Vec<Observation>> = HashMap::new();

    for obs in observations {
        if !grouped.contains_key(&obs.id) {
            order.push(obs.id.clone());
        }
        grouped.entry(obs.id.clone()).or_default().push(obs);
    }

    order
        .into_iter()
        .map(|id| {
            let observations = grouped.remove(&id).unwrap_or_default();
            Track::new(id, observations)
        })
        .collect()
}

// ============================================================================
// SUMMARY ROWS
// ============================================================================

/// Smoothed location summary for one track at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub timestamp: DateTime<Utc>,
    pub id: TrackId,
    pub lon_mean: f64,
    pub lon_median: f64,
    pub lon_lower: f64,
    pub lon_upper: f64,
    pub lat_mean: f64,
    pub lat_median: f64,
    pub lat_lower: f64,
    pub lat_upper: f64,
    /// Meters travelled since the previous row of the same track
    pub distance_m: Option<f64>,
    /// Meters per minute since the previous row of the same track
    pub speed_m_per_min: Option<f64>,
}

impl TrajectoryRow {
    /// Posterior mean location
    pub fn mean_position(&self) -> GeoPoint {
        GeoPoint::new(self.lon_mean, self.lat_mean)
    }
}

// ============================================================================
// TESTS
// ============================================================================
