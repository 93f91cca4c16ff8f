//! Turns posterior location draws into per-timestamp trajectory rows

use crate::error::{SummaryError, SummaryResult};
use crate::intervals::{quantile, sorted, CredibleLevel, IntervalMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use track_core::{lagged_distances, Coordinate, DrawsEnsemble, GeoPoint, TrackId, TrajectoryRow};
use tracing::debug;

/// Long-format summary of one coordinate at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSummary {
    pub timestamp: DateTime<Utc>,
    pub coordinate: Coordinate,
    pub mean: f64,
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Summarize one coordinate of the ensemble at every timestep
pub fn summarize_coordinate(
    ensemble: &DrawsEnsemble,
    timestamps: &[DateTime<Utc>],
    coord: Coordinate,
    method: IntervalMethod,
    level: CredibleLevel,
) -> SummaryResult<Vec<CoordinateSummary>> {
    if ensemble.n_draws() == 0 {
        return Err(SummaryError::EmptyDraws);
    }
    if timestamps.len() != ensemble.n_timesteps() {
        return Err(SummaryError::invalid_input(format!(
            "{} timestamps for {} timesteps of draws",
            timestamps.len(),
            ensemble.n_timesteps()
        )));
    }

    timestamps
        .iter()
        .enumerate()
        .map(|(t, timestamp)| {
            let draws = ensemble.column(t, coord);
            let interval = method.interval(&draws, level.value())?;
            let mean = draws.iter().sum::<f64>() / draws.len() as f64;
            let median = quantile(&sorted(&draws), 0.5).ok_or(SummaryError::EmptyDraws)?;
            Ok(CoordinateSummary {
                timestamp: *timestamp,
                coordinate: coord,
                mean,
                median,
                lower: interval.lower,
                upper: interval.upper,
            })
        })
        .collect()
}

/// Join longitude and latitude summaries into one row per timestamp.
///
/// Both inputs must cover the same timestamps; rows come out in ascending
/// timestamp order.
pub fn join_wide(
    lon: &[CoordinateSummary],
    lat: &[CoordinateSummary],
    id: &TrackId,
) -> SummaryResult<Vec<TrajectoryRow>> {
    let mismatch = || SummaryError::ShapeMismatch {
        lon: lon.len(),
        lat: lat.len(),
    };
    if lon.len() != lat.len() {
        return Err(mismatch());
    }

    let mut lon: Vec<&CoordinateSummary> = lon.iter().collect();
    let mut lat: Vec<&CoordinateSummary> = lat.iter().collect();
    lon.sort_by_key(|s| s.timestamp);
    lat.sort_by_key(|s| s.timestamp);

    lon.into_iter()
        .zip(lat)
        .map(|(x, y)| {
            if x.timestamp != y.timestamp {
                return Err(mismatch());
            }
            Ok(TrajectoryRow {
                timestamp: x.timestamp,
                id: id.clone(),
                lon_mean: x.mean,
                lon_median: x.median,
                lon_lower: x.lower,
                lon_upper: x.upper,
                lat_mean: y.mean,
                lat_median: y.median,
                lat_lower: y.lower,
                lat_upper: y.upper,
                distance_m: None,
                speed_m_per_min: None,
            })
        })
        .collect()
}

/// Fill distance and speed from the mean trajectory of a single track's rows
pub fn attach_movement(rows: &mut [TrajectoryRow]) {
    let points: Vec<GeoPoint> = rows.iter().map(TrajectoryRow::mean_position).collect();
    let distances = lagged_distances(&points);

    for i in 0..rows.len() {
        let distance = distances[i];
        let speed = match (i.checked_sub(1), distance) {
            (Some(prev), Some(d)) => {
                let elapsed = rows[i].timestamp - rows[prev].timestamp;
                let minutes = elapsed.num_milliseconds() as f64 / 60_000.0;
                (minutes > 0.0).then(|| d / minutes)
            }
            _ => None,
        };
        rows[i].distance_m = distance;
        rows[i].speed_m_per_min = speed;
    }
}

/// Summarize absolute location draws of one track into trajectory rows
pub fn summarize_track(
    id: &TrackId,
    timestamps: &[DateTime<Utc>],
    ensemble: &DrawsEnsemble,
    method: IntervalMethod,
    level: CredibleLevel,
) -> SummaryResult<Vec<TrajectoryRow>> {
    let lon = summarize_coordinate(ensemble, timestamps, Coordinate::Lon, method, level)?;
    let lat = summarize_coordinate(ensemble, timestamps, Coordinate::Lat, method, level)?;
    let mut rows = join_wide(&lon, &lat, id)?;
    attach_movement(&mut rows);

    debug!(
        "Summarized {} ({} timesteps, {} draws, {} {})",
        id,
        rows.len(),
        ensemble.n_draws(),
        method,
        level.value()
    );
    Ok(rows)
}
