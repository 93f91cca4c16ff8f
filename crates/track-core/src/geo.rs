//! Geodesic calculations on a spherical Earth
//!
//! All public functions take and return degrees unless stated otherwise.
//! Distances are kilometers, except [`lagged_distances`] which reports meters
//! because that is the unit trajectory summaries are published in.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Equatorial Earth radius in kilometers (WGS84 semi-major axis)
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Convert degrees to radians
pub fn to_radians(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Convert radians to degrees
pub fn to_degrees(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Smallest angular separation between two bearings, in `[0, 180]`.
pub fn circular_difference(x: f64, y: f64) -> f64 {
    180.0 - (((x - y).abs()) - 180.0).abs()
}

/// Great-circle distance between two points using the haversine formula.
///
/// Returns kilometers on a sphere of the given radius.
pub fn great_circle_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64, radius_km: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let delta_phi = to_radians(lat2 - lat1);
    let delta_lambda = to_radians(lon2 - lon1);

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    radius_km * c
}

/// Haversine distance in kilometers with the default Earth radius
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    great_circle_distance(a.lon, a.lat, b.lon, b.lat, EARTH_RADIUS_KM)
}

/// Project a point along an initial bearing for the given distance.
///
/// Returns `(lon, lat)` in degrees, longitude normalized to `[-180, 180)`.
pub fn destination_point(
    lon1: f64,
    lat1: f64,
    bearing_deg: f64,
    distance_km: f64,
    radius_km: f64,
) -> (f64, f64) {
    let phi1 = to_radians(lat1);
    let lambda1 = to_radians(lon1);
    let theta = to_radians(bearing_deg);
    let delta = distance_km / radius_km;

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos())
        .clamp(-1.0, 1.0)
        .asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon = (to_degrees(lambda2) + 540.0).rem_euclid(360.0) - 180.0;
    (lon, to_degrees(phi2))
}

/// Initial bearing from the first point toward the second, in `[0, 360)`.
pub fn initial_bearing(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let delta_lambda = to_radians(lon2 - lon1);

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    to_degrees(y.atan2(x)).rem_euclid(360.0)
}

/// Distance in meters from each point to the one before it.
///
/// The first element is always `None`; an empty input yields an empty output.
pub fn lagged_distances(points: &[GeoPoint]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(points.len());
    if points.is_empty() {
        return out;
    }

    out.push(None);
    out.extend(
        points
            .windows(2)
            .map(|w| Some(haversine_km(&w[0], &w[1]) * 1000.0)),
    );
    out
}

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Check that the coordinates are finite and in range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine distance in kilometers
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }

    /// Initial bearing toward another point in degrees
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        initial_bearing(self.lon, self.lat, other.lon, other.lat)
    }

    /// Point reached after travelling `distance_km` along `bearing_deg`
    pub fn destination(&self, bearing_deg: f64, distance_km: f64) -> GeoPoint {
        let (lon, lat) = destination_point(self.lon, self.lat, bearing_deg, distance_km, EARTH_RADIUS_KM);
        GeoPoint::new(lon, lat)
    }
}

// ============================================================================
// TESTS
// ============================================================================
