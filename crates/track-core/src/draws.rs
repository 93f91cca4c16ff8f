//! Posterior draws of latent locations with explicit axes

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Coordinate axis of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinate {
    Lon,
    Lat,
}

impl Coordinate {
    pub const ALL: [Coordinate; 2] = [Coordinate::Lon, Coordinate::Lat];

    /// Position of this coordinate inside a `[lon, lat]` pair
    pub fn index(self) -> usize {
        match self {
            Coordinate::Lon => 0,
            Coordinate::Lat => 1,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Lon => write!(f, "lon"),
            Coordinate::Lat => write!(f, "lat"),
        }
    }
}

/// Ensemble of posterior location draws indexed by (draw, timestep, coordinate).
///
/// Storage is draw-major: all timesteps of draw 0, then draw 1, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawsEnsemble {
    n_draws: usize,
    n_timesteps: usize,
    values: Vec<[f64; 2]>,
}

impl DrawsEnsemble {
    /// Zero-filled ensemble
    pub fn new(n_draws: usize, n_timesteps: usize) -> Self {
        Self {
            n_draws,
            n_timesteps,
            values: vec![[0.0; 2]; n_draws * n_timesteps],
        }
    }

    /// Build from one location vector per draw
    pub fn from_draws(draws: Vec<Vec<[f64; 2]>>) -> CoreResult<Self> {
        let n_draws = draws.len();
        let n_timesteps = draws.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(n_draws * n_timesteps);

        for draw in draws {
            if draw.len() != n_timesteps {
                return Err(CoreError::Shape {
                    expected: n_timesteps,
                    actual: draw.len(),
                });
            }
            values.extend(draw);
        }

        Ok(Self {
            n_draws,
            n_timesteps,
            values,
        })
    }

    /// Build by evaluating `f(draw, timestep)` for every cell
    pub fn from_fn(n_draws: usize, n_timesteps: usize, mut f: impl FnMut(usize, usize) -> [f64; 2]) -> Self {
        let mut values = Vec::with_capacity(n_draws * n_timesteps);
        for d in 0..n_draws {
            for t in 0..n_timesteps {
                values.push(f(d, t));
            }
        }
        Self {
            n_draws,
            n_timesteps,
            values,
        }
    }

    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    pub fn n_timesteps(&self) -> usize {
        self.n_timesteps
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, draw: usize, timestep: usize, coord: Coordinate) -> f64 {
        self.values[self.offset(draw, timestep)][coord.index()]
    }

    pub fn set(&mut self, draw: usize, timestep: usize, coord: Coordinate, value: f64) {
        let offset = self.offset(draw, timestep);
        self.values[offset][coord.index()] = value;
    }

    /// All draws for one (timestep, coordinate) cell
    pub fn column(&self, timestep: usize, coord: Coordinate) -> Vec<f64> {
        (0..self.n_draws)
            .map(|d| self.get(d, timestep, coord))
            .collect()
    }

    /// Shift every location by a fixed offset
    pub fn translate(&mut self, lon: f64, lat: f64) {
        for v in &mut self.values {
            v[0] += lon;
            v[1] += lat;
        }
    }

    /// Copy out a contiguous range of timesteps across all draws
    pub fn slice_timesteps(&self, range: Range<usize>) -> CoreResult<Self> {
        if range.start > range.end || range.end > self.n_timesteps {
            return Err(CoreError::Shape {
                expected: self.n_timesteps,
                actual: range.end,
            });
        }

        let width = range.end - range.start;
        Ok(Self::from_fn(self.n_draws, width, |d, t| {
            self.values[self.offset(d, range.start + t)]
        }))
    }

    fn offset(&self, draw: usize, timestep: usize) -> usize {
        debug_assert!(draw < self.n_draws && timestep < self.n_timesteps);
        draw * self.n_timesteps + timestep
    }
}
