//! First-order correlated random walk with heavy-tailed observation error
//!
//! Latent locations follow
//! `x[t] ~ N(x[t-1] + γ (x[t-1] - x[t-2]), diag(σ_lon², σ_lat²))`
//! and each observation is Student-t around the weighted interpolation
//! `(1 - w[t]) x[t-1] + w[t] x[t]` with its own standard errors.

use crate::bundle::DataBundle;
use crate::distributions::{
    exponential_log_pdf, inv_logit, log_inv_logit_jacobian, normal_log_pdf, student_t_log_pdf,
};
use crate::{DEFAULT_SIGMA_RATE, MovementModel, OBSERVATION_DF};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Correlated random walk model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrwModel {
    /// Rate of the exponential prior on both process noise scales
    pub sigma_rate: f64,
}

impl Default for CrwModel {
    fn default() -> Self {
        Self {
            sigma_rate: DEFAULT_SIGMA_RATE,
        }
    }
}

impl CrwModel {
    pub fn new(sigma_rate: f64) -> Self {
        Self { sigma_rate }
    }

    fn sigma_offset(data: &DataBundle) -> usize {
        2 * data.n
    }
}

impl MovementModel for CrwModel {
    fn name(&self) -> &str {
        "crw"
    }

    fn dimension(&self, data: &DataBundle) -> usize {
        2 * data.n + 3
    }

    fn parameter_names(&self, _data: &DataBundle) -> Vec<String> {
        vec!["sigma_lon".into(), "sigma_lat".into(), "gamma".into()]
    }

    fn initial_point(&self, data: &DataBundle) -> Vec<f64> {
        let mut theta: Vec<f64> = data.locations.iter().flatten().copied().collect();
        let log_sigma = (1.0 / self.sigma_rate).ln();
        theta.extend([log_sigma, log_sigma, 0.0]);
        theta
    }

    fn initial_step_sizes(&self, data: &DataBundle) -> Vec<f64> {
        let mut steps = location_step_sizes(data);
        steps.extend([0.3, 0.3, 0.5]);
        steps
    }

    fn log_density(&self, data: &DataBundle, theta: &[f64]) -> f64 {
        let offset = Self::sigma_offset(data);
        let x = &theta[..offset];
        let Some((sigma, mut lp)) = sigma_prior(&theta[offset..offset + 2], self.sigma_rate) else {
            return f64::NEG_INFINITY;
        };

        let u = theta[offset + 2];
        let gamma = inv_logit(u);
        lp += log_inv_logit_jacobian(u);

        for range in data.track_ranges() {
            lp += first_step_log_density(x, &range, sigma);
            for t in (range.start + 2)..range.end {
                lp += step_log_density(x, t, gamma, sigma);
            }
        }

        lp += observation_log_likelihood(data, x);
        if lp.is_nan() {
            return f64::NEG_INFINITY;
        }
        lp
    }

    fn scalar_parameters(&self, data: &DataBundle, theta: &[f64]) -> Vec<f64> {
        let offset = Self::sigma_offset(data);
        vec![
            theta[offset].exp(),
            theta[offset + 1].exp(),
            inv_logit(theta[offset + 2]),
        ]
    }
}

// ============================================================================
// SHARED TERMS
// ============================================================================

#[inline]
pub(crate) fn location(x: &[f64], t: usize) -> [f64; 2] {
    [x[2 * t], x[2 * t + 1]]
}

/// Measurement standard errors as proposal scales for the latent locations
pub(crate) fn location_step_sizes(data: &DataBundle) -> Vec<f64> {
    data.std_errors.iter().flatten().copied().collect()
}

/// Exponential prior on `σ = exp(log_sigma)` including the log Jacobian.
///
/// Returns `None` when a scale is not a usable positive number.
pub(crate) fn sigma_prior(log_sigma: &[f64], rate: f64) -> Option<([f64; 2], f64)> {
    let sigma = [log_sigma[0].exp(), log_sigma[1].exp()];
    if sigma.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return None;
    }

    let lp = (0..2)
        .map(|c| exponential_log_pdf(sigma[c], rate) + log_sigma[c])
        .sum();
    Some((sigma, lp))
}

/// Uncorrelated first move of a track, `x[s+1] ~ N(x[s], σ)`
pub(crate) fn first_step_log_density(x: &[f64], range: &Range<usize>, sigma: [f64; 2]) -> f64 {
    if range.end - range.start < 2 {
        return 0.0;
    }
    let prev = location(x, range.start);
    let cur = location(x, range.start + 1);
    (0..2).map(|c| normal_log_pdf(cur[c], prev[c], sigma[c])).sum()
}

/// Correlated move into step `t` given correlation `gamma`
pub(crate) fn step_log_density(x: &[f64], t: usize, gamma: f64, sigma: [f64; 2]) -> f64 {
    let prev2 = location(x, t - 2);
    let prev = location(x, t - 1);
    let cur = location(x, t);

    (0..2)
        .map(|c| {
            let predicted = prev[c] + gamma * (prev[c] - prev2[c]);
            normal_log_pdf(cur[c], predicted, sigma[c])
        })
        .sum()
}

/// Student-t likelihood of every observation given the latent locations
pub(crate) fn observation_log_likelihood(data: &DataBundle, x: &[f64]) -> f64 {
    let mut lp = 0.0;
    for range in data.track_ranges() {
        for t in range.clone() {
            let cur = location(x, t);
            let expected = if t == range.start {
                cur
            } else {
                let prev = location(x, t - 1);
                let w = data.weights[t];
                [
                    (1.0 - w) * prev[0] + w * cur[0],
                    (1.0 - w) * prev[1] + w * cur[1],
                ]
            };

            for c in 0..2 {
                lp += student_t_log_pdf(
                    data.locations[t][c],
                    OBSERVATION_DF,
                    expected[c],
                    data.std_errors[t][c],
                );
            }
        }
    }
    lp
}
