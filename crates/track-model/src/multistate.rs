//! Hidden Markov mixture of correlated random walks
//!
//! Each correlated step is generated under one of `N` behavioural states,
//! each with its own correlation `γ_k`. State switches follow a transition
//! matrix whose off-diagonal log rates are linear in per-row covariates.
//! The state path is marginalized with the forward algorithm, restarted at
//! the beginning of every track in the bundle.

use crate::bundle::DataBundle;
use crate::crw::{
    first_step_log_density, location_step_sizes, observation_log_likelihood, sigma_prior,
    step_log_density,
};
use crate::distributions::{inv_logit, log_inv_logit_jacobian, log_sum_exp, logit, normal_log_pdf};
use crate::{DEFAULT_SIGMA_RATE, MovementModel};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::trace;

/// Multi-state correlated random walk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiStateCrwModel {
    /// Number of behavioural states
    pub n_states: usize,
    /// Rate of the exponential prior on process noise scales
    pub sigma_rate: f64,
    /// Standard deviation of the normal prior on transition coefficients
    pub beta_prior_sd: f64,
}

impl MultiStateCrwModel {
    pub fn new(n_states: usize) -> Self {
        Self {
            n_states,
            sigma_rate: DEFAULT_SIGMA_RATE,
            beta_prior_sd: 2.0,
        }
    }

    pub fn with_sigma_rate(mut self, rate: f64) -> Self {
        self.sigma_rate = rate;
        self
    }

    fn layout(&self, data: &DataBundle) -> Layout {
        let sigma = 2 * data.n;
        let gamma = sigma + 2;
        let beta = gamma + self.n_states;
        let pairs = self.n_states * (self.n_states - 1);
        Layout {
            sigma,
            gamma,
            beta,
            n_covariates: data.n_covariates(),
            end: beta + pairs * data.n_covariates(),
        }
    }

    fn gammas(&self, theta: &[f64], layout: &Layout) -> Vec<f64> {
        theta[layout.gamma..layout.gamma + self.n_states]
            .iter()
            .map(|&u| inv_logit(u))
            .collect()
    }

    /// Row-normalized log transition matrix for design row `z`
    fn log_transition(&self, beta: &[f64], z: &[f64]) -> Vec<Vec<f64>> {
        let n = self.n_states;
        let k = z.len();
        let mut pair = 0;
        let mut matrix = Vec::with_capacity(n);

        for i in 0..n {
            let mut row = vec![0.0; n];
            for (j, entry) in row.iter_mut().enumerate() {
                if i == j {
                    continue;
                }
                let coef = &beta[pair * k..(pair + 1) * k];
                *entry = coef.iter().zip(z).map(|(b, x)| b * x).sum();
                pair += 1;
            }
            let norm = log_sum_exp(&row);
            row.iter_mut().for_each(|v| *v -= norm);
            matrix.push(row);
        }
        matrix
    }

    /// Forward recursion over one track; returns log α for each state-bearing row
    fn forward(
        &self,
        data: &DataBundle,
        x: &[f64],
        range: &Range<usize>,
        sigma: [f64; 2],
        gammas: &[f64],
        beta: &[f64],
    ) -> Vec<Vec<f64>> {
        let n = self.n_states;
        let mut alphas = Vec::new();
        if range.end - range.start < 3 {
            return alphas;
        }

        let log_initial = -(n as f64).ln();
        let first = range.start + 2;
        alphas.push(
            gammas
                .iter()
                .map(|&g| log_initial + step_log_density(x, first, g, sigma))
                .collect::<Vec<f64>>(),
        );

        let mut terms = vec![0.0; n];
        for t in (first + 1)..range.end {
            let log_gamma = self.log_transition(beta, &data.covariates[t]);
            let prev = &alphas[alphas.len() - 1];
            let next: Vec<f64> = (0..n)
                .map(|k| {
                    for j in 0..n {
                        terms[j] = prev[j] + log_gamma[j][k];
                    }
                    log_sum_exp(&terms) + step_log_density(x, t, gammas[k], sigma)
                })
                .collect();
            alphas.push(next);
        }
        alphas
    }

    /// Smoothed probability of each state at every row, via forward-backward.
    ///
    /// Rows without a correlated step (the first two of each track) get a
    /// uniform distribution.
    pub fn state_probabilities(&self, data: &DataBundle, theta: &[f64]) -> Vec<Vec<f64>> {
        let n = self.n_states;
        let layout = self.layout(data);
        let x = &theta[..layout.sigma];
        let sigma = [theta[layout.sigma].exp(), theta[layout.sigma + 1].exp()];
        let gammas = self.gammas(theta, &layout);
        let beta = &theta[layout.beta..layout.end];

        let mut probs = vec![vec![1.0 / n as f64; n]; data.n];
        for range in data.track_ranges() {
            let alphas = self.forward(data, x, &range, sigma, &gammas, beta);
            if alphas.is_empty() {
                continue;
            }

            let first = range.start + 2;
            let mut log_beta = vec![0.0; n];
            let mut terms = vec![0.0; n];
            for idx in (0..alphas.len()).rev() {
                let t = first + idx;
                let post: Vec<f64> = (0..n).map(|k| alphas[idx][k] + log_beta[k]).collect();
                let norm = log_sum_exp(&post);
                probs[t] = post.iter().map(|v| (v - norm).exp()).collect();

                if idx > 0 {
                    let log_gamma = self.log_transition(beta, &data.covariates[t]);
                    log_beta = (0..n)
                        .map(|j| {
                            for k in 0..n {
                                terms[k] = log_gamma[j][k]
                                    + step_log_density(x, t, gammas[k], sigma)
                                    + log_beta[k];
                            }
                            log_sum_exp(&terms)
                        })
                        .collect();
                }
            }
        }
        probs
    }
}

struct Layout {
    sigma: usize,
    gamma: usize,
    beta: usize,
    n_covariates: usize,
    end: usize,
}

impl MovementModel for MultiStateCrwModel {
    fn name(&self) -> &str {
        "multistate_crw"
    }

    fn dimension(&self, data: &DataBundle) -> usize {
        self.layout(data).end
    }

    fn parameter_names(&self, data: &DataBundle) -> Vec<String> {
        let layout = self.layout(data);
        let mut names = vec!["sigma_lon".to_string(), "sigma_lat".to_string()];
        names.extend((1..=self.n_states).map(|k| format!("gamma[{k}]")));
        for i in 1..=self.n_states {
            for j in (1..=self.n_states).filter(|&j| j != i) {
                names.extend((0..layout.n_covariates).map(|c| format!("beta[{i},{j},{c}]")));
            }
        }
        names
    }

    fn initial_point(&self, data: &DataBundle) -> Vec<f64> {
        let layout = self.layout(data);
        let mut theta: Vec<f64> = data.locations.iter().flatten().copied().collect();
        let log_sigma = (1.0 / self.sigma_rate).ln();
        theta.extend([log_sigma, log_sigma]);

        // Evenly spaced correlations keep the ordering constraint satisfied
        let n = self.n_states as f64;
        theta.extend((1..=self.n_states).map(|k| logit(k as f64 / (n + 1.0))));
        theta.resize(layout.end, 0.0);
        theta
    }

    fn initial_step_sizes(&self, data: &DataBundle) -> Vec<f64> {
        let layout = self.layout(data);
        let mut steps = location_step_sizes(data);
        steps.resize(layout.end, 0.3);
        steps
    }

    fn log_density(&self, data: &DataBundle, theta: &[f64]) -> f64 {
        let layout = self.layout(data);
        let x = &theta[..layout.sigma];
        let Some((sigma, mut lp)) = sigma_prior(&theta[layout.sigma..layout.sigma + 2], self.sigma_rate) else {
            return f64::NEG_INFINITY;
        };

        let gammas = self.gammas(theta, &layout);
        if gammas.windows(2).any(|w| w[0] >= w[1]) {
            return f64::NEG_INFINITY;
        }
        lp += theta[layout.gamma..layout.gamma + self.n_states]
            .iter()
            .map(|&u| log_inv_logit_jacobian(u))
            .sum::<f64>();

        let beta = &theta[layout.beta..layout.end];
        lp += beta
            .iter()
            .map(|&b| normal_log_pdf(b, 0.0, self.beta_prior_sd))
            .sum::<f64>();

        for range in data.track_ranges() {
            lp += first_step_log_density(x, &range, sigma);
            let alphas = self.forward(data, x, &range, sigma, &gammas, beta);
            if let Some(last) = alphas.last() {
                lp += log_sum_exp(last);
            }
        }

        lp += observation_log_likelihood(data, x);
        trace!(lp, "multi-state log density");
        if lp.is_nan() {
            return f64::NEG_INFINITY;
        }
        lp
    }

    fn scalar_parameters(&self, data: &DataBundle, theta: &[f64]) -> Vec<f64> {
        let layout = self.layout(data);
        let mut params = vec![theta[layout.sigma].exp(), theta[layout.sigma + 1].exp()];
        params.extend(self.gammas(theta, &layout));
        params.extend_from_slice(&theta[layout.beta..layout.end]);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use track_core::{Observation, Track};

    fn wiggly_track(id: &str, n: usize) -> Track {
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let observations = (0..n)
            .map(|i| {
                let f = i as f64;
                Observation::new(
                    id,
                    t0 + Duration::minutes(i as i64 * 5),
                    -64.0 + 0.01 * f + 0.003 * (f * 1.7).sin(),
                    45.0 + 0.004 * (f * 0.9).cos(),
                    0.002,
                    0.002,
                )
                .with_weight(0.6)
                .with_covariates(vec![(f * 0.5).sin()])
            })
            .collect();
        Track::new(id, observations)
    }

    fn theta_for(model: &MultiStateCrwModel, data: &DataBundle) -> Vec<f64> {
        let mut theta = model.initial_point(data);
        let layout = model.layout(data);
        for (i, b) in theta[layout.beta..layout.end].iter_mut().enumerate() {
            *b = 0.3 * (i as f64 + 1.0) - 0.5;
        }
        theta
    }

    #[test]
    fn test_dimension_and_names() {
        let data = DataBundle::from_tracks(&[wiggly_track("a", 6)], 2).unwrap();
        let model = MultiStateCrwModel::new(2);
        // 12 locations + 2 sigma + 2 gamma + 2 pairs x 2 covariates
        assert_eq!(model.dimension(&data), 20);
        let names = model.parameter_names(&data);
        assert_eq!(names.len(), 8);
        assert_eq!(names[2], "gamma[1]");
        assert_eq!(names[4], "beta[1,2,0]");
        assert_eq!(model.scalar_parameters(&data, &model.initial_point(&data)).len(), 8);
    }

    #[test]
    fn test_transition_rows_sum_to_one() {
        let model = MultiStateCrwModel::new(3);
        let beta: Vec<f64> = (0..12).map(|i| i as f64 * 0.4 - 2.0).collect();
        let matrix = model.log_transition(&beta, &[1.0, 0.7]);
        for row in &matrix {
            let total: f64 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forward_matches_path_enumeration() {
        let data = DataBundle::from_tracks(&[wiggly_track("a", 6)], 2).unwrap();
        let model = MultiStateCrwModel::new(2);
        let theta = theta_for(&model, &data);
        let layout = model.layout(&data);
        let x = &theta[..layout.sigma];
        let sigma = [theta[layout.sigma].exp(), theta[layout.sigma + 1].exp()];
        let gammas = model.gammas(&theta, &layout);
        let beta = &theta[layout.beta..layout.end];
        let range = 0..data.n;

        let alphas = model.forward(&data, x, &range, sigma, &gammas, beta);
        let forward = log_sum_exp(alphas.last().unwrap());

        // Rows 2..6 carry states: 4 steps, 2^4 paths
        let steps: Vec<usize> = (2..6).collect();
        let mut path_terms = Vec::new();
        for mask in 0..(1usize << steps.len()) {
            let states: Vec<usize> = (0..steps.len()).map(|i| (mask >> i) & 1).collect();
            let mut lp = -(2.0f64).ln();
            for (i, &t) in steps.iter().enumerate() {
                if i > 0 {
                    let log_gamma = model.log_transition(beta, &data.covariates[t]);
                    lp += log_gamma[states[i - 1]][states[i]];
                }
                lp += step_log_density(x, t, gammas[states[i]], sigma);
            }
            path_terms.push(lp);
        }

        assert!((forward - log_sum_exp(&path_terms)).abs() < 1e-9);
    }

    #[test]
    fn test_unordered_correlations_rejected() {
        let data = DataBundle::from_tracks(&[wiggly_track("a", 5)], 2).unwrap();
        let model = MultiStateCrwModel::new(2);
        let mut theta = model.initial_point(&data);
        assert!(model.log_density(&data, &theta).is_finite());

        let layout = model.layout(&data);
        theta.swap(layout.gamma, layout.gamma + 1);
        assert_eq!(model.log_density(&data, &theta), f64::NEG_INFINITY);
    }

    #[test]
    fn test_recursion_resets_per_track() {
        let a = wiggly_track("a", 5);
        let b = wiggly_track("b", 4);
        let model = MultiStateCrwModel::new(2);
        let joint = DataBundle::from_tracks(&[a.clone(), b.clone()], 2).unwrap();
        let theta = theta_for(&model, &joint);
        let layout = model.layout(&joint);
        let x = &theta[..layout.sigma];
        let sigma = [theta[layout.sigma].exp(), theta[layout.sigma + 1].exp()];
        let gammas = model.gammas(&theta, &layout);
        let beta = &theta[layout.beta..layout.end];

        let ranges = joint.track_ranges();
        assert_eq!(ranges, vec![0..5, 5..9]);
        let first = model.forward(&joint, x, &ranges[0], sigma, &gammas, beta);
        let second = model.forward(&joint, x, &ranges[1], sigma, &gammas, beta);
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);

        // The second track starts from the uniform initial distribution again
        let expected: Vec<f64> = gammas
            .iter()
            .map(|&g| -(2.0f64).ln() + step_log_density(x, 7, g, sigma))
            .collect();
        assert_eq!(second[0], expected);
    }

    #[test]
    fn test_state_probabilities_are_distributions() {
        let data = DataBundle::from_tracks(&[wiggly_track("a", 7), wiggly_track("b", 3)], 2).unwrap();
        let model = MultiStateCrwModel::new(2);
        let theta = theta_for(&model, &data);
        let probs = model.state_probabilities(&data, &theta);

        assert_eq!(probs.len(), 10);
        for row in &probs {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        assert_eq!(probs[0], vec![0.5, 0.5]);
        assert_eq!(probs[8], vec![0.5, 0.5]);
    }
}
