//! Posterior fit returned by a sampler

use crate::error::SamplerResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use track_core::DrawsEnsemble;
use tracing::debug;

/// Posterior draws of one fit.
///
/// Draws are chain-major: all retained draws of chain 0, then chain 1, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fit {
    /// Name of the model that was fitted
    pub model: String,
    /// Name of the sampler that produced the draws
    pub sampler: String,
    pub chains: usize,
    pub draws_per_chain: usize,
    /// Centered latent location draws
    pub locations: DrawsEnsemble,
    pub parameter_names: Vec<String>,
    /// Scalar parameter values, one row per draw
    pub parameters: Vec<Vec<f64>>,
    /// Post-warmup acceptance rate of each chain
    pub acceptance_rates: Vec<f64>,
}

impl Fit {
    pub fn n_draws(&self) -> usize {
        self.locations.n_draws()
    }

    /// All draws of a named scalar parameter
    pub fn parameter(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.parameter_names.iter().position(|n| n == name)?;
        Some(self.parameters.iter().map(|row| row[idx]).collect())
    }

    /// Split-chain potential scale reduction factor for a scalar parameter.
    ///
    /// `None` when the parameter is unknown, there are fewer than four draws
    /// per chain, or the within-chain variance is zero.
    pub fn split_rhat(&self, name: &str) -> Option<f64> {
        let draws = self.parameter(name)?;
        let half = self.draws_per_chain / 2;
        if half < 2 || draws.len() != self.chains * self.draws_per_chain {
            return None;
        }

        let mut sequences: Vec<&[f64]> = Vec::with_capacity(self.chains * 2);
        for chain in draws.chunks_exact(self.draws_per_chain) {
            sequences.push(&chain[..half]);
            sequences.push(&chain[half..2 * half]);
        }

        let n = half as f64;
        let means: Vec<f64> = sequences.iter().map(|s| s.iter().sum::<f64>() / n).collect();
        let within = sequences
            .iter()
            .zip(&means)
            .map(|(s, m)| s.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0))
            .sum::<f64>()
            / sequences.len() as f64;
        if within <= 0.0 {
            return None;
        }

        let grand = means.iter().sum::<f64>() / means.len() as f64;
        let between_over_n =
            means.iter().map(|m| (m - grand).powi(2)).sum::<f64>() / (means.len() as f64 - 1.0);
        let var_plus = (n - 1.0) / n * within + between_over_n;

        Some((var_plus / within).sqrt())
    }

    /// Persist the fit as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> SamplerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!("Saved {} fit to {}", self.model, path.display());
        Ok(())
    }

    /// Load a fit persisted with [`Fit::save`]
    pub fn load(path: &Path) -> SamplerResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
