//! Smoother configuration

use crate::error::{SmootherError, SmootherResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use track_model::DEFAULT_SIGMA_RATE;
use track_sampler::SamplerOptions;
use track_summary::{CredibleLevel, IntervalMethod, SummaryError};

/// What to do when fitting one track fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run at the first failure
    #[default]
    Abort,
    /// Record the failure and carry on with the remaining tracks
    Isolate,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Isolate => write!(f, "isolate"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = SmootherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "isolate" => Ok(Self::Isolate),
            other => Err(SmootherError::invalid_input(format!(
                "unrecognized failure policy '{other}' (expected 'abort' or 'isolate')"
            ))),
        }
    }
}

/// Movement model fitted to the tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelVariant {
    /// One correlated random walk per track
    #[default]
    Crw,
    /// One joint fit of a hidden Markov mixture of random walks over all tracks
    MultiState { states: usize },
}

/// Smoother configuration
#[derive(Debug, Clone)]
pub struct SmootherConfig {
    /// Credible interval estimator
    pub interval: IntervalMethod,
    /// Probability mass of the credible intervals
    pub probability: f64,
    /// Directory receiving persisted fits; `None` disables persistence
    pub output_dir: Option<PathBuf>,
    /// Forwarded verbatim to the sampler
    pub sampler_options: SamplerOptions,
    pub failure_policy: FailurePolicy,
    pub model: ModelVariant,
    /// Rate of the exponential prior on process noise scales
    pub sigma_rate: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            interval: IntervalMethod::HighestDensity,
            probability: 0.9,
            output_dir: Some(PathBuf::from(".")),
            sampler_options: SamplerOptions::new(),
            failure_policy: FailurePolicy::Abort,
            model: ModelVariant::Crw,
            sigma_rate: DEFAULT_SIGMA_RATE,
        }
    }
}

impl SmootherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SmootherResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults for
    /// absent keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SmootherResult<Self> {
        let mut config = Self::default();

        if let Some(method) = lookup("TRACK_INTERVAL_METHOD") {
            config.interval = method
                .parse()
                .map_err(|e: SummaryError| SmootherError::invalid_input(e.to_string()))?;
        }

        if let Some(prob) = lookup("TRACK_PROBABILITY") {
            config.probability = prob.trim().parse().map_err(|_| {
                SmootherError::invalid_input(format!("TRACK_PROBABILITY is not a number: '{prob}'"))
            })?;
        }

        if let Some(dir) = lookup("TRACK_OUTPUT_DIR") {
            let dir = dir.trim();
            config.output_dir = if dir.is_empty() || dir.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        if let Some(json) = lookup("TRACK_SAMPLER_OPTIONS") {
            config.sampler_options = SamplerOptions::from_json(&json).map_err(|e| {
                SmootherError::invalid_input(format!("TRACK_SAMPLER_OPTIONS: {e}"))
            })?;
        }

        if let Some(policy) = lookup("TRACK_FAILURE_POLICY") {
            config.failure_policy = policy.parse()?;
        }

        if let Some(states) = lookup("TRACK_STATES") {
            let states: usize = states.trim().parse().map_err(|_| {
                SmootherError::invalid_input(format!("TRACK_STATES is not a count: '{states}'"))
            })?;
            config.model = if states <= 1 {
                ModelVariant::Crw
            } else {
                ModelVariant::MultiState { states }
            };
        }

        if let Some(rate) = lookup("TRACK_SIGMA_RATE") {
            config.sigma_rate = rate.trim().parse().map_err(|_| {
                SmootherError::invalid_input(format!("TRACK_SIGMA_RATE is not a number: '{rate}'"))
            })?;
        }

        Ok(config)
    }

    /// Check the configuration, returning the validated credible level
    pub fn validate(&self) -> SmootherResult<CredibleLevel> {
        if !(self.sigma_rate.is_finite() && self.sigma_rate > 0.0) {
            return Err(SmootherError::invalid_input(format!(
                "sigma rate must be positive, got {}",
                self.sigma_rate
            )));
        }
        if let ModelVariant::MultiState { states } = self.model {
            if states < 2 {
                return Err(SmootherError::invalid_input(format!(
                    "a multi-state model needs at least 2 states, got {states}"
                )));
            }
        }
        CredibleLevel::new(self.probability).map_err(|e| SmootherError::invalid_input(e.to_string()))
    }

    pub fn with_interval(mut self, interval: IntervalMethod) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_sampler_options(mut self, options: SamplerOptions) -> Self {
        self.sampler_options = options;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_model(mut self, model: ModelVariant) -> Self {
        self.model = model;
        self
    }
}
