//! # Track Model
//!
//! State-space movement models for smoothing noisy telemetry locations.
//!
//! Each model defines an unnormalized log posterior over an unconstrained
//! parameter vector holding the latent location at every observed timestamp
//! plus the process parameters. Samplers only ever see that vector; the
//! model maps it back to locations and named scalar parameters.
//!
//! ## Models
//! - [`CrwModel`]: first-order correlated random walk with Student-t observations
//! - [`MultiStateCrwModel`]: hidden Markov mixture of correlated random walks

pub mod bundle;
pub mod crw;
pub mod distributions;
pub mod error;
pub mod multistate;

pub use bundle::DataBundle;
pub use crw::CrwModel;
pub use error::{ModelError, ModelResult};
pub use multistate::MultiStateCrwModel;

/// Degrees of freedom of the Student-t observation model
pub const OBSERVATION_DF: f64 = 5.0;

/// Default rate of the exponential prior on process noise scales
pub const DEFAULT_SIGMA_RATE: f64 = 20.0;

/// A movement model whose posterior a sampler can explore
pub trait MovementModel: Send + Sync {
    /// Short model name used in logs and persisted fits
    fn name(&self) -> &str;

    /// Length of the unconstrained parameter vector
    fn dimension(&self, data: &DataBundle) -> usize;

    /// Names of the scalar (non-location) parameters
    fn parameter_names(&self, data: &DataBundle) -> Vec<String>;

    /// A point with finite log density to start chains from
    fn initial_point(&self, data: &DataBundle) -> Vec<f64>;

    /// Starting proposal scale for each unconstrained coordinate
    fn initial_step_sizes(&self, data: &DataBundle) -> Vec<f64> {
        vec![0.1; self.dimension(data)]
    }

    /// Unnormalized log posterior; `-inf` outside the support
    fn log_density(&self, data: &DataBundle, theta: &[f64]) -> f64;

    /// Centered latent locations encoded in `theta`
    fn locations(&self, data: &DataBundle, theta: &[f64]) -> Vec<[f64; 2]> {
        theta[..2 * data.n]
            .chunks_exact(2)
            .map(|c| [c[0], c[1]])
            .collect()
    }

    /// Scalar parameters on their natural scale, ordered as `parameter_names`
    fn scalar_parameters(&self, data: &DataBundle, theta: &[f64]) -> Vec<f64>;
}
