//! # Track Sampler
//!
//! The posterior sampling capability used by the smoother, plus a reference
//! adaptive Metropolis implementation.
//!
//! A [`Sampler`] receives a movement model, the data it conditions on and an
//! opaque set of options, and returns a [`Fit`] holding retained draws of the
//! centered latent locations and scalar parameters.

pub mod error;
pub mod fit;
pub mod metropolis;
pub mod options;

#[cfg(any(test, feature = "testing"))]
pub mod fixed;

pub use error::{SamplerError, SamplerResult};
pub use fit::Fit;
pub use metropolis::{MetropolisSampler, RunSettings};
pub use options::SamplerOptions;

#[cfg(any(test, feature = "testing"))]
pub use fixed::FixedDrawsSampler;

use track_model::{DataBundle, MovementModel};

/// Draws from the posterior of a movement model
pub trait Sampler: Send + Sync {
    /// Sampler name recorded in fits and logs
    fn name(&self) -> &str;

    /// Fit `model` to `data`. Options are interpreted by the implementation.
    fn sample(
        &self,
        model: &dyn MovementModel,
        data: &DataBundle,
        options: &SamplerOptions,
    ) -> SamplerResult<Fit>;
}
