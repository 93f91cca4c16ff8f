//! Smoother error types

use std::path::PathBuf;
use thiserror::Error;
use track_core::CoreError;
use track_model::ModelError;
use track_sampler::SamplerError;
use track_summary::SummaryError;

/// Errors that end a smoothing run
#[derive(Error, Debug)]
pub enum SmootherError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Sampling failed for {id}: {source}")]
    Sampler {
        id: String,
        #[source]
        source: SamplerError,
    },

    #[error("Could not build model data for {id}: {source}")]
    Model {
        id: String,
        #[source]
        source: ModelError,
    },

    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    #[error("Draw shape error: {0}")]
    Shape(#[from] CoreError),

    #[error("Failed to persist fit to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: SamplerError,
    },
}

impl SmootherError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Failures confined to a single fit, which an isolating run may skip
    pub fn is_per_track(&self) -> bool {
        matches!(
            self,
            Self::Sampler { .. } | Self::Model { .. } | Self::Persistence { .. }
        )
    }
}

pub type SmootherResult<T> = Result<T, SmootherError>;
