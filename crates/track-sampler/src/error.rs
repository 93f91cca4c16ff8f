//! Sampler error types

use thiserror::Error;
use track_core::CoreError;

/// Errors that can occur while sampling a posterior or persisting a fit
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Invalid sampler option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("Log density is not finite at the initial point: {0}")]
    InitialDensity(f64),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Sampling failed: {0}")]
    Failed(String),

    #[error("Draw shape error: {0}")]
    Shape(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SamplerError {
    pub fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

pub type SamplerResult<T> = Result<T, SamplerError>;
