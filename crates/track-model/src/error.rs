//! Error types for model construction

use thiserror::Error;

/// Errors raised while bundling track data for a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid data at row {row}: {reason}")]
    InvalidData { row: usize, reason: String },

    #[error("Track {0} has no observations")]
    EmptyTrack(String),

    #[error("Covariate mismatch at row {row}: expected {expected} covariates, got {actual}")]
    CovariateMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

impl ModelError {
    pub fn invalid_data(row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            row,
            reason: reason.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
