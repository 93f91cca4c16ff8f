//! Error types shared across the track smoothing workspace

use thiserror::Error;

/// Core error type for track data handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Shape error: expected {expected} values, got {actual}")]
    Shape { expected: usize, actual: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
