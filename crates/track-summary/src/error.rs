//! Summary error types

use thiserror::Error;

/// Errors raised while summarizing posterior draws
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummaryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Longitude and latitude summaries cover different timestamps
    #[error("Coordinate summaries disagree on timestamps ({lon} longitude rows, {lat} latitude rows)")]
    ShapeMismatch { lon: usize, lat: usize },

    #[error("No posterior draws to summarize")]
    EmptyDraws,
}

impl SummaryError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type SummaryResult<T> = Result<T, SummaryError>;
