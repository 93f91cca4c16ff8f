//! # Track Summary
//!
//! Reduces posterior location draws to one row per timestamp: posterior mean
//! and median of each coordinate, a credible interval from the selected
//! estimator, and the distance and speed implied by the mean trajectory.

pub mod error;
pub mod intervals;
pub mod summarizer;

pub use error::{SummaryError, SummaryResult};
pub use intervals::{equal_tailed, highest_density, quantile, CredibleLevel, Interval, IntervalMethod};
pub use summarizer::{attach_movement, join_wide, summarize_coordinate, summarize_track, CoordinateSummary};
