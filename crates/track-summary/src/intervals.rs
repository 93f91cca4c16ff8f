//! Credible interval estimators over a sample of draws

use crate::error::{SummaryError, SummaryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Credible interval estimator, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalMethod {
    /// Quantiles at `(1 - p) / 2` and `1 - (1 - p) / 2`
    EqualTailed,
    /// Narrowest window holding `p` of the empirical mass
    #[default]
    HighestDensity,
}

impl IntervalMethod {
    /// Interval of `draws` holding probability `prob`
    pub fn interval(&self, draws: &[f64], prob: f64) -> SummaryResult<Interval> {
        match self {
            Self::EqualTailed => equal_tailed(draws, prob),
            Self::HighestDensity => highest_density(draws, prob),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EqualTailed => "equal-tailed",
            Self::HighestDensity => "highest-density",
        }
    }
}

impl fmt::Display for IntervalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalMethod {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eti" | "qi" | "equal-tailed" | "equal_tailed" => Ok(Self::EqualTailed),
            "hdi" | "hpd" | "highest-density" | "highest_density" => Ok(Self::HighestDensity),
            other => Err(SummaryError::invalid_input(format!(
                "unrecognized credible interval method '{other}' (expected 'eti' or 'hdi')"
            ))),
        }
    }
}

/// Probability mass of a credible interval, in `(0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CredibleLevel(f64);

impl CredibleLevel {
    pub fn new(prob: f64) -> SummaryResult<Self> {
        if prob > 0.0 && prob <= 1.0 {
            Ok(Self(prob))
        } else {
            Err(SummaryError::invalid_input(format!(
                "probability mass must be in (0, 1], got {prob}"
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for CredibleLevel {
    fn default() -> Self {
        Self(0.9)
    }
}

impl TryFrom<f64> for CredibleLevel {
    type Error = SummaryError;

    fn try_from(prob: f64) -> Result<Self, Self::Error> {
        Self::new(prob)
    }
}

impl From<CredibleLevel> for f64 {
    fn from(level: CredibleLevel) -> Self {
        level.0
    }
}

/// Closed interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

pub(crate) fn sorted(draws: &[f64]) -> Vec<f64> {
    let mut sorted = draws.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Sample quantile of already sorted values, interpolating linearly between
/// order statistics. `None` for an empty slice.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (h.ceil() as usize).min(last);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Equal-tailed interval
pub fn equal_tailed(draws: &[f64], prob: f64) -> SummaryResult<Interval> {
    if draws.is_empty() {
        return Err(SummaryError::EmptyDraws);
    }
    let sorted = sorted(draws);
    let tail = (1.0 - prob) / 2.0;
    match (quantile(&sorted, tail), quantile(&sorted, 1.0 - tail)) {
        (Some(lower), Some(upper)) => Ok(Interval { lower, upper }),
        _ => Err(SummaryError::EmptyDraws),
    }
}

/// Highest density interval of the empirical distribution.
///
/// Scans every window of `ceil(prob * n)` sorted steps and keeps the
/// narrowest; ties resolve to the lowest window.
pub fn highest_density(draws: &[f64], prob: f64) -> SummaryResult<Interval> {
    if draws.is_empty() {
        return Err(SummaryError::EmptyDraws);
    }
    let sorted = sorted(draws);
    let n = sorted.len();
    let k = (prob * n as f64).ceil() as usize;
    if k >= n {
        return Ok(Interval {
            lower: sorted[0],
            upper: sorted[n - 1],
        });
    }

    let mut best = 0;
    let mut best_width = f64::INFINITY;
    for i in 0..n - k {
        let width = sorted[i + k] - sorted[i];
        if width < best_width {
            best = i;
            best_width = width;
        }
    }

    Ok(Interval {
        lower: sorted[best],
        upper: sorted[best + k],
    })
}
