//! Deterministic sampler for tests
//!
//! Produces draws scattered symmetrically around the observed locations so
//! summaries are predictable without running a chain. Selected tracks can be
//! made to fail to exercise error handling downstream.

use crate::error::{SamplerError, SamplerResult};
use crate::fit::Fit;
use crate::options::SamplerOptions;
use crate::Sampler;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use track_core::DrawsEnsemble;
use track_model::{DataBundle, MovementModel};

#[derive(Debug)]
pub struct FixedDrawsSampler {
    n_draws: usize,
    spread: f64,
    /// Bundles whose first absolute longitude matches one of these fail
    failing_longitudes: Vec<f64>,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
}

impl FixedDrawsSampler {
    pub fn new(n_draws: usize, spread: f64) -> Self {
        Self {
            n_draws,
            spread,
            failing_longitudes: Vec::new(),
            failing_calls: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the `call`-th invocation (zero based)
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Fail any bundle whose first observation has this longitude
    pub fn failing_on_longitude(mut self, lon: f64) -> Self {
        self.failing_longitudes.push(lon);
        self
    }

    /// Number of `sample` invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Offset of draw `d`, evenly spaced in `[-spread, spread]`
    fn offset(&self, d: usize) -> f64 {
        if self.n_draws < 2 {
            return 0.0;
        }
        self.spread * (2.0 * d as f64 / (self.n_draws - 1) as f64 - 1.0)
    }
}

impl Sampler for FixedDrawsSampler {
    fn name(&self) -> &str {
        "fixed"
    }

    fn sample(
        &self,
        model: &dyn MovementModel,
        data: &DataBundle,
        _options: &SamplerOptions,
    ) -> SamplerResult<Fit> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(SamplerError::failed(format!("scripted failure on call {call}")));
        }
        if let Some(first) = data.locations.first() {
            let lon = first[0] + data.center[0];
            if self.failing_longitudes.iter().any(|f| (f - lon).abs() < 1e-9) {
                return Err(SamplerError::failed(format!("scripted failure at longitude {lon}")));
            }
        }

        let locations = DrawsEnsemble::from_fn(self.n_draws, data.n, |d, t| {
            let offset = self.offset(d);
            [data.locations[t][0] + offset, data.locations[t][1] + offset]
        });
        let init = model.initial_point(data);
        let params = model.scalar_parameters(data, &init);

        Ok(Fit {
            model: model.name().to_string(),
            sampler: self.name().to_string(),
            chains: 1,
            draws_per_chain: self.n_draws,
            locations,
            parameter_names: model.parameter_names(data),
            parameters: vec![params; self.n_draws],
            acceptance_rates: vec![1.0],
        })
    }
}
