//! Adaptive Metropolis-within-Gibbs sampler
//!
//! Each iteration sweeps every coordinate of the unconstrained parameter
//! vector with a Gaussian random-walk proposal. During warmup the log step
//! size of each coordinate is moved every batch toward a 0.44 acceptance
//! rate by `min(0.5, 1/sqrt(batch))`, so early batches correct a poor
//! starting scale quickly and later adjustments shrink.
//! Independent chains are run in parallel with rayon.
//!
//! Every coordinate proposal re-evaluates the full log density, which is
//! linear in the number of observations. One sweep therefore costs O(n²)
//! for a track of n observations; long tracks are slow to fit.

use crate::error::{SamplerError, SamplerResult};
use crate::fit::Fit;
use crate::options::SamplerOptions;
use crate::Sampler;
use rand::prelude::*;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use track_core::DrawsEnsemble;
use track_model::{DataBundle, MovementModel};
use tracing::{debug, trace};

/// Iterations between step size adaptations
const ADAPT_BATCH: usize = 50;
/// Optimal acceptance rate for one-dimensional random-walk proposals
const TARGET_ACCEPTANCE: f64 = 0.44;
/// Largest change to a log step size in one adaptation batch
const MAX_ADAPT_STEP: f64 = 0.5;

/// Run settings parsed from [`SamplerOptions`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub chains: usize,
    pub iter: usize,
    pub warmup: usize,
    pub thin: usize,
    pub seed: u64,
    pub parallel: bool,
    /// Iterations between progress messages; 0 disables them
    pub refresh: usize,
}

impl RunSettings {
    pub fn from_options(options: &SamplerOptions) -> SamplerResult<Self> {
        let chains = options.get_usize("chains", 4)?;
        let iter = options.get_usize("iter", 2000)?;
        let warmup = options.get_usize("warmup", iter / 2)?;
        let thin = options.get_usize("thin", 1)?;
        let seed = options.get_u64("seed", 42)?;
        let parallel = options.get_bool("parallel", true)?;
        let refresh = options.get_usize("refresh", 0)?;

        if chains == 0 {
            return Err(SamplerError::invalid_option("chains", "at least one chain is required"));
        }
        if thin == 0 {
            return Err(SamplerError::invalid_option("thin", "must be positive"));
        }
        if warmup >= iter {
            return Err(SamplerError::invalid_option(
                "warmup",
                format!("warmup ({warmup}) must be smaller than iter ({iter})"),
            ));
        }

        Ok(Self {
            chains,
            iter,
            warmup,
            thin,
            seed,
            parallel,
            refresh,
        })
    }

    /// Draws retained per chain
    pub fn kept_per_chain(&self) -> usize {
        (self.iter - self.warmup).div_ceil(self.thin)
    }
}

/// Reference sampler driving any [`MovementModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetropolisSampler;

impl MetropolisSampler {
    pub fn new() -> Self {
        Self
    }
}

struct ChainOutput {
    locations: Vec<Vec<[f64; 2]>>,
    parameters: Vec<Vec<f64>>,
    acceptance: f64,
}

impl Sampler for MetropolisSampler {
    fn name(&self) -> &str {
        "metropolis"
    }

    fn sample(
        &self,
        model: &dyn MovementModel,
        data: &DataBundle,
        options: &SamplerOptions,
    ) -> SamplerResult<Fit> {
        let settings = RunSettings::from_options(options)?;
        let init = model.initial_point(data);
        let steps = model.initial_step_sizes(data);
        let dim = model.dimension(data);
        if init.len() != dim || steps.len() != dim {
            return Err(SamplerError::Model(format!(
                "model {} reported dimension {dim} but produced {} initial values and {} step sizes",
                model.name(),
                init.len(),
                steps.len()
            )));
        }

        let lp = model.log_density(data, &init);
        if !lp.is_finite() {
            return Err(SamplerError::InitialDensity(lp));
        }

        debug!(
            "Sampling {} ({} parameters): {} chains x {} iterations, {} warmup",
            model.name(),
            dim,
            settings.chains,
            settings.iter,
            settings.warmup
        );

        let run = |chain: usize| run_chain(model, data, &init, &steps, &settings, chain);
        let outputs: Vec<ChainOutput> = if settings.parallel {
            (0..settings.chains).into_par_iter().map(run).collect()
        } else {
            (0..settings.chains).map(run).collect()
        };

        let mut locations = Vec::new();
        let mut parameters = Vec::new();
        let mut acceptance_rates = Vec::with_capacity(outputs.len());
        for output in outputs {
            acceptance_rates.push(output.acceptance);
            locations.extend(output.locations);
            parameters.extend(output.parameters);
        }

        Ok(Fit {
            model: model.name().to_string(),
            sampler: self.name().to_string(),
            chains: settings.chains,
            draws_per_chain: settings.kept_per_chain(),
            locations: DrawsEnsemble::from_draws(locations)?,
            parameter_names: model.parameter_names(data),
            parameters,
            acceptance_rates,
        })
    }
}

fn run_chain(
    model: &dyn MovementModel,
    data: &DataBundle,
    init: &[f64],
    steps: &[f64],
    settings: &RunSettings,
    chain: usize,
) -> ChainOutput {
    let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(chain as u64));
    let dim = init.len();
    let mut theta = init.to_vec();
    let mut lp = model.log_density(data, &theta);
    let mut log_scale: Vec<f64> = steps.iter().map(|s| s.ln()).collect();
    let mut batch_accepts = vec![0usize; dim];

    let kept = settings.kept_per_chain();
    let mut locations = Vec::with_capacity(kept);
    let mut parameters = Vec::with_capacity(kept);
    let mut accepted = 0usize;
    let mut proposed = 0usize;

    for iteration in 0..settings.iter {
        let warming_up = iteration < settings.warmup;

        for i in 0..dim {
            let current = theta[i];
            let z: f64 = rng.sample(StandardNormal);
            theta[i] = current + log_scale[i].exp() * z;

            let candidate = model.log_density(data, &theta);
            let accept = candidate.is_finite()
                && (candidate >= lp || rng.r#gen::<f64>().ln() < candidate - lp);

            if accept {
                lp = candidate;
                batch_accepts[i] += 1;
            } else {
                theta[i] = current;
            }
            if !warming_up {
                proposed += 1;
                accepted += usize::from(accept);
            }
        }

        if warming_up && (iteration + 1) % ADAPT_BATCH == 0 {
            let batch = (iteration + 1) / ADAPT_BATCH;
            let rate = adapt_step_sizes(&mut log_scale, &mut batch_accepts, batch);
            trace!(chain, batch, rate, "adapted step sizes");
        }

        if !warming_up && (iteration - settings.warmup) % settings.thin == 0 {
            locations.push(model.locations(data, &theta));
            parameters.push(model.scalar_parameters(data, &theta));
        }

        if settings.refresh > 0 && (iteration + 1) % settings.refresh == 0 {
            debug!(
                "Chain {}: iteration {}/{} ({})",
                chain + 1,
                iteration + 1,
                settings.iter,
                if warming_up { "warmup" } else { "sampling" }
            );
        }
    }

    let acceptance = if proposed == 0 {
        0.0
    } else {
        accepted as f64 / proposed as f64
    };

    ChainOutput {
        locations,
        parameters,
        acceptance,
    }
}

/// Move each log step size toward the target acceptance rate after `batch`
/// (one based) and reset the acceptance counts. Returns the mean rate.
fn adapt_step_sizes(log_scale: &mut [f64], batch_accepts: &mut [usize], batch: usize) -> f64 {
    let delta = MAX_ADAPT_STEP.min(1.0 / (batch.max(1) as f64).sqrt());
    let mut total = 0.0;
    for (scale, hits) in log_scale.iter_mut().zip(batch_accepts.iter_mut()) {
        let rate = *hits as f64 / ADAPT_BATCH as f64;
        total += rate;
        *scale += if rate > TARGET_ACCEPTANCE { delta } else { -delta };
        *hits = 0;
    }
    if log_scale.is_empty() {
        0.0
    } else {
        total / log_scale.len() as f64
    }
}
