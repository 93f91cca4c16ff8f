//! Log densities and link functions used by the movement models

use std::f64::consts::PI;

/// ln(sqrt(2π))
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Lanczos coefficients for g = 7, n = 9
const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for positive arguments
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64));

    LN_SQRT_2PI + (x + 0.5) * t.ln() - t + series.ln()
}

/// Normal log density
pub fn normal_log_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
}

/// Location-scale Student-t log density with `nu` degrees of freedom
pub fn student_t_log_pdf(x: f64, nu: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    ln_gamma((nu + 1.0) / 2.0)
        - ln_gamma(nu / 2.0)
        - 0.5 * (nu * PI).ln()
        - sigma.ln()
        - (nu + 1.0) / 2.0 * (z * z / nu).ln_1p()
}

/// Exponential log density; `-inf` outside the support
pub fn exponential_log_pdf(x: f64, rate: f64) -> f64 {
    if x < 0.0 {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * x
}

/// Numerically stable `ln(1 + e^x)`
pub fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

pub fn inv_logit(u: f64) -> f64 {
    1.0 / (1.0 + (-u).exp())
}

/// Log absolute Jacobian of `inv_logit` at `u`, i.e. `ln(p(1 - p))`
pub fn log_inv_logit_jacobian(u: f64) -> f64 {
    -softplus(-u) - softplus(u)
}

/// `ln(Σ exp(v))` with the max-shift identity; `-inf` for an empty or all `-inf` input
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
