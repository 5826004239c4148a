//! Model evaluation for the erf-difference tuning curve:
//!
//! ```text
//! f(x) = a·(erf(x/b) − c·erf(x/d)) + e
//! ```
//!
//! `b` is the excitatory (center) extent, `d` the suppressive (surround)
//! extent, `c` the relative surround strength and `e` the baseline.
//!
//! The fitter relies on three primitive operations:
//! - predict `f(x)` (residuals, dense curve)
//! - fill a Jacobian row (Levenberg–Marquardt)
//! - fill a linear basis row for fixed `(b, d)` (seeding by least squares)

use std::f64::consts::FRAC_2_SQRT_PI;

use crate::math::erf;

/// Number of model parameters.
pub const PARAM_COUNT: usize = 5;

/// Predict `f(x)` for parameters `[a, b, c, d, e]`.
pub fn predict(x: f64, params: &[f64; PARAM_COUNT]) -> f64 {
    let [a, b, c, d, e] = *params;
    a * (erf(x / b) - c * erf(x / d)) + e
}

/// Fill `∂f/∂[a, b, c, d, e]` at `x`.
pub fn fill_jacobian_row(x: f64, params: &[f64; PARAM_COUNT], out: &mut [f64; PARAM_COUNT]) {
    let [a, b, c, d, _] = *params;
    let u = x / b;
    let v = x / d;
    let erf_u = erf(u);
    let erf_v = erf(v);

    // d/db erf(x/b) = -(2/√π)·exp(-u²)·u/b; written so exp underflow wins over
    // the large u/b factor when b is tiny.
    let gauss_u = FRAC_2_SQRT_PI * (u * (-u * u).exp()) / b;
    let gauss_v = FRAC_2_SQRT_PI * (v * (-v * v).exp()) / d;

    out[0] = erf_u - c * erf_v;
    out[1] = -a * gauss_u;
    out[2] = -a * erf_v;
    out[3] = a * c * gauss_v;
    out[4] = 1.0;
}

/// Basis row for the parameters that enter linearly once `(b, d)` are fixed:
/// `f(x) = β0·erf(x/b) + β1·(−erf(x/d)) + β2` with `β = [a, a·c, e]`.
pub fn linear_basis_row(x: f64, b: f64, d: f64) -> [f64; 3] {
    [erf(x / b), -erf(x / d), 1.0]
}

/// Recover `[a, b, c, d, e]` from linear coefficients `[a, a·c, e]`.
///
/// Returns `None` when `a` is too small for `c = (a·c)/a` to be meaningful.
pub fn params_from_linear(beta: [f64; 3], b: f64, d: f64) -> Option<[f64; PARAM_COUNT]> {
    let [a, ac, e] = beta;
    if !(a.is_finite() && ac.is_finite() && e.is_finite()) || a.abs() < 1e-12 {
        return None;
    }
    Some([a, b, ac / a, d, e])
}
