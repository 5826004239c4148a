//! Profiled (RE)ML for a single random intercept.
//!
//! With `V_g = σ²(I + θ·11ᵀ)` for a group of size `n_g`:
//!
//! ```text
//! V_g⁻¹ = σ⁻²(I − w_g·11ᵀ),   w_g = θ / (1 + n_g·θ)
//! |V_g| = σ^(2n_g) · (1 + n_g·θ)
//! ```
//!
//! so `β̂(θ)`, the weighted residual sum of squares `Q(θ)` and both
//! log-determinants come from per-group sums without forming `V`. `σ²` is
//! profiled out, leaving a one-dimensional search over `θ = σ²_u / σ²`:
//!
//! ```text
//! ML:   −2ℓ = N·(1 + ln(2π·Q/N))         + Σ ln(1 + n_g·θ)
//! REML: −2ℓ = (N−p)·(1 + ln(2π·Q/(N−p))) + Σ ln(1 + n_g·θ) + ln|XᵀWX|
//! ```
//!
//! The search is a log-spaced grid over θ followed by golden-section refinement
//! around the best grid point, with `θ = 0` checked explicitly. Deterministic:
//! no random restarts, fixed evaluation order.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{EstimationMethod, MixedModelConfig};
use crate::error::AnalysisError;
use crate::math::log_space;
use crate::mixed::design::MixedDesign;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Inverse golden ratio.
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Everything needed downstream at a given θ.
#[derive(Debug, Clone)]
pub struct Profile {
    pub theta: f64,
    /// Profiled −2·log-likelihood (REML or ML).
    pub deviance: f64,
    pub beta: DVector<f64>,
    pub sigma2: f64,
    /// `XᵀWX` with `W = σ²V⁻¹`; `σ²·(XᵀWX)⁻¹` is the covariance of `β̂`.
    pub xtwx_inverse: DMatrix<f64>,
    pub residuals: DVector<f64>,
}

/// Evaluate the profiled criterion at `theta ≥ 0`.
///
/// Returns `None` when `XᵀWX` is not positive definite or `Q(θ) ≤ 0`.
pub fn profile(design: &MixedDesign, theta: f64, method: EstimationMethod) -> Option<Profile> {
    let n = design.n_obs();
    let p = design.n_fixed();
    let x = &design.x;
    let y = &design.y;

    let mut xtwx = x.transpose() * x;
    let mut xtwy = x.transpose() * y;
    let mut log_det_v = 0.0;

    for g in &design.groups {
        let n_g = g.rows.len() as f64;
        let w = theta / (1.0 + n_g * theta);
        log_det_v += (n_g * theta).ln_1p();

        let mut sx = DVector::<f64>::zeros(p);
        let mut sy = 0.0;
        for &row in &g.rows {
            sx += x.row(row).transpose();
            sy += y[row];
        }
        xtwx -= &sx * sx.transpose() * w;
        xtwy -= &sx * (w * sy);
    }

    let chol = xtwx.cholesky()?;
    let beta = chol.solve(&xtwy);
    let residuals = y - x * &beta;

    let mut q = residuals.norm_squared();
    for g in &design.groups {
        let n_g = g.rows.len() as f64;
        let w = theta / (1.0 + n_g * theta);
        let sr: f64 = g.rows.iter().map(|&row| residuals[row]).sum();
        q -= w * sr * sr;
    }
    if !(q.is_finite() && q > 0.0) {
        return None;
    }

    let (dof, extra) = match method {
        EstimationMethod::Ml => (n as f64, 0.0),
        EstimationMethod::Reml => {
            // ln|XᵀWX| from the Cholesky factor.
            let log_det: f64 = chol.l().diagonal().iter().map(|v| 2.0 * v.ln()).sum();
            ((n - p) as f64, log_det)
        }
    };
    let sigma2 = q / dof;
    let deviance = dof * (1.0 + LN_2PI + sigma2.ln()) + log_det_v + extra;
    if !deviance.is_finite() {
        return None;
    }

    Some(Profile {
        theta,
        deviance,
        beta,
        sigma2,
        xtwx_inverse: chol.inverse(),
        residuals,
    })
}

/// Result of the θ search.
#[derive(Debug, Clone)]
pub struct ThetaSearch {
    pub best: Profile,
    /// θ̂ sits on the zero boundary.
    pub at_lower_boundary: bool,
    /// θ̂ sits on the top of the search range.
    pub at_upper_bound: bool,
    pub evaluations: usize,
}

pub fn optimize_theta(
    design: &MixedDesign,
    method: EstimationMethod,
    config: &MixedModelConfig,
) -> Result<ThetaSearch, AnalysisError> {
    let singular = || {
        AnalysisError::SingularFit(
            "fixed-effect cross-product is not positive definite for this grouping".into(),
        )
    };

    let grid = log_space(config.theta_min, config.theta_max, config.theta_grid_steps)?;
    let mut evaluations = 0;
    let mut eval = |theta: f64| {
        evaluations += 1;
        profile(design, theta, method)
    };

    let zero = eval(0.0).ok_or_else(singular)?;

    let mut grid_profiles = Vec::with_capacity(grid.len());
    for &theta in &grid {
        grid_profiles.push(eval(theta).ok_or_else(singular)?);
    }

    let mut k = 0;
    for (i, prof) in grid_profiles.iter().enumerate() {
        if prof.deviance < grid_profiles[k].deviance {
            k = i;
        }
    }

    // Golden-section on ln θ over the bracket around the best grid point.
    let lo_idx = k.saturating_sub(1);
    let hi_idx = (k + 1).min(grid.len() - 1);
    let mut lo = grid[lo_idx].ln();
    let mut hi = grid[hi_idx].ln();
    let mut c = hi - INV_PHI * (hi - lo);
    let mut d = lo + INV_PHI * (hi - lo);
    let mut fc = eval(c.exp()).ok_or_else(singular)?;
    let mut fd = eval(d.exp()).ok_or_else(singular)?;
    while hi - lo > config.tolerance {
        if fc.deviance <= fd.deviance {
            hi = d;
            d = c;
            fd = fc;
            c = hi - INV_PHI * (hi - lo);
            fc = eval(c.exp()).ok_or_else(singular)?;
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + INV_PHI * (hi - lo);
            fd = eval(d.exp()).ok_or_else(singular)?;
        }
    }

    let mut best = grid_profiles.swap_remove(k);
    for cand in [fc, fd] {
        if cand.deviance < best.deviance {
            best = cand;
        }
    }

    // Prefer the boundary unless the interior is genuinely better.
    let at_lower_boundary = zero.deviance <= best.deviance + 1e-10 * best.deviance.abs().max(1.0);
    if at_lower_boundary {
        best = zero;
    }
    let at_upper_bound = !at_lower_boundary && k == grid.len() - 1;

    debug!(
        theta = best.theta,
        deviance = best.deviance,
        evaluations,
        at_lower_boundary,
        "variance ratio search finished"
    );

    Ok(ThetaSearch {
        best,
        at_lower_boundary,
        at_upper_bound,
        evaluations,
    })
}
