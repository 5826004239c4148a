//! Reporting utilities: residuals and formatted summaries.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::FitResult;
use crate::error::AnalysisError;

/// Observed vs fitted response at one stimulus size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointResidual {
    pub stimulus_size: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
}

/// Compute fitted values and residuals at the observed stimulus sizes.
pub fn compute_residuals(
    x: &[f64],
    y: &[f64],
    fit: &FitResult,
) -> Result<Vec<PointResidual>, AnalysisError> {
    if x.len() != y.len() {
        return Err(AnalysisError::LengthMismatch {
            what: "responses",
            expected: x.len(),
            got: y.len(),
        });
    }
    let mut out = Vec::with_capacity(x.len());
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let fitted = fit.evaluate(xi);
        if !fitted.is_finite() {
            return Err(AnalysisError::NonFiniteInput(format!(
                "model prediction at size {xi} is not finite"
            )));
        }
        out.push(PointResidual {
            stimulus_size: xi,
            observed: yi,
            fitted,
            residual: yi - fitted,
        });
    }
    Ok(out)
}
