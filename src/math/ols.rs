//! Linear least squares solver.
//!
//! Used in two places:
//!
//! ```text
//! minimize ‖X β − y‖²
//! ```
//!
//! - seeding the erf model: given fixed scales `(b, d)` the model is linear in
//!   `(a, a·c, e)`
//! - each Levenberg–Marquardt step, posed as the augmented system
//!   `[J; √μ·D] δ = [r; 0]`
//!
//! Implementation choices:
//! - SVD handles tall systems (nalgebra's `QR::solve` only accepts square ones).
//! - Parameter dimension is tiny (3–5 columns) so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Nearly collinear columns are common when both erf scales sit far beyond
    // the data range, so fall back to looser singular-value cutoffs.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
