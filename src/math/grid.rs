//! Evenly spaced and log-spaced grids.
//!
//! `linspace` produces the dense x-axis for fitted tuning curves; `log_space`
//! seeds the erf scale search and the variance-ratio search, both of which
//! span several orders of magnitude.

use crate::error::AnalysisError;

/// Generate `n` evenly spaced points between `start` and `end` (inclusive).
///
/// The last point is set to `end` exactly so callers can rely on
/// `grid[n - 1] == end` without floating-point drift.
pub fn linspace(start: f64, end: f64, n: usize) -> Result<Vec<f64>, AnalysisError> {
    if !(start.is_finite() && end.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "Invalid grid range: start={start}, end={end} (must be finite)."
        )));
    }
    if n < 2 {
        return Err(AnalysisError::InvalidConfig(format!(
            "Grid needs at least 2 points, got {n}."
        )));
    }

    let step = (end - start) / (n as f64 - 1.0);
    let mut out = Vec::with_capacity(n);
    for i in 0..n - 1 {
        out.push(start + step * i as f64);
    }
    out.push(end);
    Ok(out)
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AnalysisError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AnalysisError::InvalidConfig(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AnalysisError::InvalidConfig("Log grid steps must be >= 2.".into()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Ordered scale pairs `(b, d)` with `b < d`, drawn from a log grid.
pub fn scale_pairs(min: f64, max: f64, steps: usize) -> Result<Vec<(f64, f64)>, AnalysisError> {
    let values = log_space(min, max, steps)?;
    let mut out = Vec::with_capacity(steps * (steps - 1) / 2);
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            out.push((values[i], values[j]));
        }
    }
    Ok(out)
}
