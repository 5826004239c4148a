//! Size-tuning metrics read off the dense fitted curve (the plotted samples).

use serde::{Deserialize, Serialize};

use crate::domain::FitResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningMetrics {
    /// Stimulus size at the curve maximum (first one on ties).
    pub preferred_size: f64,
    pub peak_response: f64,
    /// Curve value at the largest tested size.
    pub response_at_max: f64,
    /// `(peak − response_at_max) / peak`; `None` unless the peak is positive.
    pub suppression_index: Option<f64>,
}

pub fn tuning_metrics(fit: &FitResult) -> TuningMetrics {
    let mut best_idx = 0;
    for (i, &v) in fit.curve_y.iter().enumerate() {
        if v > fit.curve_y[best_idx] {
            best_idx = i;
        }
    }

    let peak_response = fit.curve_y.get(best_idx).copied().unwrap_or(f64::NAN);
    let response_at_max = fit.curve_y.last().copied().unwrap_or(f64::NAN);
    let suppression_index = if peak_response > 0.0 {
        Some((peak_response - response_at_max) / peak_response)
    } else {
        None
    };

    TuningMetrics {
        preferred_size: fit.curve_x.get(best_idx).copied().unwrap_or(f64::NAN),
        peak_response,
        response_at_max,
        suppression_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitDiagnostics, Termination};

    fn result_from_curve(curve_x: Vec<f64>, curve_y: Vec<f64>) -> FitResult {
        FitResult {
            parameters: [0.0; 5],
            curve_x,
            curve_y,
            diagnostics: FitDiagnostics {
                sse: 0.0,
                rmse: 0.0,
                r_squared: None,
                evaluations: 0,
                iterations: 0,
                termination: Termination::ExactFit,
                candidates_tried: 1,
                candidates_converged: 1,
                chosen_candidate: 0,
                param_std_errors: None,
                warnings: Vec::new(),
            },
        }
    }

    #[test]
    fn suppressed_curve_has_positive_index() {
        let fit = result_from_curve(vec![0.0, 10.0, 20.0, 40.0], vec![0.0, 8.0, 6.0, 4.0]);
        let m = tuning_metrics(&fit);
        assert_eq!(m.preferred_size, 10.0);
        assert_eq!(m.peak_response, 8.0);
        assert_eq!(m.response_at_max, 4.0);
        assert!((m.suppression_index.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn saturating_curve_has_zero_index() {
        let fit = result_from_curve(vec![0.0, 10.0, 20.0], vec![0.0, 5.0, 7.0]);
        let m = tuning_metrics(&fit);
        assert_eq!(m.preferred_size, 20.0);
        assert_eq!(m.suppression_index, Some(0.0));
    }

    #[test]
    fn non_positive_peak_has_no_index() {
        let fit = result_from_curve(vec![0.0, 1.0], vec![-2.0, -1.0]);
        assert!(tuning_metrics(&fit).suppression_index.is_none());
    }
}
