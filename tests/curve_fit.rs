use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use tuning_stats::domain::{BehavioralState, ExperimentType};
use tuning_stats::fit::{fit_tuning_groups, summarize_trials, tuning_metrics};
use tuning_stats::models::predict;
use tuning_stats::report::{compute_residuals, format_fit_summary};
use tuning_stats::{CurveFitter, ErrorKind, FitterConfig, fit_curve};

const SIZES: [f64; 6] = [0.0, 5.0, 10.0, 20.0, 40.0, 80.0];
const RESPONSES: [f64; 6] = [0.0, 2.0, 5.0, 9.0, 9.5, 9.6];

#[test]
fn saturating_curve_is_fitted_and_sampled() {
    let fit = CurveFitter::default().fit(&SIZES, &RESPONSES).unwrap();

    assert_eq!(fit.curve_x.len(), 2000);
    assert_eq!(fit.curve_y.len(), 2000);
    assert_eq!(fit.curve_x[0], 0.0);
    assert_eq!(*fit.curve_x.last().unwrap(), 80.0);
    assert!(fit.curve_y.iter().all(|v| v.is_finite()));

    // Rises monotonically over the measured range.
    let rising: Vec<f64> = fit
        .curve_x
        .iter()
        .zip(fit.curve_y.iter())
        .filter(|(x, _)| **x <= 40.0)
        .map(|(_, y)| *y)
        .collect();
    for w in rising.windows(2) {
        assert!(w[1] >= w[0] - 1e-6, "curve dips: {} -> {}", w[0], w[1]);
    }

    assert!(fit.diagnostics.sse < 0.1, "sse = {}", fit.diagnostics.sse);
    let residuals = compute_residuals(&SIZES, &RESPONSES, &fit).unwrap();
    assert!(residuals.iter().all(|r| r.residual.abs() < 0.2));
}

#[test]
fn repeated_fits_are_bit_identical() {
    let a = fit_curve(&SIZES, &RESPONSES, &FitterConfig::default()).unwrap();
    let b = fit_curve(&SIZES, &RESPONSES, &FitterConfig::default()).unwrap();
    assert_eq!(a.parameters, b.parameters);
    assert_eq!(a.curve_y, b.curve_y);
    assert_eq!(a.diagnostics.chosen_candidate, b.diagnostics.chosen_candidate);
}

#[test]
fn invalid_inputs_map_to_error_kinds() {
    let fitter = CurveFitter::default();

    let err = fitter.fit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);

    let err = fitter
        .fit(&[5.0; 6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateInput);

    let err = fitter.fit(&SIZES, &RESPONSES[..5]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthMismatch);

    let mut y = RESPONSES;
    y[2] = f64::INFINITY;
    let err = fitter.fit(&SIZES, &y).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonFiniteInput);
}

#[test]
fn noisy_surround_suppression_is_recovered() {
    let truth = [6.0, 12.0, 0.6, 45.0, 0.5];
    let sizes = [2.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 60.0, 80.0, 100.0];
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let y: Vec<f64> = sizes
        .iter()
        .map(|&x| predict(x, &truth) + noise.sample(&mut rng))
        .collect();

    let fit = fit_curve(&sizes, &y, &FitterConfig::default()).unwrap();
    assert!(fit.diagnostics.rmse < 0.1, "rmse = {}", fit.diagnostics.rmse);
    assert!(fit.diagnostics.r_squared.unwrap() > 0.98);

    let metrics = tuning_metrics(&fit);
    // Suppressed: the response at the largest size sits below the peak.
    assert!(metrics.response_at_max < metrics.peak_response);
    assert!(metrics.preferred_size > 5.0 && metrics.preferred_size < 60.0);
}

#[test]
fn grouped_trials_fit_per_condition() {
    let truth = [6.0, 12.0, 0.6, 45.0, 0.5];
    let sizes = [2.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 60.0, 80.0, 100.0];
    let mut rng = StdRng::seed_from_u64(11);
    let noise = Normal::new(0.0, 0.1).unwrap();

    let mut samples = Vec::new();
    for &x in &sizes {
        let trials: Vec<f64> = (0..8)
            .map(|_| predict(x, &truth) + noise.sample(&mut rng))
            .collect();
        samples.push(
            summarize_trials(ExperimentType::Treated, BehavioralState::Active, x, &trials)
                .unwrap(),
        );
    }
    // Too few sizes for the quiescent condition: fails on its own.
    for &x in &sizes[..3] {
        samples.push(
            summarize_trials(ExperimentType::Control, BehavioralState::Quiescent, x, &[1.0])
                .unwrap(),
        );
    }

    let fits = fit_tuning_groups(&samples, &FitterConfig::default());
    assert_eq!(fits.len(), 2);
    assert_eq!(fits[0].key.experiment_type, ExperimentType::Control);
    assert_eq!(
        fits[0].result.as_ref().unwrap_err().kind(),
        ErrorKind::InsufficientData
    );

    let treated = &fits[1];
    let fit = treated.result.as_ref().unwrap();
    assert_eq!(treated.n_samples, sizes.len());
    assert!(fit.diagnostics.rmse < 0.2);

    let summary = format_fit_summary(&treated.key, fit, treated.metrics.as_ref());
    assert!(summary.contains("treated/active"));
    assert!(summary.contains("preferred size"));
}
