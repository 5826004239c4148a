//! Per-condition batch fitting.
//!
//! A figure shows one tuning curve per cohort × behavioral state. Each group is
//! an independent fit, so groups are fitted in parallel; results come back in
//! key order regardless of scheduling.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{
    BehavioralState, ExperimentType, FitResult, FitterConfig, TuningGroupKey, TuningSample,
};
use crate::error::AnalysisError;
use crate::fit::fitter::fit_curve;
use crate::fit::metrics::{TuningMetrics, tuning_metrics};

/// Fit outcome for one group. A failing group does not abort the others.
#[derive(Debug, Clone, Serialize)]
pub struct GroupFit {
    pub key: TuningGroupKey,
    pub n_samples: usize,
    #[serde(serialize_with = "serialize_outcome")]
    pub result: Result<FitResult, AnalysisError>,
    pub metrics: Option<TuningMetrics>,
}

fn serialize_outcome<S: serde::Serializer>(
    outcome: &Result<FitResult, AnalysisError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(1))?;
    match outcome {
        Ok(fit) => map.serialize_entry("fit", fit)?,
        Err(e) => map.serialize_entry("error", &e.to_string())?,
    }
    map.end()
}

/// Collapse raw trial responses for one condition into mean ± SEM.
///
/// SEM uses the sample standard deviation (`n − 1`); a single trial has SEM 0.
pub fn summarize_trials(
    experiment_type: ExperimentType,
    behavioral_state: BehavioralState,
    stimulus_size: f64,
    trials: &[f64],
) -> Result<TuningSample, AnalysisError> {
    if trials.is_empty() {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    if !stimulus_size.is_finite() {
        return Err(AnalysisError::NonFiniteInput(format!(
            "stimulus size is {stimulus_size}"
        )));
    }
    if let Some(i) = trials.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFiniteInput(format!(
            "trial {i} at size {stimulus_size} is {}",
            trials[i]
        )));
    }

    let n = trials.len() as f64;
    let mean = trials.iter().sum::<f64>() / n;
    let sem = if trials.len() > 1 {
        let var = trials.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        (var / n).sqrt()
    } else {
        0.0
    };

    Ok(TuningSample {
        experiment_type,
        behavioral_state,
        stimulus_size,
        mean_response: mean,
        sem_response: sem,
    })
}

/// Fit every cohort × state group present in `samples`.
pub fn fit_tuning_groups(samples: &[TuningSample], config: &FitterConfig) -> Vec<GroupFit> {
    let mut groups: BTreeMap<TuningGroupKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for s in samples {
        let entry = groups.entry(s.key()).or_default();
        entry.0.push(s.stimulus_size);
        entry.1.push(s.mean_response);
    }

    let groups: Vec<(TuningGroupKey, (Vec<f64>, Vec<f64>))> = groups.into_iter().collect();
    debug!(groups = groups.len(), "fitting tuning groups");

    groups
        .par_iter()
        .map(|(key, (xs, ys))| {
            let result = fit_curve(xs, ys, config);
            if let Err(e) = &result {
                warn!(group = %key, error = %e, "tuning group fit failed");
            }
            let metrics = result.as_ref().ok().map(tuning_metrics);
            GroupFit {
                key: *key,
                n_samples: xs.len(),
                result,
                metrics,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::predict;

    fn sample(et: ExperimentType, bs: BehavioralState, x: f64, y: f64) -> TuningSample {
        TuningSample {
            experiment_type: et,
            behavioral_state: bs,
            stimulus_size: x,
            mean_response: y,
            sem_response: 0.1,
        }
    }

    #[test]
    fn summarize_trials_computes_mean_and_sem() {
        let s = summarize_trials(
            ExperimentType::Control,
            BehavioralState::Active,
            10.0,
            &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert!((s.mean_response - 2.5).abs() < 1e-12);
        // sd = sqrt(5/3), sem = sd / 2
        assert!((s.sem_response - (5.0_f64 / 3.0).sqrt() / 2.0).abs() < 1e-12);

        let single =
            summarize_trials(ExperimentType::Treated, BehavioralState::Quiescent, 5.0, &[3.0])
                .unwrap();
        assert_eq!(single.sem_response, 0.0);
    }

    #[test]
    fn summarize_trials_rejects_empty() {
        let err = summarize_trials(ExperimentType::Control, BehavioralState::Active, 1.0, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn groups_are_fitted_independently_and_in_key_order() {
        let truth = [7.0, 15.0, 0.5, 60.0, 0.2];
        let sizes = [0.0, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0];
        let mut samples = Vec::new();
        // Treated/active has a full curve; control/quiescent only three points.
        for &x in &sizes {
            samples.push(sample(
                ExperimentType::Treated,
                BehavioralState::Active,
                x,
                predict(x, &truth),
            ));
        }
        for &x in &sizes[..3] {
            samples.push(sample(
                ExperimentType::Control,
                BehavioralState::Quiescent,
                x,
                1.0,
            ));
        }

        let fits = fit_tuning_groups(&samples, &FitterConfig::default());
        assert_eq!(fits.len(), 2);
        assert_eq!(fits[0].key.experiment_type, ExperimentType::Control);
        assert_eq!(
            fits[0].result.as_ref().unwrap_err().kind(),
            ErrorKind::InsufficientData
        );
        assert!(fits[0].metrics.is_none());

        assert_eq!(fits[1].key.experiment_type, ExperimentType::Treated);
        assert_eq!(fits[1].n_samples, sizes.len());
        let fit = fits[1].result.as_ref().unwrap();
        assert!(fit.diagnostics.sse < 1e-6);
        assert!(fits[1].metrics.as_ref().unwrap().suppression_index.unwrap() > 0.0);
    }
}
