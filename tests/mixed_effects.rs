use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use tuning_stats::domain::EstimationMethod;
use tuning_stats::report::format_mixed_summary;
use tuning_stats::{
    ErrorKind, MixedEffectsAnalyzer, MixedModelConfig, ModulationDataset, ModulationRecord,
};

/// Two cohorts × 4 mice × 3 fields of view × 5 cells, with a per-field offset.
fn simulated(seed: u64, treated_shift: f64) -> ModulationDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let field = Normal::new(0.0, 0.5).unwrap();
    let cell = Normal::new(0.0, 0.3).unwrap();

    let mut records = Vec::new();
    for cohort in ["control", "treated"] {
        let shift = if cohort == "treated" { treated_shift } else { 0.0 };
        for mouse in 0..4 {
            let mouse_id = format!("{cohort}-m{mouse}");
            for fov in 0..3 {
                let fov_id = format!("{mouse_id}-f{fov}");
                let offset = field.sample(&mut rng);
                for c in 0..5 {
                    records.push(ModulationRecord {
                        value: 0.2 + shift + offset + cell.sample(&mut rng),
                        experiment_type: cohort.to_string(),
                        mouse_id: mouse_id.clone(),
                        field_of_view_id: fov_id.clone(),
                        is_significant: c % 2 == 0,
                    });
                }
            }
        }
    }
    ModulationDataset::new(records)
}

#[test]
fn nested_random_intercept_recovers_cohort_shift() {
    let data = simulated(3, 1.0);
    let res = data.fit(&MixedEffectsAnalyzer::default()).unwrap();

    assert_eq!(res.method, EstimationMethod::Reml);
    assert_eq!(res.n_obs, 120);
    assert_eq!(res.n_groups, 24);
    assert_eq!(res.reference_level, "control");
    assert!(!res.singular);

    let treated = res.effect_for_level("treated").unwrap();
    assert_eq!(treated.name, "experiment_type[treated]");
    assert!((treated.estimate - 1.0).abs() < 0.8, "estimate = {}", treated.estimate);
    assert!(treated.std_error > 0.0);

    assert!(res.random_effect_variance > 0.05 && res.random_effect_variance < 1.0);
    assert!(res.residual_variance > 0.05 && res.residual_variance < 0.15);
    assert!(res.aic < res.bic);

    let summary = format_mixed_summary(&res);
    assert!(summary.contains("experiment_type[treated]"));
}

#[test]
fn row_order_and_reruns_do_not_change_the_fit() {
    let data = simulated(5, 0.5);
    let analyzer = MixedEffectsAnalyzer::default();
    let a = data.fit(&analyzer).unwrap();
    let b = data.fit(&analyzer).unwrap();
    assert_eq!(a, b);

    let reversed: ModulationDataset = data.records().iter().rev().cloned().collect();
    let c = reversed.fit(&analyzer).unwrap();
    for (x, y) in a.fixed_effects.iter().zip(c.fixed_effects.iter()) {
        assert_eq!(x.name, y.name);
        assert!((x.estimate - y.estimate).abs() < 1e-6);
    }
    assert!((a.residual_variance - c.residual_variance).abs() < 1e-6);
}

#[test]
fn reference_level_override_flips_the_contrast() {
    let data = simulated(9, 0.8);
    let default_fit = data.fit(&MixedEffectsAnalyzer::default()).unwrap();

    let config = MixedModelConfig {
        reference_level: Some("treated".into()),
        ..MixedModelConfig::default()
    };
    let flipped = data.fit(&MixedEffectsAnalyzer::new(config)).unwrap();
    assert_eq!(flipped.reference_level, "treated");

    let forward = default_fit.effect_for_level("treated").unwrap().estimate;
    let backward = flipped.effect_for_level("control").unwrap().estimate;
    assert!((forward + backward).abs() < 1e-6);
}

#[test]
fn likelihood_ratio_test_detects_a_large_shift() {
    let data = simulated(21, 3.0);
    let lrt = data
        .likelihood_ratio_test(&MixedEffectsAnalyzer::default())
        .unwrap();
    assert_eq!(lrt.df, 1);
    assert!(lrt.statistic > 10.0);
    assert!(lrt.p_value < 1e-3);
    assert!(lrt.log_likelihood_full > lrt.log_likelihood_null);
}

#[test]
fn significant_subset_is_still_estimable() {
    let data = simulated(13, 1.0);
    let subset = data.significant_only();
    assert_eq!(subset.len(), 72);
    let res = subset.fit(&MixedEffectsAnalyzer::default()).unwrap();
    assert_eq!(res.n_obs, 72);
    assert_eq!(res.n_groups, 24);
}

#[test]
fn fields_of_view_shared_across_mice_are_rejected() {
    let mut records: Vec<ModulationRecord> = simulated(1, 0.0).records().to_vec();
    records[0].field_of_view_id = records[records.len() - 1].field_of_view_id.clone();
    let err = ModulationDataset::new(records)
        .fit(&MixedEffectsAnalyzer::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGrouping);
}

#[test]
fn a_single_field_of_view_cannot_carry_a_random_intercept() {
    let records: Vec<ModulationRecord> = (0..10)
        .map(|i| ModulationRecord {
            value: i as f64 * 0.1,
            experiment_type: if i < 5 { "control" } else { "treated" }.to_string(),
            mouse_id: "m1".into(),
            field_of_view_id: "f1".into(),
            is_significant: true,
        })
        .collect();
    let err = ModulationDataset::new(records)
        .fit(&MixedEffectsAnalyzer::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SingularFit);
}
