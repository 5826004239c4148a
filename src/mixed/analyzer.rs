//! Mixed-effects analysis of modulation / suppression indices.
//!
//! Model: `response ~ experiment_type + (1 | mouse:field_of_view)`.
//!
//! Cells recorded in the same field of view share a random intercept, so the
//! cohort comparison is not inflated by treating every cell as independent.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::domain::{
    EstimationMethod, FixedEffect, GroupEffect, LikelihoodRatioTest, MixedEffectsResult,
    MixedModelConfig, ModulationRecord,
};
use crate::error::AnalysisError;
use crate::math::{chi2_sf, two_sided_normal_p};
use crate::mixed::design::{MixedDesign, build_design};
use crate::mixed::reml::optimize_theta;

pub const DEFAULT_FACTOR_NAME: &str = "experiment_type";

/// Fits `response ~ factor + (1 | outer:inner)`.
#[derive(Debug, Clone)]
pub struct MixedEffectsAnalyzer {
    config: MixedModelConfig,
    factor_name: String,
}

impl Default for MixedEffectsAnalyzer {
    fn default() -> Self {
        Self::new(MixedModelConfig::default())
    }
}

impl MixedEffectsAnalyzer {
    pub fn new(config: MixedModelConfig) -> Self {
        Self {
            config,
            factor_name: DEFAULT_FACTOR_NAME.to_string(),
        }
    }

    /// Name used for fixed-effect columns, e.g. `"experiment_type[treated]"`.
    pub fn with_factor_name(mut self, name: impl Into<String>) -> Self {
        self.factor_name = name.into();
        self
    }

    pub fn config(&self) -> &MixedModelConfig {
        &self.config
    }

    /// Fit the model to parallel arrays.
    ///
    /// `group_outer` is the mouse, `group_inner` the field of view; field-of-view
    /// ids must not be reused across mice.
    pub fn fit<S: AsRef<str>>(
        &self,
        response: &[f64],
        fixed_factor: &[S],
        group_outer: &[S],
        group_inner: &[S],
    ) -> Result<MixedEffectsResult, AnalysisError> {
        self.config.validate()?;
        let design = self.design(response, fixed_factor, group_outer, group_inner)?;
        self.fit_design(&design, self.config.method)
    }

    /// Fit from records (row identity = position in `records`).
    pub fn fit_records(
        &self,
        records: &[ModulationRecord],
    ) -> Result<MixedEffectsResult, AnalysisError> {
        let (response, fixed, outer, inner) = columns(records);
        self.fit(&response, &fixed, &outer, &inner)
    }

    /// Likelihood-ratio test of the fixed factor.
    ///
    /// Both models are fitted by ML regardless of the configured method: REML
    /// criteria of models with different fixed effects are not comparable.
    pub fn likelihood_ratio_test<S: AsRef<str>>(
        &self,
        response: &[f64],
        fixed_factor: &[S],
        group_outer: &[S],
        group_inner: &[S],
    ) -> Result<LikelihoodRatioTest, AnalysisError> {
        self.config.validate()?;
        let design = self.design(response, fixed_factor, group_outer, group_inner)?;
        let full = self.fit_design(&design, EstimationMethod::Ml)?;
        let null = self.fit_design(&design.intercept_only(), EstimationMethod::Ml)?;

        let statistic = (2.0 * (full.log_likelihood - null.log_likelihood)).max(0.0);
        let df = design.n_fixed() - 1;
        let p_value = chi2_sf(statistic, df as f64);
        debug!(statistic, df, p_value, "likelihood ratio test");

        Ok(LikelihoodRatioTest {
            statistic,
            df,
            p_value,
            log_likelihood_full: full.log_likelihood,
            log_likelihood_null: null.log_likelihood,
        })
    }

    fn design<S: AsRef<str>>(
        &self,
        response: &[f64],
        fixed_factor: &[S],
        group_outer: &[S],
        group_inner: &[S],
    ) -> Result<MixedDesign, AnalysisError> {
        build_design(
            response,
            fixed_factor,
            group_outer,
            group_inner,
            &self.factor_name,
            self.config.reference_level.as_deref(),
        )
    }

    fn fit_design(
        &self,
        design: &MixedDesign,
        method: EstimationMethod,
    ) -> Result<MixedEffectsResult, AnalysisError> {
        let n = design.n_obs();
        let p = design.n_fixed();
        debug!(
            n_obs = n,
            n_fixed = p,
            n_groups = design.groups.len(),
            method = method.display_name(),
            "fitting mixed-effects model"
        );

        let search = optimize_theta(design, method, &self.config)?;
        let best = &search.best;

        let mut warnings = Vec::new();
        if search.at_lower_boundary {
            let msg = "boundary (singular) fit: random-effect variance estimated as 0";
            warn!("{msg}");
            warnings.push(msg.to_string());
        }
        if search.at_upper_bound {
            let msg = format!(
                "variance ratio reached the search bound {:.3e}; residual variance is poorly identified",
                self.config.theta_max
            );
            warn!("{msg}");
            warnings.push(msg);
        }

        let fixed_effects: Vec<FixedEffect> = design
            .column_names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let estimate = best.beta[j];
                let std_error = (best.sigma2 * best.xtwx_inverse[(j, j)]).sqrt();
                let z_value = estimate / std_error;
                let p_value = two_sided_normal_p(z_value);
                FixedEffect {
                    name: name.clone(),
                    estimate,
                    std_error,
                    z_value,
                    p_value,
                    significant: p_value < self.config.alpha,
                }
            })
            .collect();

        let random_effects = design
            .groups
            .iter()
            .map(|g| {
                let n_g = g.rows.len() as f64;
                let sr: f64 = g.rows.iter().map(|&row| best.residuals[row]).sum();
                GroupEffect {
                    mouse_id: g.outer.clone(),
                    field_of_view_id: g.inner.clone(),
                    n_obs: g.rows.len(),
                    intercept: best.theta / (1.0 + n_g * best.theta) * sr,
                }
            })
            .collect();

        // β, σ², σ²_u
        let n_params = (p + 2) as f64;
        let log_likelihood = -0.5 * best.deviance;

        Ok(MixedEffectsResult {
            method,
            fixed_effects,
            random_effect_variance: best.theta * best.sigma2,
            residual_variance: best.sigma2,
            theta: best.theta,
            log_likelihood,
            aic: best.deviance + 2.0 * n_params,
            bic: best.deviance + n_params * (n as f64).ln(),
            n_obs: n,
            n_groups: design.groups.len(),
            reference_level: design.factor.levels[0].clone(),
            random_effects,
            singular: search.at_lower_boundary,
            warnings,
        })
    }
}

fn columns(records: &[ModulationRecord]) -> (Vec<f64>, Vec<&str>, Vec<&str>, Vec<&str>) {
    let response = records.iter().map(|r| r.value).collect();
    let fixed = records.iter().map(|r| r.experiment_type.as_str()).collect();
    let outer = records.iter().map(|r| r.mouse_id.as_str()).collect();
    let inner = records.iter().map(|r| r.field_of_view_id.as_str()).collect();
    (response, fixed, outer, inner)
}

/// A set of modulation records ready for mixed-effects analysis.
#[derive(Debug, Clone, Default)]
pub struct ModulationDataset {
    records: Vec<ModulationRecord>,
}

impl ModulationDataset {
    pub fn new(records: Vec<ModulationRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: ModulationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ModulationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only cells flagged as significantly modulated.
    pub fn significant_only(&self) -> ModulationDataset {
        ModulationDataset {
            records: self
                .records
                .iter()
                .filter(|r| r.is_significant)
                .cloned()
                .collect(),
        }
    }

    /// Distinct fixed-factor levels present, sorted.
    pub fn levels(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.experiment_type.as_str())
            .collect();
        set.into_iter().collect()
    }

    pub fn fit(&self, analyzer: &MixedEffectsAnalyzer) -> Result<MixedEffectsResult, AnalysisError> {
        analyzer.fit_records(&self.records)
    }

    pub fn likelihood_ratio_test(
        &self,
        analyzer: &MixedEffectsAnalyzer,
    ) -> Result<LikelihoodRatioTest, AnalysisError> {
        let (response, fixed, outer, inner) = columns(&self.records);
        analyzer.likelihood_ratio_test(&response, &fixed, &outer, &inner)
    }
}

impl FromIterator<ModulationRecord> for ModulationDataset {
    fn from_iter<I: IntoIterator<Item = ModulationRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
