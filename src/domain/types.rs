//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - built by plotting / orchestration code from loaded result files
//! - returned from the fitters as plain data
//! - dumped to JSON for inspection alongside a figure

use std::fmt;

use serde::{Deserialize, Serialize};

/// Experimental cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentType {
    Control,
    Treated,
}

impl ExperimentType {
    pub const ALL: [ExperimentType; 2] = [ExperimentType::Control, ExperimentType::Treated];

    pub fn label(self) -> &'static str {
        match self {
            ExperimentType::Control => "control",
            ExperimentType::Treated => "treated",
        }
    }
}

impl fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Locomotion state the responses were recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehavioralState {
    Active,
    Quiescent,
}

impl BehavioralState {
    pub const ALL: [BehavioralState; 2] = [BehavioralState::Active, BehavioralState::Quiescent];

    pub fn label(self) -> &'static str {
        match self {
            BehavioralState::Active => "active",
            BehavioralState::Quiescent => "quiescent",
        }
    }
}

impl fmt::Display for BehavioralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies one tuning curve: cohort × behavioral state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TuningGroupKey {
    pub experiment_type: ExperimentType,
    pub behavioral_state: BehavioralState,
}

impl fmt::Display for TuningGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.experiment_type, self.behavioral_state)
    }
}

/// Population response to one stimulus condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSample {
    pub experiment_type: ExperimentType,
    pub behavioral_state: BehavioralState,
    pub stimulus_size: f64,
    pub mean_response: f64,
    pub sem_response: f64,
}

impl TuningSample {
    pub fn key(&self) -> TuningGroupKey {
        TuningGroupKey {
            experiment_type: self.experiment_type,
            behavioral_state: self.behavioral_state,
        }
    }
}

/// Why the Levenberg–Marquardt loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Relative actual and predicted SSE reductions fell below `ftol`.
    SseTolerance,
    /// Relative step size fell below `xtol`.
    StepTolerance,
    /// Gradient max-norm fell below `gtol`.
    GradientTolerance,
    /// Residuals are exactly zero.
    ExactFit,
}

/// Solver diagnostics returned with every curve fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub sse: f64,
    pub rmse: f64,
    /// `1 - SSE/SST`; `None` when the responses are constant.
    pub r_squared: Option<f64>,
    /// Model evaluations spent on the chosen candidate.
    pub evaluations: usize,
    /// Accepted steps on the chosen candidate.
    pub iterations: usize,
    pub termination: Termination,
    pub candidates_tried: usize,
    pub candidates_converged: usize,
    /// Index of the winning start; 0 is the configured initial guess.
    pub chosen_candidate: usize,
    /// Standard errors from `s² (JᵀJ)⁻¹`, in `[a, b, c, d, e]` order.
    pub param_std_errors: Option<[f64; 5]>,
    pub warnings: Vec<String>,
}

/// Fitted erf-difference tuning curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// `[a, b, c, d, e]` of `a·(erf(x/b) − c·erf(x/d)) + e`.
    pub parameters: [f64; 5],
    pub curve_x: Vec<f64>,
    pub curve_y: Vec<f64>,
    pub diagnostics: FitDiagnostics,
}

impl FitResult {
    /// Evaluate the fitted model at an arbitrary x.
    pub fn evaluate(&self, x: f64) -> f64 {
        crate::models::predict(x, &self.parameters)
    }
}

/// One cell's modulation (or suppression) index with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationRecord {
    pub value: f64,
    pub experiment_type: String,
    pub mouse_id: String,
    pub field_of_view_id: String,
    pub is_significant: bool,
}

/// How variance components are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    #[default]
    Reml,
    Ml,
}

impl EstimationMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            EstimationMethod::Reml => "REML",
            EstimationMethod::Ml => "ML",
        }
    }
}

/// A fixed-effect coefficient with its Wald test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEffect {
    /// `"(Intercept)"` or `"<factor>[<level>]"`.
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Conditional mode (BLUP) of one random intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEffect {
    pub mouse_id: String,
    pub field_of_view_id: String,
    pub n_obs: usize,
    pub intercept: f64,
}

/// Fitted `response ~ factor + (1 | mouse:field_of_view)` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedEffectsResult {
    pub method: EstimationMethod,
    pub fixed_effects: Vec<FixedEffect>,
    /// Variance of the per-(mouse, field of view) random intercept.
    pub random_effect_variance: f64,
    pub residual_variance: f64,
    /// `random_effect_variance / residual_variance`.
    pub theta: f64,
    /// REML or ML log-likelihood depending on `method`.
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub n_obs: usize,
    pub n_groups: usize,
    pub reference_level: String,
    pub random_effects: Vec<GroupEffect>,
    /// Random-effect variance estimated on the boundary (zero).
    pub singular: bool,
    pub warnings: Vec<String>,
}

impl MixedEffectsResult {
    /// Look up a fixed effect by its level name (without the factor prefix).
    pub fn effect_for_level(&self, level: &str) -> Option<&FixedEffect> {
        self.fixed_effects
            .iter()
            .find(|fe| fe.name.ends_with(&format!("[{level}]")))
    }
}

/// Likelihood-ratio test of the fixed factor against an intercept-only model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelihoodRatioTest {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
    pub log_likelihood_full: f64,
    pub log_likelihood_null: f64,
}
