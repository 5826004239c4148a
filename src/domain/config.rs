//! Tunable settings for both fitters.
//!
//! Every field has a default, and every struct deserializes with missing fields
//! filled from those defaults, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "fitter": { "curve_points": 500 }, "mixed": { "method": "ml" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::EstimationMethod;
use crate::error::AnalysisError;

/// Starting point tuned to z-scored calcium responses of a few units and
/// stimulus sizes up to several hundred (degrees of visual angle).
pub const DEFAULT_INITIAL_GUESS: [f64; 5] = [10.0, 22.0, 10.0, 800.0, 0.0];

/// Visualization resolution of the dense fitted curve.
pub const DEFAULT_CURVE_POINTS: usize = 2000;

/// MINPACK's default tolerance (`sqrt(f64::EPSILON)`, rounded).
pub const DEFAULT_TOLERANCE: f64 = 1.49012e-8;

/// Curve fitter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitterConfig {
    /// `[a, b, c, d, e]` start for the first (always tried) candidate.
    pub initial_guess: [f64; 5],
    /// Number of points in the returned `curve_x` / `curve_y`.
    pub curve_points: usize,
    /// Model evaluation budget per candidate; `200 × (params + 1)`.
    pub max_evaluations: usize,
    /// Relative SSE reduction tolerance.
    pub ftol: f64,
    /// Relative step tolerance.
    pub xtol: f64,
    /// Gradient max-norm tolerance (0 disables the test).
    pub gtol: f64,
    /// Log-grid steps for additional `(b, d)` starts; 0 tries only
    /// `initial_guess`.
    pub scale_grid_steps: usize,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            initial_guess: DEFAULT_INITIAL_GUESS,
            curve_points: DEFAULT_CURVE_POINTS,
            max_evaluations: 200 * (5 + 1),
            ftol: DEFAULT_TOLERANCE,
            xtol: DEFAULT_TOLERANCE,
            gtol: 0.0,
            scale_grid_steps: 12,
        }
    }
}

impl FitterConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.initial_guess.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidConfig(
                "initial_guess must be finite.".into(),
            ));
        }
        if self.initial_guess[1] == 0.0 || self.initial_guess[3] == 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "initial_guess scales b and d must be non-zero.".into(),
            ));
        }
        if self.curve_points < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "curve_points must be >= 2, got {}.",
                self.curve_points
            )));
        }
        if self.max_evaluations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_evaluations must be > 0.".into(),
            ));
        }
        for (name, v) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {v}."
                )));
            }
        }
        if self.scale_grid_steps == 1 {
            return Err(AnalysisError::InvalidConfig(
                "scale_grid_steps must be 0 (disabled) or >= 2.".into(),
            ));
        }
        Ok(())
    }
}

/// Mixed-effects model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixedModelConfig {
    pub method: EstimationMethod,
    /// Level of the fixed factor absorbed into the intercept. Defaults to the
    /// lexicographically first observed level.
    pub reference_level: Option<String>,
    /// Significance level for `FixedEffect::significant`.
    pub alpha: f64,
    /// Log-grid size for the variance-ratio search.
    pub theta_grid_steps: usize,
    pub theta_min: f64,
    pub theta_max: f64,
    /// Golden-section stopping width on `ln θ`.
    pub tolerance: f64,
}

impl Default for MixedModelConfig {
    fn default() -> Self {
        Self {
            method: EstimationMethod::Reml,
            reference_level: None,
            alpha: 0.05,
            theta_grid_steps: 49,
            theta_min: 1e-6,
            theta_max: 1e6,
            tolerance: 1e-10,
        }
    }
}

impl MixedModelConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}.",
                self.alpha
            )));
        }
        if self.theta_grid_steps < 3 {
            return Err(AnalysisError::InvalidConfig(
                "theta_grid_steps must be >= 3.".into(),
            ));
        }
        if !(self.theta_min.is_finite()
            && self.theta_max.is_finite()
            && self.theta_min > 0.0
            && self.theta_max > self.theta_min)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "theta range must satisfy 0 < theta_min < theta_max, got [{}, {}].",
                self.theta_min, self.theta_max
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "tolerance must be finite and > 0.".into(),
            ));
        }
        Ok(())
    }
}

/// Combined settings, usually loaded once per figure script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub fitter: FitterConfig,
    pub mixed: MixedModelConfig,
}

impl AnalysisConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidConfig(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.fitter.validate()?;
        self.mixed.validate()
    }
}
