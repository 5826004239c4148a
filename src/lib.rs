//! `tuning-stats` library crate.
//!
//! Statistical back end for size-tuning figures:
//!
//! - fit the erf-difference tuning model `a·(erf(x/b) − c·erf(x/d)) + e` to
//!   mean responses and return a dense fitted curve (`fit`)
//! - test an experiment-type effect on modulation values with a linear mixed
//!   model carrying a random intercept per mouse:field-of-view (`mixed`)
//!
//! Plotting, file parsing and figure layout live with the caller; everything
//! here works on in-memory vectors.

pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod mixed;
pub mod models;
pub mod report;

pub use domain::{
    AnalysisConfig, FitResult, FitterConfig, MixedEffectsResult, MixedModelConfig,
    ModulationRecord,
};
pub use error::{AnalysisError, ErrorKind};
pub use fit::{CurveFitter, fit_curve};
pub use mixed::{MixedEffectsAnalyzer, ModulationDataset};
