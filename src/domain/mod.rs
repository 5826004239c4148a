//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - tuning-curve inputs and outputs (`TuningSample`, `FitResult`)
//! - mixed-model inputs and outputs (`ModulationRecord`, `MixedEffectsResult`)
//! - fitter configuration (`FitterConfig`, `MixedModelConfig`, `AnalysisConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
