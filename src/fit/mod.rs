//! Tuning-curve fitting.
//!
//! Responsibilities:
//!
//! - fit the erf-difference model to one condition (`fitter`)
//! - fit every cohort × state group in a dataset (`groups`)
//! - derive size-tuning metrics from a fitted curve (`metrics`)

pub mod fitter;
pub mod groups;
pub mod metrics;

pub use fitter::*;
pub use groups::*;
pub use metrics::*;
