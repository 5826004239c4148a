//! Erf-difference tuning-curve model.
//!
//! Implemented as small, pure functions so the fitting code can stay generic
//! over how parameters are seeded and refined.

pub mod model;

pub use model::*;
