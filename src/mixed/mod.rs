//! Linear mixed-effects model with one nested random intercept.
//!
//! - `design`: factor coding, nesting validation, random-effect groups
//! - `reml`: profiled REML / ML criterion and the variance-ratio search
//! - `analyzer`: public entry points and result assembly

pub mod analyzer;
pub mod design;
pub mod reml;

pub use analyzer::*;
