//! Mathematical utilities: grids, least squares, special functions.

pub mod grid;
pub mod ols;
pub mod special;

pub use grid::*;
pub use ols::*;
pub use special::*;
