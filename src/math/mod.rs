//! Mathematical utilities: least squares, fit statistics, phasors.

pub mod ols;
pub mod phasor;
pub mod stats;

pub use ols::*;
pub use phasor::*;
pub use stats::*;
