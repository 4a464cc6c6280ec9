//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate tau grids that seed the nonlinear solver
//! - refine each model of the bank with Levenberg–Marquardt
//! - select the model with the lowest reduced chi-square
//! - collapse near-identical lifetimes
//! - fit whole acquisitions channel by channel (optionally on a worker thread)

pub mod batch;
pub mod collapse;
pub mod fitter;
pub mod lm;
pub mod selection;
pub mod tau_grid;

pub use batch::*;
pub use collapse::*;
pub use fitter::*;
pub use selection::*;
pub use tau_grid::*;
