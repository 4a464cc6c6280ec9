//! Multi-exponential decay model bank.
//!
//! Models are small, pure functions collected in a fixed table so that
//! fitting/search code can stay generic.

pub mod model;

pub use model::*;
