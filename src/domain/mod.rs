//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - fitting inputs (`DecayCurve`) and engine tunables (`FitOptions`)
//! - the model identifiers (`ModelKind`)
//! - fit outputs (`FitResult`, `ModelScore`)
//! - the run configuration assembled from CLI flags (`FitConfig`)

pub mod types;

pub use types::*;
