//! `flim-fit` library crate.
//!
//! The binary (`flimfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitting engine is reusable from other front ends (GUI, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
