//! Data sources that do not come from an acquisition file.

pub mod sample;

pub use sample::*;
