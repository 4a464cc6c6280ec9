//! Input/output helpers.
//!
//! - acquisition file codec (`spc`)
//! - JSON-safe fit records (`record`)
//! - batch result JSON read/write (`results`)
//! - per-channel CSV exports (`export`)

pub mod export;
pub mod record;
pub mod results;
pub mod spc;

pub use export::*;
pub use record::*;
pub use results::*;
pub use spc::*;
