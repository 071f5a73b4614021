//! Schema module - Configuration, progress and result types.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
