//! Compute module - Agent virtual machine, world model and evolution.

mod engine;
mod isa;
mod world;

pub mod evolution;
pub mod grid;

pub use engine::*;
pub use isa::*;
pub use world::*;
