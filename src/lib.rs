//! Agent Evo - Self-modifying grid agents and the genetic search that breeds them.
//!
//! Agents are small programs whose code and data share one flat memory. An
//! engine steps every agent one instruction per tick in lock-step, then hands
//! the collected actions to a world model. A genetic algorithm evolves the
//! memory images by simulating each one and ranking them on fitness.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, progress and result types
//! - `compute`: Instruction set, engine, grid world and evolutionary search
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_evo::{
//!     compute::{Agent, Engine, GridWorld, GridWorldState, Opcode, PeriodicFoodSpawner, RunState},
//!     schema::{GridConfig, InstructionCosts},
//! };
//!
//! let grid = GridConfig::new(10, 10);
//! let program = vec![Opcode::Right.symbol(), Opcode::Down.symbol()];
//!
//! let world = GridWorldState::new(grid, vec![0]).unwrap();
//! let mut run = RunState::new(vec![Agent::new(program)], world).unwrap();
//!
//! let spawner = PeriodicFoodSpawner::new(10, grid.cell_count(), 42);
//! let mut engine = Engine::new(GridWorld::new(spawner), InstructionCosts::default()).unwrap();
//! engine.run_ticks(100, &mut run, |_| {});
//!
//! println!("Food eaten: {:?}", run.world().food_eaten());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Agent, Engine, GridWorld, GridWorldState, RunState};
pub use schema::{EvolutionConfig, GridConfig, InstructionCosts};
