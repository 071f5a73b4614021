//! Evolutionary search for agent programs.
//!
//! Genomes are flat symbol images that the engine runs as agent memory.
//! Each generation every genome is simulated alone on a grid world, scored,
//! and the population is rebuilt from the ranking.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): runs the engine per genome and combines
//!   weighted metrics into one score
//! - **Genome Operations** (`genome`): random generation, crossover, and mutation
//! - **Search** (`search`): ranking, selection, replacement and the
//!   generation loop
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_evo::schema::EvolutionConfig;
//! use agent_evo::compute::evolution::EvolutionEngine;
//!
//! let config = EvolutionConfig::default();
//! let mut engine = EvolutionEngine::new(config).expect("valid config");
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: best fitness = {:.3}",
//!             progress.generation, progress.best_fitness);
//!     })
//!     .expect("evolution failed");
//!
//! println!("Best genome fitness: {:.3}", result.best.fitness);
//! ```
//!
//! # Fitness Metrics
//!
//! - `FoodEaten`: food items the agent consumed
//! - `Survival`: fraction of ticks the agent stayed alive
//! - `Exploration`: fraction of grid cells the agent visited
//!
//! # Replacement Policies
//!
//! - `Elitist`: eliminated rank `i` takes the survivor at rank `size - 1 - i`
//! - `WinnerTakesAll`: every eliminated slot takes the best genome

mod fitness;
mod genome;
mod search;

pub use fitness::{BehaviorStats, Evaluation, FitnessEvaluator, MetricResult};
pub use genome::{GeneticOperators, GenomeRng, crossover_at};
pub use search::{
    EvolutionEngine, EvolutionError, Generation, evolve_one_generation, rank, replace, select,
    survivor_count,
};
