//! Fitness evaluation for evolutionary search.
//!
//! Bridges "run the engine for N ticks" to the scalar score the genetic
//! algorithm ranks by. Every genome runs alone on a fresh grid world.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::{
    Agent, AgentOutcome, Engine, EngineError, GridWorld, GridWorldState, PeriodicFoodSpawner,
    RunState, Symbol, TickResult, grid,
};
use crate::schema::{
    EvaluationConfig, EvolutionConfig, FitnessConfig, FitnessMetric, Genome, GridConfig,
    InstructionCosts,
};

/// Evaluates a genome and returns fitness scores.
pub struct FitnessEvaluator {
    grid: GridConfig,
    costs: InstructionCosts,
    config: FitnessConfig,
    eval_config: EvaluationConfig,
    food_seed: u64,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator. Every evaluation replays the same
    /// food sequence, derived from `food_seed`.
    pub fn new(
        grid: GridConfig,
        costs: InstructionCosts,
        config: FitnessConfig,
        eval_config: EvaluationConfig,
        food_seed: u64,
    ) -> Self {
        Self {
            grid,
            costs,
            config,
            eval_config,
            food_seed,
        }
    }

    /// Build an evaluator from the relevant parts of an evolution config.
    pub fn from_config(config: &EvolutionConfig, food_seed: u64) -> Self {
        Self::new(
            config.grid,
            config.costs.clone(),
            config.fitness.clone(),
            config.evaluation.clone(),
            food_seed,
        )
    }

    /// Run `genome` for the configured number of ticks and score it.
    pub fn evaluate(&self, genome: &[Symbol]) -> Result<Evaluation, EngineError> {
        let cells = self.grid.cell_count();
        let (col, row) = self.eval_config.start;
        let start = grid::to_1d(col, row, self.grid.columns);

        let world = GridWorldState::new(self.grid, vec![start])?;
        let mut run = RunState::new(vec![Agent::new(genome.to_vec())], world)?;
        let spawner = PeriodicFoodSpawner::new(self.eval_config.food_interval, cells, self.food_seed);
        let mut engine = Engine::new(GridWorld::new(spawner), self.costs.clone())?;

        let mut trajectory = EvaluationTrajectory::new(cells, start);
        engine.run_ticks(self.eval_config.ticks, &mut run, |result| {
            trajectory.record(result)
        });

        let behavior = trajectory.to_behavior_stats(run.world());

        let metrics: Vec<MetricResult> = self
            .config
            .metrics
            .iter()
            .map(|weighted| MetricResult {
                metric: weighted.metric,
                score: compute_metric(weighted.metric, &behavior, self.eval_config.ticks, cells),
                weight: weighted.weight,
            })
            .collect();

        // Weighted mean
        let total_weight: f64 = metrics.iter().map(|m| m.weight).sum();
        let fitness = metrics.iter().map(|m| m.score * m.weight).sum::<f64>() / total_weight.max(1e-6);

        Ok(Evaluation {
            fitness,
            metrics,
            behavior,
        })
    }

    /// Fitness of every genome, in population order.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn evaluate_population(&self, population: &[Genome]) -> Result<Vec<f64>, EngineError> {
        // Parallel evaluation; indexed collect keeps the input order.
        population
            .par_iter()
            .map(|genome| self.evaluate(genome).map(|e| e.fitness))
            .collect()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn evaluate_population(&self, population: &[Genome]) -> Result<Vec<f64>, EngineError> {
        // Sequential evaluation for WASM
        population
            .iter()
            .map(|genome| self.evaluate(genome).map(|e| e.fitness))
            .collect()
    }
}

/// Full outcome of evaluating one genome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Combined fitness.
    pub fitness: f64,
    /// Individual metric results.
    pub metrics: Vec<MetricResult>,
    /// What the agent did.
    pub behavior: BehaviorStats,
}

/// Result of evaluating a single metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: FitnessMetric,
    pub score: f64,
    pub weight: f64,
}

/// Behavioral summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorStats {
    /// Food items eaten.
    pub food_eaten: u32,
    /// Ticks at whose end the agent was alive.
    pub ticks_alive: u64,
    /// Distinct cells occupied while alive, start included.
    pub cells_visited: usize,
    /// Instructions executed.
    pub instructions: u64,
    /// Whether the agent died during the run.
    pub died: bool,
}

/// Per-tick observations collected through the engine's tick observer.
struct EvaluationTrajectory {
    visited: Vec<bool>,
    ticks_alive: u64,
    instructions: u64,
}

impl EvaluationTrajectory {
    fn new(cells: usize, start: usize) -> Self {
        let mut visited = vec![false; cells];
        visited[start] = true;
        Self {
            visited,
            ticks_alive: 0,
            instructions: 0,
        }
    }

    fn record(&mut self, result: &TickResult<'_, GridWorldState>) {
        if matches!(result.outcomes.first(), Some(AgentOutcome::Executed(_))) {
            self.instructions += 1;
        }
        if result.agents.first().is_some_and(|a| a.alive) {
            self.ticks_alive += 1;
            if let Some(&position) = result.world.positions().first() {
                self.visited[position] = true;
            }
        }
    }

    fn to_behavior_stats(&self, world: &GridWorldState) -> BehaviorStats {
        BehaviorStats {
            food_eaten: world.food_eaten().first().copied().unwrap_or(0),
            ticks_alive: self.ticks_alive,
            cells_visited: self.visited.iter().filter(|&&v| v).count(),
            instructions: self.instructions,
            died: !world.alive().first().copied().unwrap_or(false),
        }
    }
}

/// Compute a single fitness metric.
fn compute_metric(metric: FitnessMetric, behavior: &BehaviorStats, ticks: u64, cells: usize) -> f64 {
    match metric {
        FitnessMetric::FoodEaten => f64::from(behavior.food_eaten),
        FitnessMetric::Survival => behavior.ticks_alive as f64 / ticks.max(1) as f64,
        FitnessMetric::Exploration => behavior.cells_visited as f64 / cells.max(1) as f64,
    }
}
