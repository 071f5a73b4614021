//! Evolution configuration types for discovering agent programs.
//!
//! This module provides types for configuring the genetic algorithm that
//! evolves agent genomes, and the progress/result types it reports.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compute::Symbol;

use super::{ConfigError, GridConfig, InstructionCosts};

/// An agent genome: one flat code-and-data memory image.
pub type Genome = Vec<Symbol>;

/// Top-level configuration for an evolutionary run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Grid every candidate is evaluated on.
    #[serde(default)]
    pub grid: GridConfig,
    /// Tick cost of every opcode.
    #[serde(default)]
    pub costs: InstructionCosts,
    /// Genome length and symbol pool.
    #[serde(default)]
    pub genome: GenomeConstraints,
    /// Selection, replacement, crossover and mutation settings.
    #[serde(default)]
    pub algorithm: GeneticAlgorithmConfig,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Evaluation settings (ticks per candidate, food, start cell).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Fitness metrics and their weights.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            costs: InstructionCosts::default(),
            genome: GenomeConstraints::default(),
            algorithm: GeneticAlgorithmConfig::default(),
            population: PopulationConfig::default(),
            evaluation: EvaluationConfig::default(),
            fitness: FitnessConfig::default(),
            random_seed: None,
        }
    }
}

/// How random genomes and mutated symbols are drawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeConstraints {
    /// Number of symbols per genome. Fixed for the whole run.
    #[serde(default = "default_genome_length")]
    pub length: usize,
    /// Probability that a drawn symbol is an integer operand in
    /// `[0, length)` instead of an opcode.
    #[serde(default)]
    pub operand_probability: f64,
}

impl Default for GenomeConstraints {
    fn default() -> Self {
        Self {
            length: default_genome_length(),
            operand_probability: 0.0,
        }
    }
}

fn default_genome_length() -> usize {
    100
}

/// Policy for refilling eliminated population slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// Slot at eliminated rank `i` takes the genome at rank `size - 1 - i`.
    #[default]
    Elitist,
    /// Every eliminated slot takes the best genome.
    WinnerTakesAll,
}

/// Genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Fraction of the ranked population that survives selection, in (0, 1].
    #[serde(default = "default_selection_rate")]
    pub selection_rate: f64,
    /// Per-genome probability of a single-symbol mutation, in [0, 1].
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// How eliminated slots are refilled.
    #[serde(default)]
    pub replacement: ReplacementPolicy,
    /// Parents per crossover event. Only 2 is supported.
    #[serde(default = "default_crossover_parents")]
    pub crossover_parents: usize,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            selection_rate: default_selection_rate(),
            mutation_rate: default_mutation_rate(),
            replacement: ReplacementPolicy::default(),
            crossover_parents: default_crossover_parents(),
        }
    }
}

fn default_selection_rate() -> f64 {
    0.8
}
fn default_mutation_rate() -> f64 {
    0.1
}
fn default_crossover_parents() -> usize {
    2
}

impl GeneticAlgorithmConfig {
    /// Validate rates and crossover arity.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.crossover_parents != 2 {
            return Err(EvolutionConfigError::UnsupportedCrossoverArity(
                self.crossover_parents,
            ));
        }
        if !(self.selection_rate > 0.0 && self.selection_rate <= 1.0) {
            return Err(EvolutionConfigError::InvalidRate {
                name: "selection_rate",
                value: self.selection_rate,
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionConfigError::InvalidRate {
                name: "mutation_rate",
                value: self.mutation_rate,
            });
        }
        Ok(())
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of genomes. Constant for the whole run.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Number of generations to run.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Progress is reported every this many generations.
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            generations: default_generations(),
            report_interval: default_report_interval(),
        }
    }
}

fn default_population_size() -> usize {
    1000
}
fn default_generations() -> usize {
    1000
}
fn default_report_interval() -> usize {
    100
}

/// Evaluation settings for fitness computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ticks each candidate is simulated for.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// One food item spawns every this many ticks (0 disables food).
    #[serde(default = "default_food_interval")]
    pub food_interval: u64,
    /// Starting cell `(col, row)`.
    #[serde(default)]
    pub start: (usize, usize),
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            food_interval: default_food_interval(),
            start: (0, 0),
        }
    }
}

fn default_ticks() -> u64 {
    100
}
fn default_food_interval() -> u64 {
    10
}

/// Fitness configuration with weighted metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Fitness metrics and their weights.
    pub metrics: Vec<WeightedMetric>,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            metrics: vec![
                WeightedMetric {
                    metric: FitnessMetric::FoodEaten,
                    weight: 1.0,
                },
                WeightedMetric {
                    metric: FitnessMetric::Survival,
                    weight: 0.1,
                },
            ],
        }
    }
}

/// A fitness metric with associated weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedMetric {
    /// The fitness metric.
    pub metric: FitnessMetric,
    /// Weight for this metric in combined fitness.
    pub weight: f64,
}

/// Individual fitness metrics for evaluating a genome's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitnessMetric {
    /// Number of food items eaten.
    FoodEaten,
    /// Fraction of ticks the agent was alive at the end of.
    Survival,
    /// Distinct cells visited divided by the cell count.
    Exploration,
}

// ============================================================================
// Progress and results
// ============================================================================

/// Fitness history over generations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Mean fitness per generation.
    pub avg_fitness: Vec<f64>,
}

/// Progress snapshot passed to the callback after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generations completed.
    pub generation: usize,
    /// Generations requested.
    pub total_generations: usize,
    /// Best fitness of the generation just evaluated.
    pub generation_best: f64,
    /// Mean fitness of the generation just evaluated.
    pub avg_fitness: f64,
    /// Best fitness seen so far.
    pub best_fitness: f64,
    /// Genome that scored `generation_best`.
    pub best_genome: Genome,
}

/// A genome together with its evaluated fitness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub genome: Genome,
    pub fitness: f64,
}

/// Final result of an evolutionary run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate of the final population.
    pub best: CandidateSnapshot,
    /// Final population in rank order.
    pub population: Vec<CandidateSnapshot>,
    /// Run statistics.
    pub stats: EvolutionStats,
    /// Fitness history.
    pub history: EvolutionHistory,
}

/// Statistics about an evolutionary run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations completed.
    pub generations: usize,
    /// Total fitness evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved at any generation.
    pub best_fitness: f64,
    /// Average fitness of final population.
    pub final_avg_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Crossover needs exactly 2 parents, got {0}")]
    UnsupportedCrossoverArity(usize),
    #[error("{name} out of range: {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Genome length must be positive")]
    EmptyGenome,
    #[error("Evaluation ticks must be positive")]
    InvalidTicks,
    #[error("Start cell ({0}, {1}) lies outside the grid")]
    InvalidStart(usize, usize),
    #[error("No fitness metrics specified")]
    NoMetrics,
    #[error("Invalid metric weight: {0}")]
    InvalidWeight(f64),
    #[error("Base config validation failed: {0}")]
    BaseConfigError(#[from] ConfigError),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EvolutionConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EvolutionConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.grid.validate()?;
        self.costs.validate()?;
        self.algorithm.validate()?;

        if self.population.size < 2 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        if self.genome.length == 0 {
            return Err(EvolutionConfigError::EmptyGenome);
        }
        if !(0.0..=1.0).contains(&self.genome.operand_probability) {
            return Err(EvolutionConfigError::InvalidRate {
                name: "operand_probability",
                value: self.genome.operand_probability,
            });
        }

        if self.evaluation.ticks == 0 {
            return Err(EvolutionConfigError::InvalidTicks);
        }
        let (col, row) = self.evaluation.start;
        if col >= self.grid.columns || row >= self.grid.rows {
            return Err(EvolutionConfigError::InvalidStart(col, row));
        }

        if self.fitness.metrics.is_empty() {
            return Err(EvolutionConfigError::NoMetrics);
        }
        for m in &self.fitness.metrics {
            if !(m.weight >= 0.0 && m.weight.is_finite()) {
                return Err(EvolutionConfigError::InvalidWeight(m.weight));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crossover_arity_rejected() {
        let mut config = EvolutionConfig::default();
        config.algorithm.crossover_parents = 3;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::UnsupportedCrossoverArity(3))
        ));
    }

    #[test]
    fn test_rates_rejected() {
        let mut config = EvolutionConfig::default();
        config.algorithm.selection_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = EvolutionConfig::default();
        config.algorithm.mutation_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = EvolutionConfig::default();
        config.algorithm.selection_rate = 1.0;
        config.algorithm.mutation_rate = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_population_and_start_rejected() {
        let mut config = EvolutionConfig::default();
        config.population.size = 1;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::PopulationTooSmall)
        ));

        let mut config = EvolutionConfig::default();
        config.evaluation.start = (10, 0);
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidStart(10, 0))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.algorithm.replacement, ReplacementPolicy::Elitist);
        assert_eq!(parsed.costs, config.costs);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "grid": {"columns": 6, "rows": 4},
            "algorithm": {"replacement": "WinnerTakesAll"},
            "population": {"size": 12, "generations": 3}
        }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid.cell_count(), 24);
        assert_eq!(config.algorithm.replacement, ReplacementPolicy::WinnerTakesAll);
        assert_eq!(config.algorithm.selection_rate, 0.8);
        assert_eq!(config.population.report_interval, 100);
        assert_eq!(config.genome.length, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"population": {{"size": 4}}, "random_seed": 9}}"#).unwrap();
        let config = EvolutionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.population.size, 4);
        assert_eq!(config.random_seed, Some(9));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"algorithm": {{"crossover_parents": 4}}}}"#).unwrap();
        assert!(matches!(
            EvolutionConfig::from_json_file(bad.path()),
            Err(EvolutionConfigError::UnsupportedCrossoverArity(4))
        ));

        assert!(matches!(
            EvolutionConfig::from_json_file("/nonexistent/agent-evo.json"),
            Err(EvolutionConfigError::Io(_))
        ));
    }
}
