//! Genetic algorithm over agent genomes.
//!
//! One generation is rank, select, replace, crossover, mutate.
//! [`evolve_one_generation`] is the pure step; [`EvolutionEngine`] drives it
//! for a configured number of generations with the grid-world fitness.

use log::{info, warn};

use crate::compute::EngineError;
use crate::schema::{
    CandidateSnapshot, EvolutionConfig, EvolutionConfigError, EvolutionHistory,
    EvolutionProgress, EvolutionResult, EvolutionStats, GeneticAlgorithmConfig, Genome,
    ReplacementPolicy,
};

use super::fitness::FitnessEvaluator;
use super::genome::{GeneticOperators, GenomeRng};

/// Errors raised while evolving a population.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid evolution config: {0}")]
    Config(#[from] EvolutionConfigError),
    #[error("Fitness evaluation failed: {0}")]
    Engine(#[from] EngineError),
    #[error("Fitness function returned {actual} scores for {expected} genomes")]
    FitnessLengthMismatch { expected: usize, actual: usize },
    #[error("Population size changed from {expected} to {actual}")]
    PopulationSizeDrift { expected: usize, actual: usize },
    #[error("Selection left no survivors")]
    NoSurvivors,
    #[error("Crossover needs two distinct parents below {size}, got {parents:?}")]
    InvalidParents { parents: Vec<usize>, size: usize },
}

/// Everything one generation produced.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The next population.
    pub population: Vec<Genome>,
    /// Fitness of the input population, in input order.
    pub fitness: Vec<f64>,
    /// Indices into the input population, best first.
    pub order: Vec<usize>,
}

impl Generation {
    /// Best fitness of the evaluated population.
    pub fn best_fitness(&self) -> f64 {
        self.order
            .first()
            .map_or(f64::NEG_INFINITY, |&i| self.fitness[i])
    }

    /// Mean fitness of the evaluated population.
    pub fn avg_fitness(&self) -> f64 {
        mean(&self.fitness)
    }
}

/// Indices of `fitness` sorted by descending score. Ties keep their original
/// order; NaN ranks last.
pub fn rank(fitness: &[f64]) -> Vec<usize> {
    let key = |i: usize| {
        let f = fitness[i];
        if f.is_nan() { f64::NEG_INFINITY } else { f }
    };
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| key(b).total_cmp(&key(a)));
    order
}

/// Number of survivors for a population of `size`: `floor(size * rate)`,
/// never less than one.
pub fn survivor_count(size: usize, selection_rate: f64) -> usize {
    let kept = (size as f64 * selection_rate).floor() as usize;
    kept.clamp(1, size.max(1))
}

/// Ranked population with every slot past the survivors emptied.
pub fn select<'a>(
    population: &'a [Genome],
    order: &[usize],
    selection_rate: f64,
) -> Vec<Option<&'a Genome>> {
    let survivors = survivor_count(order.len(), selection_rate);
    order
        .iter()
        .enumerate()
        .map(|(rank, &i)| (rank < survivors).then(|| &population[i]))
        .collect()
}

/// Refill eliminated slots according to `policy`.
///
/// Elitist refills slot `i` from rank `len - 1 - i` of the ranked slots.
/// When that rank was eliminated too (selection rate below one half), the
/// mirror formula alone would leave the slot empty; this deviates from it and
/// refills the slot with the best genome, logging a warning.
pub fn replace(
    slots: &[Option<&Genome>],
    policy: ReplacementPolicy,
) -> Result<Vec<Genome>, EvolutionError> {
    let best = slots
        .first()
        .copied()
        .flatten()
        .ok_or(EvolutionError::NoSurvivors)?;
    let len = slots.len();

    let replaced = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| match (slot, policy) {
            (Some(genome), _) => (*genome).clone(),
            (None, ReplacementPolicy::WinnerTakesAll) => best.clone(),
            (None, ReplacementPolicy::Elitist) => match slots[len - 1 - i] {
                Some(mirror) => mirror.clone(),
                None => {
                    warn!("elitist slot {i} mirrors eliminated rank {}, using rank 0", len - 1 - i);
                    best.clone()
                }
            },
        })
        .collect();

    Ok(replaced)
}

/// Run one generation over `population`.
///
/// `compute_fitness` must return one score per genome in population order.
/// Exactly one crossover happens between two distinct slots, whose children
/// overwrite the parents in place; afterwards every genome is mutated with
/// probability `mutation_rate`.
pub fn evolve_one_generation<F, O>(
    population: &[Genome],
    compute_fitness: F,
    config: &GeneticAlgorithmConfig,
    operators: &mut O,
) -> Result<Generation, EvolutionError>
where
    F: FnOnce(&[Genome]) -> Result<Vec<f64>, EvolutionError>,
    O: GeneticOperators + ?Sized,
{
    config.validate()?;
    let size = population.len();
    if size < config.crossover_parents {
        return Err(EvolutionConfigError::PopulationTooSmall.into());
    }

    let fitness = compute_fitness(population)?;
    if fitness.len() != size {
        return Err(EvolutionError::FitnessLengthMismatch {
            expected: size,
            actual: fitness.len(),
        });
    }

    let order = rank(&fitness);
    let slots = select(population, &order, config.selection_rate);
    let mut next = replace(&slots, config.replacement)?;

    // Single crossover event
    let parents = operators.distinct_indices(config.crossover_parents, size);
    let pair = match parents[..] {
        [a, b] if a != b && a < size && b < size => Some((a, b)),
        _ => None,
    };
    let Some((a, b)) = pair else {
        return Err(EvolutionError::InvalidParents { parents, size });
    };
    let (first, second) = operators.crossover(&next[a], &next[b]);
    next[a] = first;
    next[b] = second;

    for genome in &mut next {
        if operators.roll() < config.mutation_rate {
            *genome = operators.mutate(genome);
        }
    }

    if next.len() != size {
        return Err(EvolutionError::PopulationSizeDrift {
            expected: size,
            actual: next.len(),
        });
    }

    Ok(Generation {
        population: next,
        fitness,
        order,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    population: Vec<Genome>,
    history: EvolutionHistory,
    generation: usize,
    best_fitness: f64,
    evaluations: u64,
}

impl EvolutionEngine {
    /// Create a new evolution engine. The configuration is validated here so
    /// a bad setup fails before any generation runs.
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        config.validate()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = GenomeRng::new(seed, config.genome.clone());
        let evaluator = FitnessEvaluator::from_config(&config, rng.next_seed());

        Ok(Self {
            config,
            rng,
            evaluator,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            best_fitness: f64::NEG_INFINITY,
            evaluations: 0,
        })
    }

    /// Fill the population with random genomes.
    pub fn initialize(&mut self) {
        self.population = (0..self.config.population.size)
            .map(|_| self.rng.random_genome())
            .collect();
        self.history = EvolutionHistory::default();
        self.generation = 0;
        self.best_fitness = f64::NEG_INFINITY;
        self.evaluations = 0;
    }

    /// Current population.
    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    /// Generations completed since the last [`initialize`](Self::initialize).
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Evaluate the current population and replace it with the next one.
    pub fn step(&mut self) -> Result<EvolutionProgress, EvolutionError> {
        let evaluator = &self.evaluator;
        let outcome = evolve_one_generation(
            &self.population,
            |population| Ok(evaluator.evaluate_population(population)?),
            &self.config.algorithm,
            &mut self.rng,
        )?;

        let generation_best = outcome.best_fitness();
        let avg_fitness = outcome.avg_fitness();
        let best_genome = outcome
            .order
            .first()
            .map(|&i| self.population[i].clone())
            .unwrap_or_default();

        self.best_fitness = self.best_fitness.max(generation_best);
        self.history.best_fitness.push(generation_best);
        self.history.avg_fitness.push(avg_fitness);
        self.evaluations += self.population.len() as u64;
        self.generation += 1;
        self.population = outcome.population;

        Ok(EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.generations,
            generation_best,
            avg_fitness,
            best_fitness: self.best_fitness,
            best_genome,
        })
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = std::time::Instant::now();
        let total = self.config.population.generations;
        let interval = self.config.population.report_interval;

        self.initialize();

        while self.generation < total {
            let progress = self.step()?;
            if interval > 0 && (progress.generation % interval == 0 || progress.generation == total) {
                info!(
                    "generation {}/{}: best {:.3}, mean {:.3}, best so far {:.3}",
                    progress.generation,
                    total,
                    progress.generation_best,
                    progress.avg_fitness,
                    progress.best_fitness
                );
            }
            callback(&progress);
        }

        // Score the final population so the result is ranked.
        let fitness = self.evaluator.evaluate_population(&self.population)?;
        self.evaluations += self.population.len() as u64;

        let population: Vec<CandidateSnapshot> = rank(&fitness)
            .into_iter()
            .map(|i| CandidateSnapshot {
                genome: self.population[i].clone(),
                fitness: fitness[i],
            })
            .collect();
        let best = population
            .first()
            .cloned()
            .ok_or(EvolutionError::NoSurvivors)?;
        self.best_fitness = self.best_fitness.max(best.fitness);

        let elapsed = start_time.elapsed().as_secs_f64();

        Ok(EvolutionResult {
            best,
            population,
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.evaluations,
                best_fitness: self.best_fitness,
                final_avg_fitness: mean(&fitness),
                elapsed_seconds: elapsed,
                evaluations_per_second: self.evaluations as f64 / elapsed.max(f64::EPSILON),
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::crossover_at;
    use crate::compute::{Opcode, Symbol};
    use crate::schema::{
        EvaluationConfig, FitnessMetric, GenomeConstraints, GridConfig, PopulationConfig,
        WeightedMetric,
    };
    use proptest::prelude::*;

    /// Operators with scripted choices and no randomness.
    struct Scripted {
        parents: Vec<usize>,
        split: usize,
        roll: f64,
    }

    impl GeneticOperators for Scripted {
        fn distinct_indices(&mut self, _count: usize, _len: usize) -> Vec<usize> {
            self.parents.clone()
        }

        fn roll(&mut self) -> f64 {
            self.roll
        }

        fn crossover(&mut self, first: &[Symbol], second: &[Symbol]) -> (Genome, Genome) {
            crossover_at(first, second, self.split)
        }

        fn mutate(&mut self, genome: &[Symbol]) -> Genome {
            let mut mutant = genome.to_vec();
            mutant[0] = -1;
            mutant
        }
    }

    fn named(values: &[Symbol]) -> Vec<Genome> {
        values.iter().map(|&v| vec![v; 3]).collect()
    }

    fn ga(selection_rate: f64, replacement: ReplacementPolicy, mutation_rate: f64) -> GeneticAlgorithmConfig {
        GeneticAlgorithmConfig {
            selection_rate,
            mutation_rate,
            replacement,
            crossover_parents: 2,
        }
    }

    #[test]
    fn test_rank_descending_and_stable() {
        assert_eq!(rank(&[1.0, 3.0, 2.0, 3.0]), vec![1, 3, 2, 0]);
        assert_eq!(rank(&[f64::NAN, 0.0, -1.0]), vec![1, 2, 0]);
    }

    #[test]
    fn test_survivor_count() {
        assert_eq!(survivor_count(5, 0.6), 3);
        assert_eq!(survivor_count(10, 0.95), 9);
        assert_eq!(survivor_count(4, 0.1), 1);
        assert_eq!(survivor_count(4, 1.0), 4);
    }

    #[test]
    fn test_elitist_mirrors_ranks() {
        let [a, b, c] = [vec![1], vec![2], vec![3]];
        let slots = [Some(&a), Some(&b), Some(&c), None, None];
        let replaced = replace(&slots, ReplacementPolicy::Elitist).unwrap();
        assert_eq!(replaced, vec![a.clone(), b.clone(), c, b, a]);
    }

    #[test]
    fn test_elitist_falls_back_to_best() {
        let a = vec![1];
        let slots = [Some(&a), None, None, None];
        let replaced = replace(&slots, ReplacementPolicy::Elitist).unwrap();
        assert_eq!(replaced, vec![a.clone(); 4]);
    }

    #[test]
    fn test_winner_takes_all() {
        let a = vec![1];
        let slots = [Some(&a), None, None];
        let replaced = replace(&slots, ReplacementPolicy::WinnerTakesAll).unwrap();
        assert_eq!(replaced, vec![a.clone(), a.clone(), a]);
    }

    #[test]
    fn test_replace_without_survivors() {
        let slots: [Option<&Genome>; 2] = [None, None];
        assert!(matches!(
            replace(&slots, ReplacementPolicy::Elitist),
            Err(EvolutionError::NoSurvivors)
        ));
    }

    #[test]
    fn test_generation_pipeline() {
        // Fitness equals the genome's first symbol: ranks are 5, 4, 3, 2, 1.
        let population = named(&[3, 1, 5, 2, 4]);
        let mut ops = Scripted {
            parents: vec![0, 1],
            split: 1,
            roll: 0.5,
        };
        let outcome = evolve_one_generation(
            &population,
            |p| Ok(p.iter().map(|g| g[0] as f64).collect()),
            &ga(0.6, ReplacementPolicy::Elitist, 0.0),
            &mut ops,
        )
        .unwrap();

        assert_eq!(outcome.order, vec![2, 4, 0, 3, 1]);
        assert_eq!(outcome.best_fitness(), 5.0);
        assert_eq!(outcome.avg_fitness(), 3.0);
        // Replaced: [5, 4, 3, 4, 5]; crossover of slots 0 and 1 at split 1.
        assert_eq!(
            outcome.population,
            vec![vec![5, 4, 4], vec![4, 5, 5], vec![3; 3], vec![4; 3], vec![5; 3]]
        );
    }

    #[test]
    fn test_mutation_applies_on_roll() {
        let population = named(&[1, 2, 3]);
        let mut ops = Scripted {
            parents: vec![1, 2],
            split: 3,
            roll: 0.2,
        };
        let outcome = evolve_one_generation(
            &population,
            |p| Ok(vec![0.0; p.len()]),
            &ga(1.0, ReplacementPolicy::Elitist, 0.3),
            &mut ops,
        )
        .unwrap();
        assert!(outcome.population.iter().all(|g| g[0] == -1));

        ops.roll = 0.3;
        let outcome = evolve_one_generation(
            &population,
            |p| Ok(vec![0.0; p.len()]),
            &ga(1.0, ReplacementPolicy::Elitist, 0.3),
            &mut ops,
        )
        .unwrap();
        assert_eq!(outcome.population, population);
    }

    #[test]
    fn test_fitness_length_mismatch() {
        let population = named(&[1, 2, 3]);
        let mut ops = Scripted {
            parents: vec![0, 1],
            split: 0,
            roll: 1.0,
        };
        let result = evolve_one_generation(
            &population,
            |_| Ok(vec![1.0]),
            &ga(0.5, ReplacementPolicy::Elitist, 0.0),
            &mut ops,
        );
        assert!(matches!(
            result,
            Err(EvolutionError::FitnessLengthMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_bad_parent_indices_rejected() {
        let population = named(&[1, 2, 3]);
        for parents in [vec![1, 1], vec![0, 3], vec![2]] {
            let mut ops = Scripted {
                parents: parents.clone(),
                split: 1,
                roll: 1.0,
            };
            let result = evolve_one_generation(
                &population,
                |p| Ok(vec![0.0; p.len()]),
                &ga(1.0, ReplacementPolicy::Elitist, 0.0),
                &mut ops,
            );
            assert!(matches!(
                result,
                Err(EvolutionError::InvalidParents { parents: ref got, size: 3 }) if *got == parents
            ));
        }
    }

    #[test]
    fn test_crossover_arity_rejected() {
        let population = named(&[1, 2, 3]);
        let mut ops = Scripted {
            parents: vec![0, 1, 2],
            split: 0,
            roll: 1.0,
        };
        let mut config = ga(0.5, ReplacementPolicy::Elitist, 0.0);
        config.crossover_parents = 3;
        let result = evolve_one_generation(&population, |p| Ok(vec![0.0; p.len()]), &config, &mut ops);
        assert!(matches!(
            result,
            Err(EvolutionError::Config(
                EvolutionConfigError::UnsupportedCrossoverArity(3)
            ))
        ));
    }

    proptest! {
        #[test]
        fn prop_population_size_invariant(
            size in 2usize..40,
            selection_rate in 0.001f64..=1.0,
            winner_takes_all in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let constraints = GenomeConstraints { length: 8, operand_probability: 0.2 };
            let mut rng = GenomeRng::new(seed, constraints);
            let population: Vec<Genome> = (0..size).map(|_| rng.random_genome()).collect();
            let policy = if winner_takes_all {
                ReplacementPolicy::WinnerTakesAll
            } else {
                ReplacementPolicy::Elitist
            };
            let outcome = evolve_one_generation(
                &population,
                |p| Ok(p.iter().map(|g| g.iter().sum::<i64>() as f64).collect()),
                &ga(selection_rate, policy, 0.5),
                &mut rng,
            ).unwrap();
            prop_assert_eq!(outcome.population.len(), size);
            prop_assert!(outcome.population.iter().all(|g| g.len() == 8));
        }
    }

    fn small_config() -> EvolutionConfig {
        EvolutionConfig {
            grid: GridConfig::new(5, 5),
            genome: GenomeConstraints {
                length: 12,
                operand_probability: 0.2,
            },
            population: PopulationConfig {
                size: 8,
                generations: 4,
                report_interval: 2,
            },
            evaluation: EvaluationConfig {
                ticks: 20,
                food_interval: 2,
                start: (2, 2),
            },
            random_seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_rejects_bad_config() {
        let mut config = small_config();
        config.algorithm.crossover_parents = 1;
        assert!(matches!(
            EvolutionEngine::new(config),
            Err(EvolutionError::Config(_))
        ));
    }

    #[test]
    fn test_evolution_run() {
        let mut engine = EvolutionEngine::new(small_config()).unwrap();
        assert!(engine.population().is_empty());
        let mut seen = Vec::new();
        let result = engine
            .run_with_callback(|progress| seen.push(progress.generation))
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(engine.generation(), 4);
        assert_eq!(engine.population().len(), 8);
        assert!(engine.population().iter().all(|g| g.len() == 12));
        assert_eq!(result.stats.generations, 4);
        assert_eq!(result.stats.total_evaluations, 5 * 8);
        assert_eq!(result.population.len(), 8);
        assert_eq!(result.history.best_fitness.len(), 4);
        assert!(
            result
                .population
                .windows(2)
                .all(|w| w[0].fitness >= w[1].fitness)
        );
        assert_eq!(result.best.fitness, result.population[0].fitness);
        assert!(result.stats.best_fitness >= result.best.fitness);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = EvolutionEngine::new(small_config()).unwrap().run().unwrap();
        let b = EvolutionEngine::new(small_config()).unwrap().run().unwrap();
        assert_eq!(a.best.genome, b.best.genome);
        assert_eq!(a.history.best_fitness, b.history.best_fitness);
    }

    #[test]
    fn test_walker_beats_suicide() {
        let mut config = small_config();
        config.fitness.metrics = vec![WeightedMetric {
            metric: FitnessMetric::Survival,
            weight: 1.0,
        }];
        let evaluator = FitnessEvaluator::from_config(&config, 1);
        let suicide = vec![Opcode::Up.symbol(); 12];
        let pacing: Genome = (0..12)
            .map(|i| if i % 2 == 0 { Opcode::Right } else { Opcode::Left }.symbol())
            .collect();
        let scores = evaluator.evaluate_population(&[suicide, pacing]).unwrap();
        assert!(scores[1] > scores[0]);
    }
}
