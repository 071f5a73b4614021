//! Benchmarks for the agent engine and one generation of evolution.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use agent_evo::{
    compute::{
        Agent, Engine, GridWorld, GridWorldState, PeriodicFoodSpawner, RunState,
        evolution::{FitnessEvaluator, GenomeRng, evolve_one_generation},
    },
    schema::{EvolutionConfig, GenomeConstraints, GridConfig, InstructionCosts, PopulationConfig},
};

fn bench_engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");

    for agents in [1, 16, 256] {
        let grid = GridConfig::new(64, 64);
        let constraints = GenomeConstraints {
            length: 100,
            operand_probability: 0.2,
        };
        let mut rng = GenomeRng::new(42, constraints);

        group.bench_with_input(BenchmarkId::from_parameter(agents), &agents, |b, &agents| {
            b.iter(|| {
                let positions: Vec<usize> = (0..agents).map(|i| (i * 17) % grid.cell_count()).collect();
                let programs = (0..agents).map(|_| Agent::new(rng.random_genome())).collect();
                let world = GridWorldState::new(grid, positions).unwrap();
                let mut run = RunState::new(programs, world).unwrap();
                let spawner = PeriodicFoodSpawner::new(5, grid.cell_count(), 7);
                let mut engine =
                    Engine::new(GridWorld::new(spawner), InstructionCosts::default()).unwrap();
                engine.run_ticks(100, black_box(&mut run), |_| {});
            });
        });
    }

    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(10);

    for size in [50, 200] {
        let config = EvolutionConfig {
            population: PopulationConfig {
                size,
                ..Default::default()
            },
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::from_config(&config, 1);
        let mut rng = GenomeRng::new(3, config.genome.clone());
        let population: Vec<_> = (0..size).map(|_| rng.random_genome()).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                evolve_one_generation(
                    black_box(&population),
                    |p| Ok(evaluator.evaluate_population(p)?),
                    &config.algorithm,
                    &mut rng,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine_tick, bench_generation);
criterion_main!(benches);
