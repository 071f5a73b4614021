//! Agent Evo CLI - Evolve agent programs from JSON configuration.

use std::fs;
use std::path::PathBuf;

use agent_evo::{
    compute::{Symbol, evolution::EvolutionEngine, glyph_of},
    schema::EvolutionConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [result.json]", args[0]);
        eprintln!();
        eprintln!("Evolve grid agents with a genetic algorithm.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!("  result.json  Where to write the final ranked population (optional)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let output_path = args.get(2).map(PathBuf::from);

    let config = EvolutionConfig::from_json_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    println!("Agent Evolution");
    println!("===============");
    println!("Grid: {}x{}", config.grid.columns, config.grid.rows);
    println!(
        "Population: {} genomes of {} symbols",
        config.population.size, config.genome.length
    );
    println!(
        "Generations: {} ({} ticks per evaluation)",
        config.population.generations, config.evaluation.ticks
    );
    println!("Replacement: {:?}", config.algorithm.replacement);
    println!();

    let report_interval = config.population.report_interval.max(1);
    let mut engine = EvolutionEngine::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let result = engine
        .run_with_callback(|progress| {
            if progress.generation % report_interval == 0 {
                println!(
                    "  Generation {}/{}: best={:.3}, mean={:.3}",
                    progress.generation,
                    progress.total_generations,
                    progress.generation_best,
                    progress.avg_fitness
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Best fitness: {:.3}", result.best.fitness);
    println!("Best genome:  {}", render_genome(&result.best.genome));
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );

    if let Some(path) = output_path {
        let written = serde_json::to_string_pretty(&result)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("Result written to {}", path.display()),
            Err(e) => {
                eprintln!("Error writing result: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Opcodes as their glyphs, operands as numbers.
fn render_genome(genome: &[Symbol]) -> String {
    genome
        .iter()
        .map(|&symbol| match glyph_of(symbol) {
            '·' => symbol.to_string(),
            glyph => glyph.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_example_config() {
    let config = EvolutionConfig {
        random_seed: Some(42),
        ..Default::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}
