//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations.

use rand::prelude::*;
use rand::seq::index;

use crate::compute::{Opcode, Symbol};
use crate::schema::{Genome, GenomeConstraints};

/// Randomized operators the genetic algorithm draws on each generation.
pub trait GeneticOperators {
    /// `count` distinct indices from `0..len`, in random order.
    fn distinct_indices(&mut self, count: usize, len: usize) -> Vec<usize>;
    /// Uniform sample from `[0, 1)`.
    fn roll(&mut self) -> f64;
    /// Single-point crossover; returns the two children.
    fn crossover(&mut self, first: &[Symbol], second: &[Symbol]) -> (Genome, Genome);
    /// Copy of `genome` with exactly one symbol redrawn.
    fn mutate(&mut self, genome: &[Symbol]) -> Genome;
}

/// Split both parents at `split` and swap their tails.
///
/// The first child is `first[..split] ++ second[split..]`, the second is
/// `second[..split] ++ first[split..]`. `split = 0` swaps the parents whole,
/// `split = len` leaves them unchanged.
pub fn crossover_at(first: &[Symbol], second: &[Symbol], split: usize) -> (Genome, Genome) {
    let split = split.min(first.len()).min(second.len());

    let mut a = Vec::with_capacity(second.len());
    a.extend_from_slice(&first[..split]);
    a.extend_from_slice(&second[split..]);

    let mut b = Vec::with_capacity(first.len());
    b.extend_from_slice(&second[..split]);
    b.extend_from_slice(&first[split..]);

    (a, b)
}

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
    constraints: GenomeConstraints,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64, constraints: GenomeConstraints) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            constraints,
        }
    }

    /// Draw one symbol: an opcode, or with `operand_probability` an integer
    /// operand that addresses a cell of the genome.
    pub fn random_symbol(&mut self) -> Symbol {
        let p = self.constraints.operand_probability;
        if p > 0.0 && self.rng.gen_bool(p) {
            return self.rng.gen_range(0..self.constraints.length.max(1)) as Symbol;
        }
        Opcode::ALL
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Opcode::Right)
            .symbol()
    }

    /// Generate a random genome of the configured length.
    pub fn random_genome(&mut self) -> Genome {
        (0..self.constraints.length)
            .map(|_| self.random_symbol())
            .collect()
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

impl GeneticOperators for GenomeRng {
    fn distinct_indices(&mut self, count: usize, len: usize) -> Vec<usize> {
        index::sample(&mut self.rng, len, count.min(len)).into_vec()
    }

    fn roll(&mut self) -> f64 {
        self.rng.r#gen()
    }

    fn crossover(&mut self, first: &[Symbol], second: &[Symbol]) -> (Genome, Genome) {
        let split = self.rng.gen_range(0..=first.len().min(second.len()));
        crossover_at(first, second, split)
    }

    fn mutate(&mut self, genome: &[Symbol]) -> Genome {
        let mut mutant = genome.to_vec();
        if !mutant.is_empty() {
            let at = self.rng.gen_range(0..mutant.len());
            mutant[at] = self.random_symbol();
        }
        mutant
    }
}
