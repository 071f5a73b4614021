//! Configuration types for the grid and the instruction cost table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compute::Opcode;

/// Grid dimensions shared by the world model and the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of columns (cells per row).
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 10,
            rows: 10,
        }
    }
}

impl GridConfig {
    /// Create a grid of the given dimensions.
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    /// Get total cell count (columns * rows).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Validate grid dimensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        Ok(())
    }
}

/// Tick cost of every opcode. Immutable for the duration of a run.
///
/// Serialized as a JSON object keyed by opcode name:
/// `{"Up": 1, "Right": 1, "Down": 1, "Left": 1, "JumpIfZero": 1, "LoadNeighbor": 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionCosts(BTreeMap<Opcode, u32>);

impl Default for InstructionCosts {
    fn default() -> Self {
        Self::uniform(1)
    }
}

impl InstructionCosts {
    /// Every opcode costs `cost` ticks.
    pub fn uniform(cost: u32) -> Self {
        Self(Opcode::ALL.iter().map(|&op| (op, cost)).collect())
    }

    /// Override the cost of a single opcode.
    pub fn with_cost(mut self, opcode: Opcode, cost: u32) -> Self {
        self.0.insert(opcode, cost);
        self
    }

    /// Cost of `opcode` in ticks. Zero for opcodes missing from an unvalidated table.
    #[inline]
    pub fn cost(&self, opcode: Opcode) -> u32 {
        self.0.get(&opcode).copied().unwrap_or(0)
    }

    /// Every opcode must have an entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Opcode::ALL.iter().find(|op| !self.0.contains_key(op)) {
            Some(&missing) => Err(ConfigError::MissingCost(missing)),
            None => Ok(()),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (columns, rows) must be non-zero")]
    InvalidDimensions,
    #[error("Instruction cost table has no entry for {0:?}")]
    MissingCost(Opcode),
}
