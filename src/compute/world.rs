//! World models: rule sets that turn one tick's actions into the next world state.
//!
//! The engine only sees the [`WorldModel`] and [`WorldState`] traits. The
//! reference variant is [`GridWorld`]: agents move on a bounded grid, food
//! appears over time and is eaten by agents that step on it.

use log::debug;
use rand::prelude::*;
use serde::Serialize;

use crate::schema::{ConfigError, GridConfig};

use super::grid;
use super::isa::{Direction, Symbol};

/// Direction used by an agent that has never submitted a valid movement.
pub const DEFAULT_DIRECTION: Direction = Direction::Right;

/// Classification of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Cell {
    #[default]
    Empty,
    /// A living agent stands here.
    Occupied,
    /// Special cell (food in the reference variant).
    Special,
}

/// Read access the engine and instruction handlers need from any world state.
pub trait WorldState {
    /// Grid dimensions.
    fn grid(&self) -> GridConfig;
    /// Number of agents tracked by this state.
    fn agent_count(&self) -> usize;
    /// Linear cell index of `agent`.
    fn position(&self, agent: usize) -> usize;
    /// Whether `agent` is alive.
    fn is_alive(&self, agent: usize) -> bool;
    /// Mark `agent` dead. Death is permanent.
    fn kill(&mut self, agent: usize);
    /// Cell classification, `columns * rows` long.
    fn cells(&self) -> &[Cell];
}

/// A pluggable rule set, invoked once per tick with every agent's action.
pub trait WorldModel {
    type State: WorldState;

    /// Produce the next state from the actions submitted this tick.
    ///
    /// `actions` has one entry per agent, `None` for agents that were frozen,
    /// dead, or executed a non-acting instruction.
    fn iterate(&mut self, actions: &[Option<Symbol>], state: &Self::State) -> Self::State;
}

/// Source of new special cells, keyed by tick index.
pub trait SpecialCellGenerator {
    fn generate(&mut self, tick: u64) -> Vec<usize>;
}

impl<F> SpecialCellGenerator for F
where
    F: FnMut(u64) -> Vec<usize>,
{
    fn generate(&mut self, tick: u64) -> Vec<usize> {
        self(tick)
    }
}

/// Drops one food item on a random cell every `interval` ticks.
pub struct PeriodicFoodSpawner {
    interval: u64,
    cell_count: usize,
    rng: StdRng,
}

impl PeriodicFoodSpawner {
    /// Create a spawner; the same seed always yields the same food sequence.
    pub fn new(interval: u64, cell_count: usize, seed: u64) -> Self {
        Self {
            interval,
            cell_count,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SpecialCellGenerator for PeriodicFoodSpawner {
    fn generate(&mut self, tick: u64) -> Vec<usize> {
        if self.interval == 0 || self.cell_count == 0 || tick % self.interval != 0 {
            return Vec::new();
        }
        vec![self.rng.gen_range(0..self.cell_count)]
    }
}

/// World state errors, all detected at construction.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Invalid grid: {0}")]
    Grid(#[from] ConfigError),
    #[error("Agent {agent} starts at cell {position}, outside a grid of {cells} cells")]
    PositionOutOfBounds {
        agent: usize,
        position: usize,
        cells: usize,
    },
    #[error("Food layout has {actual} cells, grid has {expected}")]
    FoodLengthMismatch { expected: usize, actual: usize },
}

/// State of the reference grid-with-food world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridWorldState {
    grid: GridConfig,
    positions: Vec<usize>,
    alive: Vec<bool>,
    previous_actions: Vec<Option<Direction>>,
    food: Vec<bool>,
    cells: Vec<Cell>,
    food_eaten: Vec<u32>,
    tick: u64,
}

impl GridWorldState {
    /// Place one living agent per entry of `positions` on an empty grid.
    pub fn new(grid: GridConfig, positions: Vec<usize>) -> Result<Self, WorldError> {
        grid.validate()?;

        let cells = grid.cell_count();
        if let Some((agent, &position)) = positions.iter().enumerate().find(|(_, p)| **p >= cells)
        {
            return Err(WorldError::PositionOutOfBounds {
                agent,
                position,
                cells,
            });
        }

        let agents = positions.len();
        let mut state = Self {
            grid,
            positions,
            alive: vec![true; agents],
            previous_actions: vec![None; agents],
            food: vec![false; cells],
            cells: Vec::new(),
            food_eaten: vec![0; agents],
            tick: 0,
        };
        state.cells = classify_cells(&state.grid, &state.positions, &state.alive, &state.food);
        Ok(state)
    }

    /// Replace the food layout. `food` must have one entry per cell.
    pub fn with_food(mut self, food: Vec<bool>) -> Result<Self, WorldError> {
        let expected = self.grid.cell_count();
        if food.len() != expected {
            return Err(WorldError::FoodLengthMismatch {
                expected,
                actual: food.len(),
            });
        }
        self.food = food;
        self.cells = classify_cells(&self.grid, &self.positions, &self.alive, &self.food);
        Ok(self)
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn alive(&self) -> &[bool] {
        &self.alive
    }

    /// Last valid movement each agent submitted.
    pub fn previous_actions(&self) -> &[Option<Direction>] {
        &self.previous_actions
    }

    pub fn food(&self) -> &[bool] {
        &self.food
    }

    /// Food consumed by each agent so far.
    pub fn food_eaten(&self) -> &[u32] {
        &self.food_eaten
    }

    /// Number of ticks applied to this state.
    pub fn tick(&self) -> u64 {
        self.tick
    }
}

impl WorldState for GridWorldState {
    fn grid(&self) -> GridConfig {
        self.grid
    }

    fn agent_count(&self) -> usize {
        self.positions.len()
    }

    fn position(&self, agent: usize) -> usize {
        self.positions[agent]
    }

    fn is_alive(&self, agent: usize) -> bool {
        self.alive[agent]
    }

    fn kill(&mut self, agent: usize) {
        self.alive[agent] = false;
    }

    fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Rebuild the whole classification. Living agents cover food.
fn classify_cells(
    grid: &GridConfig,
    positions: &[usize],
    alive: &[bool],
    food: &[bool],
) -> Vec<Cell> {
    let mut cells: Vec<Cell> = food
        .iter()
        .map(|&f| if f { Cell::Special } else { Cell::Empty })
        .collect();
    cells.resize(grid.cell_count(), Cell::Empty);

    for (&position, _) in positions.iter().zip(alive).filter(|(_, a)| **a) {
        cells[position] = Cell::Occupied;
    }
    cells
}

/// Reference world: movement, food spawn and consumption on a bounded grid.
///
/// Agents do not collide; any number may share a cell.
pub struct GridWorld<G> {
    generator: G,
}

impl<G: SpecialCellGenerator> GridWorld<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }
}

impl<G: SpecialCellGenerator> WorldModel for GridWorld<G> {
    type State = GridWorldState;

    fn iterate(&mut self, actions: &[Option<Symbol>], state: &GridWorldState) -> GridWorldState {
        let grid = state.grid;
        let mut positions = state.positions.clone();
        let mut alive = state.alive.clone();
        let mut previous_actions = state.previous_actions.clone();
        let mut food = state.food.clone();
        let mut food_eaten = state.food_eaten.clone();

        // Spawn onto whatever is still uneaten.
        for cell in self.generator.generate(state.tick) {
            match food.get_mut(cell) {
                Some(slot) => *slot = true,
                None => debug!("tick {}: discarding food at cell {cell} outside the grid", state.tick),
            }
        }

        for agent in 0..positions.len() {
            if !alive[agent] {
                continue;
            }

            let submitted = actions
                .get(agent)
                .copied()
                .flatten()
                .and_then(Direction::from_movement_symbol);
            let direction = match submitted {
                Some(direction) => {
                    previous_actions[agent] = Some(direction);
                    direction
                }
                None => previous_actions[agent].unwrap_or(DEFAULT_DIRECTION),
            };

            let (d_col, d_row) = direction.offset();
            match grid::neighbor(positions[agent], d_col, d_row, &grid) {
                Some(next) => positions[agent] = next,
                None => {
                    alive[agent] = false;
                    debug!(
                        "tick {}: agent {agent} left the grid moving {direction:?} from cell {}",
                        state.tick, positions[agent]
                    );
                }
            }
        }

        // Every living agent standing on food at this point eats it, even
        // when several share the cell.
        let available = food.clone();
        for agent in 0..positions.len() {
            let cell = positions[agent];
            if alive[agent] && available[cell] {
                food_eaten[agent] += 1;
                food[cell] = false;
            }
        }

        let cells = classify_cells(&grid, &positions, &alive, &food);

        GridWorldState {
            grid,
            positions,
            alive,
            previous_actions,
            food,
            cells,
            food_eaten,
            tick: state.tick + 1,
        }
    }
}
