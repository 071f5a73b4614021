//! Instruction set for grid agents.
//!
//! An agent's memory is one flat sequence of [`Symbol`]s. Whether a symbol is
//! an opcode or an operand depends only on where the pointer lands, so an
//! instruction may rewrite cells that later execute as code.
//!
//! Opcodes are identified by the Unicode code point of their glyph:
//!
//! | Glyph | Opcode         | Operands                     | Pointer      |
//! |-------|----------------|------------------------------|--------------|
//! | `↑`   | `Up`           | none                         | `+1`         |
//! | `→`   | `Right`        | none                         | `+1`         |
//! | `↓`   | `Down`         | none                         | `+1`         |
//! | `←`   | `Left`         | none                         | `+1`         |
//! | `J`   | `JumpIfZero`   | test, target                 | target or `+3` |
//! | `L`   | `LoadNeighbor` | direction, destination       | `+3`         |

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::grid;
use super::world::WorldState;

/// A single memory cell. Opcodes, operands and actions are all symbols.
pub type Symbol = i64;

/// The eight neighbor directions. Only the four orthogonal ones are movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
    UpRight,
    DownLeft,
    DownRight,
    UpLeft,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
        Direction::UpLeft,
    ];

    /// Arrow glyph for this direction.
    pub const fn glyph(self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Right => '→',
            Direction::Down => '↓',
            Direction::Left => '←',
            Direction::UpRight => '↱',
            Direction::DownLeft => '↲',
            Direction::DownRight => '↳',
            Direction::UpLeft => '↰',
        }
    }

    #[inline]
    pub fn symbol(self) -> Symbol {
        Symbol::from(u32::from(self.glyph()))
    }

    /// `(d_col, d_row)` offset; rows grow downward.
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::UpRight => (1, -1),
            Direction::DownLeft => (-1, 1),
            Direction::DownRight => (1, 1),
            Direction::UpLeft => (-1, -1),
        }
    }

    pub const fn is_orthogonal(self) -> bool {
        matches!(
            self,
            Direction::Up | Direction::Right | Direction::Down | Direction::Left
        )
    }

    /// Decode any of the eight direction glyphs.
    pub fn from_symbol(symbol: Symbol) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.symbol() == symbol)
    }

    /// Decode a movement action: one of the four orthogonal glyphs.
    pub fn from_movement_symbol(symbol: Symbol) -> Option<Self> {
        Self::from_symbol(symbol).filter(|d| d.is_orthogonal())
    }
}

/// Closed set of opcodes understood by the virtual machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Opcode {
    Up,
    Right,
    Down,
    Left,
    JumpIfZero,
    LoadNeighbor,
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::Up,
        Opcode::Right,
        Opcode::Down,
        Opcode::Left,
        Opcode::JumpIfZero,
        Opcode::LoadNeighbor,
    ];

    pub const fn glyph(self) -> char {
        match self {
            Opcode::Up => '↑',
            Opcode::Right => '→',
            Opcode::Down => '↓',
            Opcode::Left => '←',
            Opcode::JumpIfZero => 'J',
            Opcode::LoadNeighbor => 'L',
        }
    }

    #[inline]
    pub fn symbol(self) -> Symbol {
        Symbol::from(u32::from(self.glyph()))
    }

    /// Decode the opcode stored in a memory cell, if any.
    pub fn decode(symbol: Symbol) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Movement direction emitted by this opcode, if it is a movement.
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Opcode::Up => Some(Direction::Up),
            Opcode::Right => Some(Direction::Right),
            Opcode::Down => Some(Direction::Down),
            Opcode::Left => Some(Direction::Left),
            Opcode::JumpIfZero | Opcode::LoadNeighbor => None,
        }
    }
}

/// Render a symbol as its glyph when it has one, `·` otherwise.
pub fn glyph_of(symbol: Symbol) -> char {
    if Opcode::decode(symbol).is_some() || Direction::from_symbol(symbol).is_some() {
        u32::try_from(symbol)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or('·')
    } else {
        '·'
    }
}

/// Successful result of one instruction.
///
/// `memory` borrows the input image unless the instruction wrote to it, in
/// which case it holds a fresh copy; the caller's image is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<'a> {
    /// Action submitted to the world model this tick.
    pub action: Option<Symbol>,
    /// Memory image after the instruction.
    pub memory: Cow<'a, [Symbol]>,
    /// Pointer after the instruction.
    pub pointer: usize,
}

/// Execute `opcode` for `agent`. `None` means the agent dies.
pub fn execute<'a, W>(
    opcode: Opcode,
    agent: usize,
    memory: &'a [Symbol],
    world: &W,
    pointer: usize,
) -> Option<Step<'a>>
where
    W: WorldState + ?Sized,
{
    match opcode {
        Opcode::Up | Opcode::Right | Opcode::Down | Opcode::Left => submit_move(memory, pointer),
        Opcode::JumpIfZero => jump_if_zero(memory, pointer),
        Opcode::LoadNeighbor => load_neighbor(agent, memory, world, pointer),
    }
}

/// Emit the symbol under the pointer as the action and advance by one.
fn submit_move(memory: &[Symbol], pointer: usize) -> Option<Step<'_>> {
    let next = pointer + 1;
    if next >= memory.len() {
        return None;
    }

    Some(Step {
        action: Some(memory[pointer]),
        memory: Cow::Borrowed(memory),
        pointer: next,
    })
}

/// `J test target`: jump to `target` when `test == 0`, otherwise skip both operands.
fn jump_if_zero(memory: &[Symbol], pointer: usize) -> Option<Step<'_>> {
    if pointer + 3 > memory.len() {
        return None;
    }

    let test = memory[pointer + 1];
    let target = memory[pointer + 2];

    let next = if test == 0 {
        usize::try_from(target).ok()?
    } else {
        pointer + 3
    };
    if next >= memory.len() {
        return None;
    }

    Some(Step {
        action: None,
        memory: Cow::Borrowed(memory),
        pointer: next,
    })
}

/// `L direction destination`: store 1 at `destination` if the neighbor cell in
/// `direction` lies inside the grid, 0 otherwise.
fn load_neighbor<'a, W>(
    agent: usize,
    memory: &'a [Symbol],
    world: &W,
    pointer: usize,
) -> Option<Step<'a>>
where
    W: WorldState + ?Sized,
{
    let next = pointer + 3;
    if next >= memory.len() {
        return None;
    }

    let direction = Direction::from_symbol(memory[pointer + 1])?;
    let destination = usize::try_from(memory[pointer + 2])
        .ok()
        .filter(|&d| d < memory.len())?;

    let (d_col, d_row) = direction.offset();
    let grid = world.grid();
    let inside = grid::neighbor(world.position(agent), d_col, d_row, &grid).is_some();

    let mut image = memory.to_vec();
    image[destination] = Symbol::from(inside);

    Some(Step {
        action: None,
        memory: Cow::Owned(image),
        pointer: next,
    })
}
