//! Agent virtual machine and lock-step tick scheduler.
//!
//! Every tick, each living agent either waits out its freeze counter or
//! executes exactly one instruction. The collected actions are then handed
//! to the world model in a single call, and its output becomes the next
//! world state. Agents are processed in index order and none of them sees
//! another's tick-local changes.

use std::borrow::Cow;

use log::debug;
use serde::Serialize;

use crate::schema::{ConfigError, InstructionCosts};

use super::isa::{self, Opcode, Step, Symbol};
use super::world::{WorldError, WorldModel, WorldState};

/// Runtime record of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    /// Flat code-and-data memory.
    pub memory: Vec<Symbol>,
    /// Index of the next symbol to execute.
    pub pointer: usize,
    /// Ticks left before the agent may execute again; negative means ready.
    pub freeze: i64,
    /// Cleared once, never set again.
    pub alive: bool,
}

impl Agent {
    /// A fresh agent with its pointer at the start of `memory`.
    pub fn new(memory: Vec<Symbol>) -> Self {
        Self {
            memory,
            pointer: 0,
            freeze: 0,
            alive: true,
        }
    }
}

/// Why an agent died inside the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// The pointer does not address a memory cell.
    PointerOutOfRange,
    /// The symbol under the pointer is not an opcode.
    UnknownOpcode(Symbol),
    /// The handler rejected its operands or resulting pointer.
    Handler(Opcode),
}

/// What happened to one agent during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentOutcome {
    /// Already dead; skipped.
    Dead,
    /// Waiting out its freeze counter.
    Frozen,
    /// Executed one instruction.
    Executed(Opcode),
    /// Died this tick.
    Faulted(Fault),
}

/// Mutable state carried from tick to tick.
#[derive(Debug, Clone)]
pub struct RunState<S> {
    agents: Vec<Agent>,
    world: S,
    tick: u64,
}

impl<S: WorldState> RunState<S> {
    /// Pair agents with a world state tracking the same number of agents.
    pub fn new(mut agents: Vec<Agent>, mut world: S) -> Result<Self, EngineError> {
        if agents.len() != world.agent_count() {
            return Err(EngineError::AgentCountMismatch {
                agents: agents.len(),
                world: world.agent_count(),
            });
        }
        if world.cells().len() != world.grid().cell_count() {
            return Err(EngineError::CellCountMismatch {
                expected: world.grid().cell_count(),
                actual: world.cells().len(),
            });
        }

        // An agent is alive only if both the record and the world agree.
        for (id, agent) in agents.iter_mut().enumerate() {
            agent.alive &= world.is_alive(id);
            if !agent.alive {
                world.kill(id);
            }
        }

        Ok(Self {
            agents,
            world,
            tick: 0,
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn world(&self) -> &S {
        &self.world
    }

    /// Number of ticks executed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn into_parts(self) -> (Vec<Agent>, S) {
        (self.agents, self.world)
    }
}

/// Summary of one executed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Index of the tick (0-based).
    pub tick: u64,
    /// Action vector handed to the world model.
    pub actions: Vec<Option<Symbol>>,
    /// Per-agent outcome.
    pub outcomes: Vec<AgentOutcome>,
}

/// View handed to the per-tick observer once the tick has fully completed.
pub struct TickResult<'a, S> {
    pub tick: u64,
    pub actions: &'a [Option<Symbol>],
    pub outcomes: &'a [AgentOutcome],
    pub agents: &'a [Agent],
    pub world: &'a S,
}

/// Setup errors. Nothing here can occur once a run has started.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{agents} agent records supplied but the world tracks {world} agents")]
    AgentCountMismatch { agents: usize, world: usize },
    #[error("World reports {actual} cells, grid has {expected}")]
    CellCountMismatch { expected: usize, actual: usize },
    #[error("Invalid world state: {0}")]
    World(#[from] WorldError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Drives agents and a world model tick by tick.
pub struct Engine<M> {
    model: M,
    costs: InstructionCosts,
}

impl<M: WorldModel> Engine<M> {
    /// Create an engine. The cost table must cover every opcode.
    pub fn new(model: M, costs: InstructionCosts) -> Result<Self, EngineError> {
        costs.validate()?;
        Ok(Self { model, costs })
    }

    pub fn costs(&self) -> &InstructionCosts {
        &self.costs
    }

    /// Run one tick.
    pub fn tick(&mut self, run: &mut RunState<M::State>) -> TickReport {
        let tick = run.tick;
        let mut actions = vec![None; run.agents.len()];
        let mut outcomes = Vec::with_capacity(run.agents.len());

        for (id, agent) in run.agents.iter_mut().enumerate() {
            if !agent.alive {
                outcomes.push(AgentOutcome::Dead);
                continue;
            }

            agent.freeze -= 1;
            if agent.freeze >= 0 {
                outcomes.push(AgentOutcome::Frozen);
                continue;
            }

            let outcome = match self.step_agent(id, agent, &run.world) {
                Ok((opcode, action)) => {
                    actions[id] = action;
                    AgentOutcome::Executed(opcode)
                }
                Err(fault) => {
                    debug!("tick {tick}: agent {id} died at pointer {}: {fault:?}", agent.pointer);
                    agent.alive = false;
                    run.world.kill(id);
                    AgentOutcome::Faulted(fault)
                }
            };
            outcomes.push(outcome);
        }

        run.world = self.model.iterate(&actions, &run.world);

        // The world model may kill agents too (e.g. leaving the grid).
        for (id, agent) in run.agents.iter_mut().enumerate() {
            if agent.alive && !run.world.is_alive(id) {
                agent.alive = false;
            }
        }
        run.tick += 1;

        TickReport {
            tick,
            actions,
            outcomes,
        }
    }

    /// Run `n` ticks, calling `on_tick` after each one.
    pub fn run_ticks<F>(&mut self, n: u64, run: &mut RunState<M::State>, mut on_tick: F)
    where
        F: FnMut(&TickResult<'_, M::State>),
    {
        for _ in 0..n {
            let report = self.tick(run);
            on_tick(&TickResult {
                tick: report.tick,
                actions: &report.actions,
                outcomes: &report.outcomes,
                agents: &run.agents,
                world: &run.world,
            });
        }
    }

    /// Fetch, decode and execute one instruction. On success the agent adopts
    /// the new memory and pointer and its freeze counter grows by the cost.
    fn step_agent(
        &self,
        id: usize,
        agent: &mut Agent,
        world: &M::State,
    ) -> Result<(Opcode, Option<Symbol>), Fault> {
        let symbol = *agent
            .memory
            .get(agent.pointer)
            .ok_or(Fault::PointerOutOfRange)?;
        let opcode = Opcode::decode(symbol).ok_or(Fault::UnknownOpcode(symbol))?;

        let Step {
            action,
            memory,
            pointer,
        } = isa::execute(opcode, id, &agent.memory, world, agent.pointer)
            .ok_or(Fault::Handler(opcode))?;

        let rewritten = match memory {
            Cow::Owned(image) => Some(image),
            Cow::Borrowed(_) => None,
        };
        if let Some(image) = rewritten {
            agent.memory = image;
        }
        agent.pointer = pointer;
        agent.freeze += i64::from(self.costs.cost(opcode));

        Ok((opcode, action))
    }
}
