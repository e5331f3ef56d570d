//! # statesim — hierarchical state-machine simulation
//!
//! statesim runs user-defined hierarchical state machines whose per-state
//! behavior (entry/during/exit actions) and transition guards are small
//! scripts over a shared mutable key/value environment. Each simulation
//! walks its machine iteration by iteration on a dedicated worker thread,
//! while a controller starts it for N iterations, pauses it, resumes it,
//! or stops it from any other thread.
//!
//! ## Core Concepts
//!
//! - **[`MachineGraph`]**: the arena of immutable [`StateTemplate`]s one
//!   machine definition consists of; shareable across concurrent runs
//! - **[`ActiveState`]**: one simulation's live instantiation of a
//!   template, including its active child chain
//! - **[`SimData`]**: the environment conditions read and actions mutate
//! - **[`Simulation`]**: the run loop plus its thread-safe
//!   start/pause/stop/wait controller
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use statesim::{MachineGraph, SimData, Simulation};
//!
//! let mut graph = MachineGraph::new();
//! let red = graph.add_state("Red");
//! let green = graph.add_state("Green");
//! graph
//!     .set_enter_action(red, "timeOn = 0; light = 'red'")?
//!     .set_during_action(red, "timeOn += 1")?
//!     .add_transition(red, "timeOn > 19", green, None)?
//!     .set_enter_action(green, "timeOn = 0; light = 'green'")?
//!     .set_during_action(green, "timeOn += 1")?
//!     .add_transition(green, "timeOn > 9", red, None)?;
//!
//! let sim = Simulation::new(Arc::new(graph), red, SimData::new())?;
//! sim.start(Some(25))?;
//! sim.wait()?;
//! assert_eq!(sim.elapsed(), 25);
//! sim.stop(0)?;
//! # Ok::<(), statesim::SimError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod data;
pub mod error;
pub mod expr;
pub mod machine;
pub mod sim;
pub mod telemetry;
pub mod value;

// Re-export primary types at crate root for convenience
pub use data::SimData;
pub use error::{BuildError, ControlError, RuntimeError, SimError, SimResult};
pub use expr::{compile_condition, compile_program, CompiledCondition, CompiledProgram};
pub use machine::{
    build_machine, build_subtree, load_simulations, load_simulations_from_path, ActiveState,
    MachineFileSpec, MachineGraph, MachineSpec, SimSpec, StateId, StateSpec, StateTemplate,
    Transition, TransitionSpec,
};
pub use sim::warnings::{ControlWarning, RecordingWarningSink, TracingWarningSink, WarningSink};
pub use sim::{Simulation, SimulationId};
pub use telemetry::{
    sink_for, Dispatcher, DispatcherConfig, IterationRecord, LogSink, NullSink, SinkSession,
    TracingSink,
};
pub use value::Value;
