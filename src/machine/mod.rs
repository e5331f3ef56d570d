//! The state-machine data model.
//!
//! [`template`] holds the immutable definitions (templates, transitions,
//! and the arena graph that owns them), [`active`] the per-simulation
//! runtime tree, and [`spec`] the declarative JSON construction path.

pub mod active;
pub mod spec;
pub mod template;

pub use active::ActiveState;
pub use spec::{
    build_machine, build_subtree, load_simulations, load_simulations_from_path, MachineFileSpec,
    MachineSpec, SimSpec, StateSpec, TransitionSpec,
};
pub use template::{MachineGraph, StateId, StateTemplate, Transition};
