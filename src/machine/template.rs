//! State templates and the machine graph that owns them.
//!
//! A [`StateTemplate`] describes one state: its outgoing transitions (in
//! priority order), optional enter/during/exit actions, and an optional
//! default child for hierarchical nesting. Templates hold no per-run state,
//! so a finished [`MachineGraph`] wrapped in an `Arc` can back any number of
//! concurrent simulations.
//!
//! Templates live in an arena and reference each other by [`StateId`];
//! looping machines (A → B → A) are just index cycles, with no shared
//! ownership involved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::SimData;
use crate::error::{BuildError, RuntimeError};
use crate::expr::{compile_condition, compile_program, CompiledCondition, CompiledProgram};

/// Index of a state template within its [`MachineGraph`].
///
/// Ids are only meaningful for the graph that minted them; indexing one
/// graph with another graph's id is a logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(usize);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// An edge out of a state: a guard condition, a destination, and an
/// optional action run when the transition fires.
///
/// The destination must belong to the same hierarchy level as the source;
/// that is a caller responsibility and is not validated here.
#[derive(Debug, Clone)]
pub struct Transition {
    condition: CompiledCondition,
    destination: StateId,
    action: Option<CompiledProgram>,
}

impl Transition {
    /// The state this transition leads to.
    #[must_use]
    pub const fn destination(&self) -> StateId {
        self.destination
    }

    /// The action run when the transition fires, if any.
    #[must_use]
    pub fn action(&self) -> Option<&CompiledProgram> {
        self.action.as_ref()
    }

    /// Source text of the guard condition.
    #[must_use]
    pub fn condition_source(&self) -> &str {
        self.condition.source()
    }

    pub(crate) fn condition(&self) -> &CompiledCondition {
        &self.condition
    }
}

/// An immutable-after-construction description of one state.
#[derive(Debug, Clone)]
pub struct StateTemplate {
    name: String,
    transitions: Vec<Transition>,
    enter_action: Option<CompiledProgram>,
    during_action: Option<CompiledProgram>,
    exit_action: Option<CompiledProgram>,
    default_child: Option<StateId>,
}

impl StateTemplate {
    fn new(name: String) -> Self {
        Self {
            name,
            transitions: Vec::new(),
            enter_action: None,
            during_action: None,
            exit_action: None,
            default_child: None,
        }
    }

    /// The human-readable name of this state. Names are for diagnostics and
    /// declarative wiring; they are not required to be unique.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outgoing transitions in priority order (insertion order).
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The child template entered whenever this state activates, if this
    /// state nests a child machine.
    #[must_use]
    pub const fn default_child(&self) -> Option<StateId> {
        self.default_child
    }

    #[must_use]
    pub fn enter_action(&self) -> Option<&CompiledProgram> {
        self.enter_action.as_ref()
    }

    #[must_use]
    pub fn during_action(&self) -> Option<&CompiledProgram> {
        self.during_action.as_ref()
    }

    #[must_use]
    pub fn exit_action(&self) -> Option<&CompiledProgram> {
        self.exit_action.as_ref()
    }

    /// Evaluates each transition's condition in priority order and returns
    /// the first that holds, or `None` when none do.
    ///
    /// Evaluator failures propagate; a broken condition must never be
    /// silently treated as false.
    pub fn check_transitions(&self, data: &SimData) -> Result<Option<&Transition>, RuntimeError> {
        for transition in &self.transitions {
            if transition.condition().eval(data)? {
                return Ok(Some(transition));
            }
        }
        Ok(None)
    }

    /// Renders the state, its action sources, and its transitions for
    /// debugging mis-wired graphs.
    #[must_use]
    pub fn describe(&self, graph: &MachineGraph) -> String {
        let mut out = format!("state: {}", self.name);

        for (label, action) in [
            ("entry", self.enter_action.as_ref()),
            ("during", self.during_action.as_ref()),
            ("exit", self.exit_action.as_ref()),
        ] {
            if let Some(action) = action {
                out.push_str(&format!("\n\n{label}:\n{}", action.source()));
            }
        }

        if !self.transitions.is_empty() {
            out.push_str("\n\ntransitions:");
            for t in &self.transitions {
                out.push('\n');
                out.push_str(&format!("({})", t.condition_source()));
                if let Some(action) = t.action() {
                    out.push_str(&format!("[{}]", action.source()));
                }
                out.push_str(&format!("--> {}", graph.state(t.destination()).name()));
            }
        }

        out
    }
}

/// The arena that owns every [`StateTemplate`] of one machine definition.
///
/// Built once by a construction phase (fluent calls or the declarative
/// loader), then sealed into an `Arc` and shared read-only across
/// simulations.
#[derive(Debug, Clone, Default)]
pub struct MachineGraph {
    states: Vec<StateTemplate>,
}

impl MachineGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new state template and returns its id.
    pub fn add_state(&mut self, name: impl Into<String>) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(StateTemplate::new(name.into()));
        id
    }

    /// Adds a transition from `from` to `destination`.
    ///
    /// Condition and action text compile immediately; a compile failure
    /// returns a [`BuildError`] and leaves the state unchanged. Returns
    /// `&mut Self` so construction chains fluently. Later-added transitions
    /// have lower priority.
    pub fn add_transition(
        &mut self,
        from: StateId,
        condition: &str,
        destination: StateId,
        action: Option<&str>,
    ) -> Result<&mut Self, BuildError> {
        let condition = compile_condition(condition)?;
        let action = action.map(compile_program).transpose()?;
        self.states[from.0].transitions.push(Transition {
            condition,
            destination,
            action,
        });
        Ok(self)
    }

    /// Sets the action run when `state` is entered. A compile failure
    /// leaves the previous action (if any) unchanged.
    pub fn set_enter_action(
        &mut self,
        state: StateId,
        text: &str,
    ) -> Result<&mut Self, BuildError> {
        let compiled = compile_program(text)?;
        self.states[state.0].enter_action = Some(compiled);
        Ok(self)
    }

    /// Sets the action run each iteration the machine remains in `state`.
    /// A compile failure leaves the previous action (if any) unchanged.
    pub fn set_during_action(
        &mut self,
        state: StateId,
        text: &str,
    ) -> Result<&mut Self, BuildError> {
        let compiled = compile_program(text)?;
        self.states[state.0].during_action = Some(compiled);
        Ok(self)
    }

    /// Sets the action run when the machine leaves `state` through any of
    /// its transitions. A compile failure leaves the previous action (if
    /// any) unchanged.
    pub fn set_exit_action(
        &mut self,
        state: StateId,
        text: &str,
    ) -> Result<&mut Self, BuildError> {
        let compiled = compile_program(text)?;
        self.states[state.0].exit_action = Some(compiled);
        Ok(self)
    }

    /// Makes `child` the default child of `parent`, turning `parent` into a
    /// hierarchical state. The nesting is expected to be acyclic; that is a
    /// caller responsibility.
    pub fn set_default_child(&mut self, parent: StateId, child: StateId) -> &mut Self {
        self.states[parent.0].default_child = Some(child);
        self
    }

    /// Looks up a template by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was minted by a different graph.
    #[must_use]
    pub fn state(&self, id: StateId) -> &StateTemplate {
        &self.states[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
