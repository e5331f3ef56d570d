//! Live state nodes for a running simulation.
//!
//! An [`ActiveState`] is one simulation's instantiation of a template: the
//! current [`StateId`] plus an owned child that exists only while the
//! current template nests a default child. The child is discarded and
//! rebuilt every time the node activates a state, so at any moment there is
//! exactly one active path from the root down to a childless leaf.

use crate::data::SimData;
use crate::error::RuntimeError;
use crate::machine::template::{MachineGraph, StateId};

/// A runtime state node bound to one simulation's environment.
#[derive(Debug)]
pub struct ActiveState {
    template: StateId,
    child: Option<Box<ActiveState>>,
}

impl ActiveState {
    /// Creates a node for `template` and immediately activates it:
    /// construction and activation are one operation.
    pub fn new(
        graph: &MachineGraph,
        template: StateId,
        data: &mut SimData,
    ) -> Result<Self, RuntimeError> {
        let mut state = Self {
            template,
            child: None,
        };
        state.activate(graph, data)?;
        Ok(state)
    }

    /// Runs the current template's enter action, then rebuilds and
    /// recursively activates the default child, cascading activation down
    /// to the innermost leaf.
    pub fn activate(&mut self, graph: &MachineGraph, data: &mut SimData) -> Result<(), RuntimeError> {
        let template = graph.state(self.template);
        if let Some(action) = template.enter_action() {
            action.run(data)?;
        }
        self.child = match template.default_child() {
            Some(child) => Some(Box::new(ActiveState::new(graph, child, data)?)),
            None => None,
        };
        Ok(())
    }

    /// Runs one iteration at this level and below.
    ///
    /// If a transition fires, the order is exit action, transition action,
    /// then activation of the destination — and the old child is *not*
    /// iterated this step. Otherwise the during action runs and the child
    /// (if any) iterates recursively. Action side effects on the shared
    /// environment are observable, so this ordering is load-bearing.
    pub fn iterate(&mut self, graph: &MachineGraph, data: &mut SimData) -> Result<(), RuntimeError> {
        let template = graph.state(self.template);
        if let Some(transition) = template.check_transitions(data)? {
            let destination = transition.destination();
            if let Some(action) = template.exit_action() {
                action.run(data)?;
            }
            if let Some(action) = transition.action() {
                action.run(data)?;
            }
            self.template = destination;
            self.activate(graph, data)?;
        } else {
            if let Some(action) = template.during_action() {
                action.run(data)?;
            }
            if let Some(child) = self.child.as_mut() {
                child.iterate(graph, data)?;
            }
        }
        Ok(())
    }

    /// The template this node currently instantiates.
    #[must_use]
    pub const fn template(&self) -> StateId {
        self.template
    }

    /// The active child, if the current template nests one.
    #[must_use]
    pub fn child(&self) -> Option<&ActiveState> {
        self.child.as_deref()
    }

    /// State names from this node down to the active leaf.
    #[must_use]
    pub fn active_path(&self, graph: &MachineGraph) -> Vec<String> {
        let mut path = Vec::new();
        let mut node = Some(self);
        while let Some(current) = node {
            path.push(graph.state(current.template).name().to_string());
            node = current.child();
        }
        path
    }
}
