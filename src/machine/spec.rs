//! Declarative machine construction.
//!
//! A spec file holds `statemachines` (each a flat list of `states` plus a
//! `defaultstate`) and `simulations` binding a machine index to an
//! `initialdata` map. States nest through `children`, and a state's
//! `transitions` are wired among its siblings by name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::data::SimData;
use crate::error::{BuildError, SimResult};
use crate::machine::template::{MachineGraph, StateId};
use crate::sim::warnings::{ControlWarning, WarningSink};
use crate::sim::Simulation;

/// One transition edge in a spec. `destination` names a sibling state.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionSpec {
    pub condition: String,
    pub destination: String,
    #[serde(default)]
    pub action: Option<String>,
}

/// One state in a spec, possibly nesting children.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub during: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
    #[serde(default)]
    pub children: Vec<StateSpec>,
    #[serde(default, rename = "defaultChild")]
    pub default_child: Option<String>,
}

/// A whole machine: flat top-level states and the one to start in.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct MachineSpec {
    pub states: Vec<StateSpec>,
    pub defaultstate: String,
}

/// Binds a machine (by index into `statemachines`) to initial data.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct SimSpec {
    pub statemachine: usize,
    pub initialdata: serde_json::Map<String, serde_json::Value>,
}

/// Top-level spec file.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct MachineFileSpec {
    pub statemachines: Vec<MachineSpec>,
    #[serde(default)]
    pub simulations: Vec<SimSpec>,
}

/// Recursively builds the subtree described by `spec` into `graph` and
/// returns the root's id.
///
/// Each child's transitions are wired among its siblings; a destination
/// name with no matching sibling is a hard
/// [`BuildError::UnknownDestination`]. When children exist but no
/// `defaultChild` is named, the first declared child is chosen and the
/// fallback is reported through `warnings` — deterministic, but never
/// silent. The root's own `transitions` field is left to the caller, which
/// owns the root's sibling namespace.
pub fn build_subtree(
    graph: &mut MachineGraph,
    spec: &StateSpec,
    warnings: &dyn WarningSink,
) -> Result<StateId, BuildError> {
    let id = graph.add_state(spec.name.clone());

    if let Some(entry) = &spec.entry {
        graph.set_enter_action(id, entry)?;
    }
    if let Some(during) = &spec.during {
        graph.set_during_action(id, during)?;
    }
    if let Some(exit) = &spec.exit {
        graph.set_exit_action(id, exit)?;
    }

    if spec.children.is_empty() {
        return Ok(id);
    }

    let mut ids: HashMap<&str, StateId> = HashMap::new();
    let mut first: Option<StateId> = None;
    for child in &spec.children {
        let child_id = build_subtree(graph, child, warnings)?;
        ids.insert(child.name.as_str(), child_id);
        first.get_or_insert(child_id);
    }

    for child in &spec.children {
        let from = ids[child.name.as_str()];
        for t in &child.transitions {
            let Some(&dest) = ids.get(t.destination.as_str()) else {
                return Err(BuildError::UnknownDestination {
                    from: child.name.clone(),
                    destination: t.destination.clone(),
                });
            };
            graph.add_transition(from, &t.condition, dest, t.action.as_deref())?;
        }
    }

    let default_child = match &spec.default_child {
        Some(name) => *ids
            .get(name.as_str())
            .ok_or_else(|| BuildError::UnknownDefaultState { name: name.clone() })?,
        None => {
            let chosen = first.expect("children is non-empty");
            warnings.warn(ControlWarning::ImplicitDefaultChild {
                parent: spec.name.clone(),
                chosen: graph.state(chosen).name().to_string(),
            });
            chosen
        }
    };
    graph.set_default_child(id, default_child);

    Ok(id)
}

/// Builds a complete machine from its spec: every top-level state (and its
/// nested children), sibling transitions among the top-level states, and
/// the starting state named by `defaultstate`.
pub fn build_machine(
    spec: &MachineSpec,
    warnings: &dyn WarningSink,
) -> Result<(Arc<MachineGraph>, StateId), BuildError> {
    if spec.states.is_empty() {
        return Err(BuildError::EmptyMachine);
    }

    let mut graph = MachineGraph::new();
    let mut ids: HashMap<&str, StateId> = HashMap::new();
    for state in &spec.states {
        let id = build_subtree(&mut graph, state, warnings)?;
        ids.insert(state.name.as_str(), id);
    }

    for state in &spec.states {
        let from = ids[state.name.as_str()];
        for t in &state.transitions {
            let Some(&dest) = ids.get(t.destination.as_str()) else {
                return Err(BuildError::UnknownDestination {
                    from: state.name.clone(),
                    destination: t.destination.clone(),
                });
            };
            graph.add_transition(from, &t.condition, dest, t.action.as_deref())?;
        }
    }

    let root = *ids
        .get(spec.defaultstate.as_str())
        .ok_or_else(|| BuildError::UnknownDefaultState {
            name: spec.defaultstate.clone(),
        })?;

    Ok((Arc::new(graph), root))
}

/// Loads every simulation a JSON spec file defines.
///
/// Machines build first; each simulation then binds its machine by index
/// with its own initial data. Simulations share the loader's warning sink.
pub fn load_simulations(
    json: &str,
    warnings: &Arc<dyn WarningSink>,
) -> SimResult<Vec<Simulation>> {
    let file: MachineFileSpec = serde_json::from_str(json).map_err(BuildError::from)?;

    let mut machines = Vec::with_capacity(file.statemachines.len());
    for machine in &file.statemachines {
        machines.push(build_machine(machine, warnings.as_ref())?);
    }

    let mut simulations = Vec::with_capacity(file.simulations.len());
    for sim in &file.simulations {
        let Some((graph, root)) = machines.get(sim.statemachine) else {
            return Err(BuildError::MalformedSpec {
                message: format!(
                    "simulation references state machine {} but only {} are defined",
                    sim.statemachine,
                    machines.len()
                ),
            }
            .into());
        };
        let data = SimData::from_json_map(sim.initialdata.clone());
        simulations.push(Simulation::with_collaborators(
            Arc::clone(graph),
            *root,
            data,
            Arc::clone(warnings),
            None,
        )?);
    }

    Ok(simulations)
}

/// Reads a spec file from disk and loads its simulations.
pub fn load_simulations_from_path(
    path: impl AsRef<Path>,
    warnings: &Arc<dyn WarningSink>,
) -> SimResult<Vec<Simulation>> {
    let json = std::fs::read_to_string(path).map_err(|e| BuildError::SpecIo {
        message: e.to_string(),
    })?;
    load_simulations(&json, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::warnings::RecordingWarningSink;

    fn spec(json: serde_json::Value) -> StateSpec {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn builds_a_flat_machine() {
        let machine: MachineSpec = serde_json::from_value(serde_json::json!({
            "states": [
                {
                    "name": "Red",
                    "entry": "timeOn = 0",
                    "during": "timeOn += 1",
                    "transitions": [
                        {"condition": "timeOn > 19", "destination": "Green"}
                    ]
                },
                {"name": "Green"}
            ],
            "defaultstate": "Red"
        }))
        .unwrap();

        let sink = RecordingWarningSink::new();
        let (graph, root) = build_machine(&machine, &sink).unwrap();
        assert_eq!(graph.state(root).name(), "Red");
        assert_eq!(graph.state(root).transitions().len(), 1);
        assert!(sink.recorded().is_empty());
    }

    #[test]
    fn builds_nested_children_with_sibling_transitions() {
        let root_spec = spec(serde_json::json!({
            "name": "Outer",
            "children": [
                {
                    "name": "Idle",
                    "transitions": [
                        {"condition": "go == true", "destination": "Busy", "action": "starts += 1"}
                    ]
                },
                {"name": "Busy"}
            ],
            "defaultChild": "Idle"
        }));

        let sink = RecordingWarningSink::new();
        let mut graph = MachineGraph::new();
        let outer = build_subtree(&mut graph, &root_spec, &sink).unwrap();

        let child = graph.state(outer).default_child().unwrap();
        assert_eq!(graph.state(child).name(), "Idle");
        assert_eq!(graph.state(child).transitions().len(), 1);
        assert!(sink.recorded().is_empty());
    }

    #[test]
    fn missing_destination_is_a_hard_error() {
        let root_spec = spec(serde_json::json!({
            "name": "Outer",
            "children": [
                {
                    "name": "Idle",
                    "transitions": [
                        {"condition": "true", "destination": "Bussy"}
                    ]
                },
                {"name": "Busy"}
            ],
            "defaultChild": "Idle"
        }));

        let sink = RecordingWarningSink::new();
        let mut graph = MachineGraph::new();
        let err = build_subtree(&mut graph, &root_spec, &sink).unwrap_err();
        let BuildError::UnknownDestination { from, destination } = err else {
            panic!("expected an unknown-destination error");
        };
        assert_eq!(from, "Idle");
        assert_eq!(destination, "Bussy");
    }

    #[test]
    fn implicit_default_child_picks_first_and_warns() {
        let root_spec = spec(serde_json::json!({
            "name": "Outer",
            "children": [
                {"name": "First"},
                {"name": "Second"}
            ]
        }));

        let sink = RecordingWarningSink::new();
        let mut graph = MachineGraph::new();
        let outer = build_subtree(&mut graph, &root_spec, &sink).unwrap();

        let chosen = graph.state(outer).default_child().unwrap();
        assert_eq!(graph.state(chosen).name(), "First");
        assert_eq!(
            sink.recorded(),
            vec![ControlWarning::ImplicitDefaultChild {
                parent: "Outer".to_string(),
                chosen: "First".to_string(),
            }]
        );
    }

    #[test]
    fn unknown_default_state_fails_the_load() {
        let machine: MachineSpec = serde_json::from_value(serde_json::json!({
            "states": [{"name": "Red"}],
            "defaultstate": "Blue"
        }))
        .unwrap();

        let sink = RecordingWarningSink::new();
        let err = build_machine(&machine, &sink).unwrap_err();
        assert!(matches!(err, BuildError::UnknownDefaultState { name } if name == "Blue"));
    }

    #[test]
    fn empty_machine_is_rejected() {
        let machine: MachineSpec = serde_json::from_value(serde_json::json!({
            "states": [],
            "defaultstate": "Red"
        }))
        .unwrap();
        let sink = RecordingWarningSink::new();
        assert!(matches!(
            build_machine(&machine, &sink),
            Err(BuildError::EmptyMachine)
        ));
    }

    #[test]
    fn bad_snippet_in_spec_fails_the_build() {
        let machine: MachineSpec = serde_json::from_value(serde_json::json!({
            "states": [
                {"name": "Red", "entry": "timeOn = "}
            ],
            "defaultstate": "Red"
        }))
        .unwrap();
        let sink = RecordingWarningSink::new();
        assert!(matches!(
            build_machine(&machine, &sink),
            Err(BuildError::Compile { .. })
        ));
    }
}
