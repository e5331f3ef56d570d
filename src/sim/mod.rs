//! Simulation control.
//!
//! A [`Simulation`] owns one data environment and one active-state tree and
//! runs its iterate loop on a dedicated, named worker thread. Controllers
//! drive it from other threads with [`start`](Simulation::start),
//! [`pause`](Simulation::pause), [`stop`](Simulation::stop), and
//! [`wait`](Simulation::wait); all blocking is condvar-based, never a spin
//! on shared flags.
//!
//! The worker is the only mutator of the environment and the elapsed
//! counter. Controllers mutate only run-control state, and budget changes
//! are observed at iteration boundaries: an in-flight iteration always
//! finishes first. "Safe" means the loop is between iterations and both
//! the environment and the control state are quiescent.
//!
//! Cancellation is cooperative with one-iteration granularity. An action
//! that never returns blocks the whole simulation, including `pause`,
//! `stop`, and drop; there is no mid-iteration preemption.

pub mod warnings;

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::SimData;
use crate::error::{ControlError, RuntimeError, SimResult};
use crate::machine::active::ActiveState;
use crate::machine::template::{MachineGraph, StateId};
use crate::telemetry::{Dispatcher, IterationRecord};

use warnings::{ControlWarning, TracingWarningSink, WarningSink};

/// Unique identifier for a simulation, used in diagnostics and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(Uuid);

impl SimulationId {
    /// Creates a new random simulation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SimulationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the worker and the controllers share, behind one lock.
struct RunState {
    data: SimData,
    root: ActiveState,
    running: bool,
    /// Remaining iteration budget. `None` is unbounded.
    remaining: Option<u64>,
    /// True while the loop is between iterations (or not running at all).
    safe: bool,
    elapsed: u64,
    fault: Option<RuntimeError>,
}

struct Shared {
    state: Mutex<RunState>,
    cond: Condvar,
}

/// One simulation of a machine graph.
///
/// Created from a root template and an initial environment; creation
/// eagerly activates the hierarchy down to its leaf default child, running
/// enter actions against the environment.
pub struct Simulation {
    id: SimulationId,
    graph: Arc<MachineGraph>,
    shared: Arc<Shared>,
    warnings: Arc<dyn WarningSink>,
    telemetry: Option<Arc<Dispatcher>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Simulation {
    /// Creates a simulation with the default collaborators: warnings go to
    /// `tracing`, telemetry is disabled.
    pub fn new(graph: Arc<MachineGraph>, root: StateId, data: SimData) -> SimResult<Self> {
        Self::with_collaborators(graph, root, data, Arc::new(TracingWarningSink), None)
    }

    /// Creates a simulation with explicit collaborators. There is no
    /// ambient registry; whoever builds the simulation decides where its
    /// warnings and telemetry go.
    pub fn with_collaborators(
        graph: Arc<MachineGraph>,
        root: StateId,
        mut data: SimData,
        warnings: Arc<dyn WarningSink>,
        telemetry: Option<Arc<Dispatcher>>,
    ) -> SimResult<Self> {
        let root = ActiveState::new(&graph, root, &mut data)?;
        Ok(Self {
            id: SimulationId::new(),
            graph,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState {
                    data,
                    root,
                    running: false,
                    remaining: None,
                    safe: true,
                    elapsed: 0,
                    fault: None,
                }),
                cond: Condvar::new(),
            }),
            warnings,
            telemetry,
            join: Mutex::new(None),
        })
    }

    /// This simulation's id.
    #[must_use]
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// The shared machine definition this simulation runs.
    #[must_use]
    pub fn graph(&self) -> &MachineGraph {
        &self.graph
    }

    /// Sets the iteration budget (`None` = unbounded) and ensures the run
    /// loop is going.
    ///
    /// Calling `start` on a running simulation only updates the budget — a
    /// second loop is never spawned. A simulation with an unclaimed fault
    /// refuses to start; claim it with [`take_fault`](Self::take_fault)
    /// first.
    pub fn start(&self, iterations: Option<u64>) -> SimResult<()> {
        let mut st = self.shared.state.lock().unwrap();
        if let Some(fault) = st.fault.clone() {
            return Err(ControlError::Faulted { source: fault }.into());
        }

        st.remaining = iterations;
        if st.running {
            // The worker may have drained its previous budget and parked.
            self.shared.cond.notify_all();
            return Ok(());
        }

        st.running = true;
        st.safe = false;
        drop(st);

        let mut join = self.join.lock().unwrap();
        // Reap a worker that exited on its own before spawning the next.
        if let Some(handle) = join.take() {
            let _ = handle.join();
        }
        let graph = Arc::clone(&self.graph);
        let shared = Arc::clone(&self.shared);
        let telemetry = self.telemetry.clone();
        let id = self.id;
        *join = Some(
            thread::Builder::new()
                .name(format!("statesim-run-{id}"))
                .spawn(move || run_loop(&graph, &shared, telemetry.as_deref(), id))
                .expect("failed to spawn statesim run thread"),
        );
        Ok(())
    }

    /// Zeroes the budget and blocks until the loop reaches a safe point.
    ///
    /// Returns the budget captured at the pause instant so the caller can
    /// resume with `start(captured)` and complete the original count.
    pub fn pause(&self) -> SimResult<Option<u64>> {
        let mut st = self.shared.state.lock().unwrap();
        let captured = st.remaining;
        st.remaining = Some(0);
        while !st.safe {
            if st.fault.is_some() {
                break;
            }
            st = self.shared.cond.wait(st).unwrap();
        }
        if let Some(fault) = st.fault.clone() {
            return Err(ControlError::Faulted { source: fault }.into());
        }
        Ok(captured)
    }

    /// Lets the loop drain `after` more iterations, then clears the
    /// running flag and joins the worker.
    ///
    /// Stopping a simulation that is not running is a no-op that reports
    /// [`ControlWarning::StopWhileStopped`] — a usage mistake, not a fault.
    pub fn stop(&self, after: u64) -> SimResult<()> {
        let mut st = self.shared.state.lock().unwrap();
        if let Some(fault) = st.fault.clone() {
            drop(st);
            self.reap_worker();
            return Err(ControlError::Faulted { source: fault }.into());
        }
        if !st.running {
            self.warnings.warn(ControlWarning::StopWhileStopped);
            return Ok(());
        }

        st.remaining = Some(after);
        self.shared.cond.notify_all();
        loop {
            if st.fault.is_some() {
                break;
            }
            if st.safe && st.remaining == Some(0) {
                break;
            }
            st = self.shared.cond.wait(st).unwrap();
        }
        if let Some(fault) = st.fault.clone() {
            drop(st);
            self.reap_worker();
            return Err(ControlError::Faulted { source: fault }.into());
        }

        st.running = false;
        self.shared.cond.notify_all();
        drop(st);
        self.reap_worker();
        Ok(())
    }

    /// Blocks until a bounded budget drains and the loop is safe.
    ///
    /// Returns immediately for an unbounded (or never-started) simulation:
    /// there is nothing to drain. Does not alter the budget.
    pub fn wait(&self) -> SimResult<()> {
        let mut st = self.shared.state.lock().unwrap();
        loop {
            if let Some(fault) = st.fault.clone() {
                return Err(ControlError::Faulted { source: fault }.into());
            }
            match st.remaining {
                None => return Ok(()),
                Some(0) if st.safe => return Ok(()),
                _ => st = self.shared.cond.wait(st).unwrap(),
            }
        }
    }

    /// Iterations completed so far. Meaningful to controllers only after a
    /// blocking control call has returned.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.shared.state.lock().unwrap().elapsed
    }

    /// The current remaining budget (`None` = unbounded).
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.shared.state.lock().unwrap().remaining
    }

    /// Whether the run loop is live. Draining the budget parks the loop
    /// but does not clear this flag; only `stop` (or a fault) does.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().unwrap().running
    }

    /// Clones the data environment. Call only after a blocking control
    /// call has returned; mid-run contents are the worker's business.
    #[must_use]
    pub fn snapshot(&self) -> SimData {
        self.shared.state.lock().unwrap().data.clone()
    }

    /// State names from the root to the active leaf.
    #[must_use]
    pub fn active_path(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .unwrap()
            .root
            .active_path(&self.graph)
    }

    /// Claims the recorded fault, if any, clearing it so the simulation
    /// can be started again.
    #[must_use]
    pub fn take_fault(&self) -> Option<RuntimeError> {
        self.shared.state.lock().unwrap().fault.take()
    }

    fn reap_worker(&self) {
        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock().unwrap();
            st.running = false;
            st.remaining = Some(0);
            self.shared.cond.notify_all();
        }
        self.reap_worker();
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The iterate loop. Holds the lock across one iteration and releases it
/// between iterations, so controllers cut in exactly at step boundaries.
fn run_loop(
    graph: &MachineGraph,
    shared: &Shared,
    telemetry: Option<&Dispatcher>,
    id: SimulationId,
) {
    tracing::debug!(simulation = %id, "run thread started");
    let mut st = shared.state.lock().unwrap();
    loop {
        if !st.running {
            st.safe = true;
            shared.cond.notify_all();
            break;
        }

        if st.remaining == Some(0) {
            // Budget drained: park until a controller changes it.
            st.safe = true;
            shared.cond.notify_all();
            st = shared.cond.wait(st).unwrap();
            continue;
        }

        st.safe = false;
        if let Some(n) = st.remaining {
            st.remaining = Some(n - 1);
        }

        let RunState { data, root, .. } = &mut *st;
        match root.iterate(graph, data) {
            Ok(()) => {
                st.elapsed += 1;
                if let Some(dispatcher) = telemetry {
                    dispatcher.publish(IterationRecord {
                        simulation: id,
                        iteration: st.elapsed,
                        timestamp: Utc::now(),
                        data: st.data.to_json(),
                    });
                }
            }
            Err(fault) => {
                tracing::error!(simulation = %id, error = %fault, "iteration faulted, run is over");
                st.fault = Some(fault);
                st.running = false;
                st.safe = true;
                shared.cond.notify_all();
                break;
            }
        }

        drop(st);
        st = shared.state.lock().unwrap();
    }
    tracing::debug!(simulation = %id, "run thread exited");
}
