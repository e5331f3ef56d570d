//! The logging collaborator.
//!
//! A [`LogSink`] accepts structured per-iteration records and acknowledges
//! each one. Sinks follow a scoped-resource contract: connect, log, and
//! release on every exit path — [`SinkSession`] enforces the release. The
//! [`Dispatcher`](dispatcher::Dispatcher) moves records from the run thread
//! to a sink without ever blocking an iteration.
//!
//! Nothing in the core algorithm requires telemetry; a simulation built
//! without a dispatcher logs nothing.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, DispatcherConfig};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sim::SimulationId;
use crate::sim::warnings::{ControlWarning, WarningSink};

/// One iteration's worth of telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    /// Which simulation produced the record.
    pub simulation: SimulationId,
    /// The elapsed-iteration count after this step.
    pub iteration: u64,
    /// When the step completed.
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the data environment after the step.
    pub data: serde_json::Value,
}

/// A destination for iteration records.
///
/// The contract is scoped: `connect` before any `log_data`, `close` exactly
/// once afterwards, on every exit path. Use [`SinkSession`] rather than
/// calling `close` by hand.
pub trait LogSink: Send {
    /// Establishes the connection. Returns false if the sink is
    /// unavailable.
    fn connect(&mut self) -> bool;

    /// Logs one record. Returns true when the record was acknowledged.
    fn log_data(&mut self, record: &IterationRecord) -> bool;

    /// Releases the connection.
    fn close(&mut self);
}

/// A sink that acknowledges everything and stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn connect(&mut self) -> bool {
        true
    }

    fn log_data(&mut self, _record: &IterationRecord) -> bool {
        true
    }

    fn close(&mut self) {}
}

/// A sink that renders each record to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn connect(&mut self) -> bool {
        true
    }

    fn log_data(&mut self, record: &IterationRecord) -> bool {
        match serde_json::to_string(record) {
            Ok(rendered) => {
                tracing::debug!(target: "statesim::telemetry", "{rendered}");
                true
            }
            Err(_) => false,
        }
    }

    fn close(&mut self) {}
}

/// A connected sink that is guaranteed to be released.
///
/// Opening connects; dropping closes, whether the scope ends normally or by
/// early return.
pub struct SinkSession<'a> {
    sink: &'a mut dyn LogSink,
}

impl<'a> SinkSession<'a> {
    /// Connects the sink. Returns `None` when the sink is unavailable, in
    /// which case `close` is not called.
    pub fn open(sink: &'a mut dyn LogSink) -> Option<Self> {
        if sink.connect() {
            Some(Self { sink })
        } else {
            None
        }
    }

    /// Logs one record through the open connection.
    pub fn log_data(&mut self, record: &IterationRecord) -> bool {
        self.sink.log_data(record)
    }
}

impl Drop for SinkSession<'_> {
    fn drop(&mut self) {
        self.sink.close();
    }
}

/// Resolves a sink by kind name.
///
/// Unknown kinds degrade to [`NullSink`] and report
/// [`ControlWarning::UnknownSinkKind`] — an unresolved optional
/// collaborator never aborts a load.
pub fn sink_for(kind: &str, warnings: &dyn WarningSink) -> Box<dyn LogSink> {
    match kind {
        "null" => Box::new(NullSink),
        "tracing" => Box::new(TracingSink),
        other => {
            warnings.warn(ControlWarning::UnknownSinkKind {
                kind: other.to_string(),
            });
            Box::new(NullSink)
        }
    }
}
