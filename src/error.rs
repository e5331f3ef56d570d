//! Error types for statesim.
//!
//! All errors are strongly typed using thiserror. Construction failures and
//! run-time snippet failures are separate enums so callers can tell a
//! malformed machine definition apart from a simulation that crashed
//! mid-iteration.

use thiserror::Error;

/// Errors raised while building a machine graph.
///
/// Build errors are always fatal to the construction step that produced
/// them and never occur once a simulation is running.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("syntax error at byte {position} in `{snippet}`: {reason}")]
    Compile {
        snippet: String,
        position: usize,
        reason: String,
    },

    #[error("transition from '{from}' references unknown destination '{destination}'")]
    UnknownDestination {
        from: String,
        destination: String,
    },

    #[error("default state '{name}' not found in machine")]
    UnknownDefaultState {
        name: String,
    },

    #[error("state machine has no states")]
    EmptyMachine,

    #[error("malformed machine spec: {message}")]
    MalformedSpec {
        message: String,
    },

    #[error("failed to read spec file: {message}")]
    SpecIo {
        message: String,
    },
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedSpec {
            message: err.to_string(),
        }
    }
}

/// Errors raised while evaluating a condition or executing an action
/// mid-iteration.
///
/// A runtime error aborts the current step; the simulation does not retry a
/// failed snippet. The run thread records the error and surfaces it to the
/// controller through the next blocking control call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unknown key '{key}' referenced by `{snippet}`")]
    UnknownKey {
        key: String,
        snippet: String,
    },

    #[error("type mismatch in `{snippet}`: {reason}")]
    TypeMismatch {
        snippet: String,
        reason: String,
    },

    #[error("condition `{snippet}` did not evaluate to a boolean")]
    NotABool {
        snippet: String,
    },

    #[error("division by zero in `{snippet}`")]
    DivisionByZero {
        snippet: String,
    },
}

/// Errors surfaced by the run-control protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The run thread died executing a snippet. The recorded fault stays
    /// attached to the simulation until the controller claims it with
    /// [`Simulation::take_fault`](crate::Simulation::take_fault).
    #[error("run thread faulted: {source}")]
    Faulted {
        #[source]
        source: RuntimeError,
    },
}

/// Top-level error type for statesim.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("control error: {0}")]
    Control(#[from] ControlError),
}

impl SimError {
    /// Returns true if this is a build error.
    #[must_use]
    pub const fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Returns true if this is a runtime error.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    /// Returns true if this is a control error.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }
}

/// Result type alias for statesim operations.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_snippet_and_position() {
        let err = BuildError::Compile {
            snippet: "x +".to_string(),
            position: 3,
            reason: "expected an operand".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("x +"));
        assert!(msg.contains("byte 3"));
    }

    #[test]
    fn unknown_destination_names_both_states() {
        let err = BuildError::UnknownDestination {
            from: "Red".to_string(),
            destination: "Gren".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Red"));
        assert!(msg.contains("Gren"));
    }

    #[test]
    fn sim_error_from_build() {
        let err: SimError = BuildError::EmptyMachine.into();
        assert!(err.is_build());
        assert!(!err.is_runtime());
    }

    #[test]
    fn sim_error_from_runtime() {
        let err: SimError = RuntimeError::UnknownKey {
            key: "speed".to_string(),
            snippet: "speed > 3".to_string(),
        }
        .into();
        assert!(err.is_runtime());
    }

    #[test]
    fn control_error_carries_the_fault() {
        let fault = RuntimeError::DivisionByZero {
            snippet: "x / y".to_string(),
        };
        let err: SimError = ControlError::Faulted { source: fault }.into();
        assert!(err.is_control());
        let msg = format!("{err}");
        assert!(msg.contains("x / y"));
    }

    #[test]
    fn malformed_spec_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BuildError = parse_err.into();
        assert!(matches!(err, BuildError::MalformedSpec { .. }));
    }
}
