//! Non-fatal control warnings and the observer they are reported through.
//!
//! Warnings flag usage mistakes and silent-fallback decisions without
//! altering program state. There is no process-wide registry; each
//! simulation (and the declarative loader) takes an explicit sink reference
//! at construction time.

use std::fmt;
use std::sync::Mutex;

/// Non-fatal conditions reported to the controller or loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlWarning {
    /// `stop` was called on a simulation that was not running.
    StopWhileStopped,

    /// A hierarchical spec declared children but no default child; the
    /// first declared child was chosen.
    ImplicitDefaultChild {
        parent: String,
        chosen: String,
    },

    /// A telemetry sink kind was not recognized; a no-op sink was used
    /// instead.
    UnknownSinkKind {
        kind: String,
    },
}

impl fmt::Display for ControlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopWhileStopped => {
                write!(f, "attempted to stop a simulation that was already stopped")
            }
            Self::ImplicitDefaultChild { parent, chosen } => write!(
                f,
                "default child state not specified for '{parent}', defaulting to '{chosen}'"
            ),
            Self::UnknownSinkKind { kind } => {
                write!(f, "unknown telemetry sink kind '{kind}', using the null sink")
            }
        }
    }
}

/// Observer for control warnings.
pub trait WarningSink: Send + Sync {
    /// Reports one warning. Implementations must not block the caller.
    fn warn(&self, warning: ControlWarning);
}

/// Default sink: forwards warnings to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn warn(&self, warning: ControlWarning) {
        tracing::warn!("{warning}");
    }
}

/// A sink that buffers warnings for later inspection.
#[derive(Debug, Default)]
pub struct RecordingWarningSink {
    warnings: Mutex<Vec<ControlWarning>>,
}

impl RecordingWarningSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<ControlWarning> {
        self.warnings.lock().unwrap().clone()
    }
}

impl WarningSink for RecordingWarningSink {
    fn warn(&self, warning: ControlWarning) {
        self.warnings.lock().unwrap().push(warning);
    }
}
