//! Worker lifecycle state machine.

use serde::Serialize;

/// State of the worker process.
///
/// Shutdown is cooperative: a signal moves the worker to `Draining`, the
/// in-flight cycle finishes, and only then does the worker stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Validating configuration and wiring dependencies.
    Starting,
    /// Consuming the inbound queue.
    Running,
    /// Termination requested; finishing the current cycle.
    Draining,
    /// Loop exited, queue connection released.
    Stopped,
}

impl WorkerState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, target),
            (Starting, Running) | (Running, Draining) | (Draining, Stopped)
        )
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}
