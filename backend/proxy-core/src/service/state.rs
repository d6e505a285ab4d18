use std::fmt::{Display, Formatter, Result as FormatResult};

/// Lifecycle of the proxy service host.
///
/// `Starting -> Running` happens on the initializer thread. `Stopped` is
/// terminal for an instance; a new start re-enters `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Unstarted,
    Starting,
    Running,
    /// Native start-up returned an error. The instance is still held so
    /// `stop` tears it down.
    Failed,
    Stopped,
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            ServiceState::Unstarted => "unstarted",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Failed => "failed",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was constructed and its initialization scheduled.
    Started,
    /// An instance already exists. Nothing was constructed.
    AlreadyRunning,
}
