//! Stop and purge handling for the whole application.
//!
//! A [`ShutdownRequest`] either asks for a graceful stop (stop the proxy
//! service, then quit through the host's normal quit pathway) or for a
//! purge, which is irrecoverable:
//!
//! 1. Every other process of this application is killed
//! 2. All application data is cleared
//! 3. The calling process kills itself
//!
//! Self-termination is always last so the kill loop is never cut short.
//! A purge never falls through to the graceful path.

pub mod process;

use crate::error::lifecycle::LifecycleError;

use models::{QuitOptions, ShutdownRequest};

use std::sync::Arc;

use log::{debug, info, warn};

/// OS process model as seen by the lifecycle controller.
///
/// Implementations must be idempotent: killing a dead process or clearing
/// already-cleared data is not an error.
pub trait ProcessManager: Send + Sync {
    /// PID of the calling process.
    fn own_pid(&self) -> u32;

    /// All processes belonging to this application, including the caller.
    ///
    /// `None` when the process service is unavailable.
    fn package_processes(&self) -> Option<Vec<u32>>;

    /// Terminate `pid`. For the caller's own PID this does not return on a
    /// real system.
    fn kill_process(&self, pid: u32);

    /// Whether [`ProcessManager::clear_application_data`] is supported here.
    fn can_clear_application_data(&self) -> bool;

    fn clear_application_data(&self) -> Result<(), LifecycleError>;
}

/// Graceful stop of the proxy service.
pub trait ServiceStopper: Send + Sync {
    fn stop_service(&self);
}

/// The host application's normal quit pathway.
pub trait ApplicationHost: Send + Sync {
    fn quit_application(&self, options: QuitOptions);
}

/// What the controller did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// `stop` absent or false. Nothing happened.
    Ignored,
    /// Service stopped and graceful quit requested.
    Stopped,
    /// Data cleared and self-kill issued. Only observable when the process
    /// manager did not actually terminate the caller.
    Purged,
}

/// Receives stop/purge requests and carries them out.
pub struct LifecycleController {
    processes: Arc<dyn ProcessManager>,
    service: Arc<dyn ServiceStopper>,
    host: Arc<dyn ApplicationHost>,
    quit_options: QuitOptions,
}

impl LifecycleController {
    pub fn new(
        processes: Arc<dyn ProcessManager>,
        service: Arc<dyn ServiceStopper>,
        host: Arc<dyn ApplicationHost>,
        quit_options: QuitOptions,
    ) -> Self {
        Self {
            processes,
            service,
            host,
            quit_options,
        }
    }

    /// Whether a purge can be offered on this system.
    ///
    /// Callers should hide the purge option when this is false. A purge sent
    /// anyway fails in [`ProcessManager::clear_application_data`] and that
    /// error is returned as-is.
    pub fn can_purge(&self) -> bool {
        self.processes.can_clear_application_data()
    }

    /// Handle an inbound shutdown request.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] only from the purge path, when clearing
    /// application data fails. Sibling processes are already dead by then.
    pub fn handle_shutdown_request(
        &self,
        request: &ShutdownRequest,
    ) -> Result<ShutdownOutcome, LifecycleError> {
        if !request.is_stop() {
            debug!("Ignoring shutdown request without stop: {request:?}");
            return Ok(ShutdownOutcome::Ignored);
        }

        if request.is_purge() {
            return self.purge();
        }

        info!("Stopping service and quitting application");
        self.service.stop_service();
        self.host.quit_application(self.quit_options);

        Ok(ShutdownOutcome::Stopped)
    }

    /// Flag-based entry point with the same semantics as
    /// [`LifecycleController::handle_shutdown_request`].
    pub fn handle_shutdown_flags(
        &self,
        stop: bool,
        purge: bool,
    ) -> Result<ShutdownOutcome, LifecycleError> {
        self.handle_shutdown_request(&ShutdownRequest {
            stop: Some(stop),
            purge: Some(purge),
        })
    }

    fn purge(&self) -> Result<ShutdownOutcome, LifecycleError> {
        let own_pid = self.processes.own_pid();

        warn!("Purging application data (own PID {own_pid})");

        match self.processes.package_processes() {
            Some(mut pids) => {
                pids.sort_unstable();
                pids.dedup();

                for pid in pids.into_iter().filter(|&pid| pid != own_pid) {
                    debug!("Killing sibling process {pid}");
                    self.processes.kill_process(pid);
                }
            }
            None => debug!("Process service unavailable, skipping sibling termination"),
        }

        self.processes.clear_application_data()?;
        info!("Application data cleared, terminating own process {own_pid}");

        self.processes.kill_process(own_pid);

        Ok(ShutdownOutcome::Purged)
    }
}
