use crate::error::lifecycle::LifecycleError;
use crate::lifecycle::ProcessManager;

use common::ErrorLocation;

use std::collections::HashSet;
use std::env::current_exe;
use std::fs::remove_dir_all;
use std::io::ErrorKind;
use std::panic::Location;
use std::path::PathBuf;
use std::process::exit;

use log::{debug, info, trace, warn};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// Exit status used if SIGKILL to ourselves did not take.
const PURGE_EXIT_CODE: i32 = 137;

/// Lowest PID we are ever willing to signal. PID 1 is init.
const MIN_KILLABLE_PID: u32 = 2;

#[track_caller]
pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);

    sys.process(Pid::from_u32(pid)).map(f)
}

pub(crate) fn format_command(process: &Process) -> String {
    process
        .cmd()
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Send SIGKILL to `pid` without waiting.
///
/// Returns `false` for protected or missing processes.
pub fn force_kill_pid(pid: u32) -> bool {
    if pid < MIN_KILLABLE_PID {
        warn!("Refusing to kill PID {pid}");
        return false;
    }

    with_process(pid, |p| {
        let killed = p.kill();
        debug!("Sent SIGKILL to PID {pid} ({}): success={killed}", format_command(p));
        killed
    })
    .unwrap_or_else(|| {
        debug!("Process {pid} already gone");
        false
    })
}

/// [`ProcessManager`] backed by `sysinfo` and the local filesystem.
///
/// Package processes are the ones running the same executable as the
/// caller, plus all of their descendants. Application data is the set of
/// directories given at construction.
#[derive(Debug, Clone, Default)]
pub struct SysinfoProcessManager {
    data_dirs: Vec<PathBuf>,
}

impl SysinfoProcessManager {
    pub fn new(data_dirs: Vec<PathBuf>) -> Self {
        Self { data_dirs }
    }

    pub fn data_dirs(&self) -> &[PathBuf] {
        &self.data_dirs
    }
}

impl ProcessManager for SysinfoProcessManager {
    fn own_pid(&self) -> u32 {
        std::process::id()
    }

    fn package_processes(&self) -> Option<Vec<u32>> {
        let own_exe = match current_exe() {
            Ok(exe) => exe,
            Err(e) => {
                debug!("Cannot resolve own executable, process scan unavailable: {e}");
                return None;
            }
        };

        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );

        trace!("Scanning {} processes", sys.processes().len());

        let mut package: HashSet<Pid> = sys
            .processes()
            .iter()
            .filter(|(_, p)| p.exe() == Some(own_exe.as_path()))
            .map(|(pid, _)| *pid)
            .collect();

        // Children such as the native client run other executables
        loop {
            let before = package.len();
            for (pid, process) in sys.processes() {
                if let Some(parent) = process.parent()
                    && package.contains(&parent)
                {
                    package.insert(*pid);
                }
            }
            if package.len() == before {
                break;
            }
        }

        let pids: Vec<u32> = package.into_iter().map(Pid::as_u32).collect();

        debug!(
            "Found {} processes running {} or descending from it",
            pids.len(),
            own_exe.display()
        );
        Some(pids)
    }

    fn kill_process(&self, pid: u32) {
        if pid != self.own_pid() {
            force_kill_pid(pid);
            return;
        }

        info!("Killing own process {pid}");
        force_kill_pid(pid);

        // Only reached where signalling ourselves is not possible.
        exit(PURGE_EXIT_CODE);
    }

    fn can_clear_application_data(&self) -> bool {
        !self.data_dirs.is_empty()
    }

    fn clear_application_data(&self) -> Result<(), LifecycleError> {
        if self.data_dirs.is_empty() {
            return Err(LifecycleError::Unsupported {
                message: String::from("No application data directories configured"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        for dir in &self.data_dirs {
            match remove_dir_all(dir) {
                Ok(()) => info!("Removed {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} already removed", dir.display())
                }
                Err(e) => {
                    return Err(LifecycleError::ClearData {
                        path: dir.clone(),
                        location: ErrorLocation::from(Location::caller()),
                        source: e,
                    });
                }
            }
        }

        Ok(())
    }
}
