//! `proxy.env` for cooperating processes.
//!
//! Holds the routing registry as `KEY=value` lines while the proxy is
//! running, so other programs can `source` it. Removed when the proxy
//! stops or fails.

use crate::error::ServiceAppError;

use common::ErrorLocation;
use proxy_core::service::ServiceState;
use proxy_core::service::routing::proxy_env;

use std::fs;
use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::sync::watch;

pub const PROXY_ENV_FILE_NAME: &str = "proxy.env";

/// Current routing rendered as env-file lines. `None` before routing is applied.
pub fn render() -> Option<String> {
    let env = proxy_env();
    if env.is_empty() {
        return None;
    }

    Some(
        env.into_iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect(),
    )
}

#[track_caller]
pub fn write(path: &Path) -> Result<(), ServiceAppError> {
    let Some(contents) = render() else {
        debug!("No routing applied, not writing {}", path.display());
        return Ok(());
    };

    fs::write(path, contents).map_err(|e| ServiceAppError::Service {
        message: format!("Failed to write {}: {e}", path.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Proxy environment written to {}", path.display());
    Ok(())
}

#[track_caller]
pub fn remove(path: &Path) -> Result<(), ServiceAppError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ServiceAppError::Service {
            message: format!("Failed to remove {}: {e}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// Keep `path` in step with the service state until the host goes away.
pub async fn track(mut states: watch::Receiver<ServiceState>, path: PathBuf) {
    loop {
        let state = *states.borrow_and_update();
        let result = match state {
            ServiceState::Running => write(&path),
            ServiceState::Failed | ServiceState::Stopped => remove(&path),
            ServiceState::Unstarted | ServiceState::Starting => Ok(()),
        };
        if let Err(e) = result {
            warn!("{e}");
        }

        if states.changed().await.is_err() {
            return;
        }
    }
}
