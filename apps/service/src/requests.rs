//! Line-delimited JSON requests from cooperating components.
//!
//! `{"start":true}` starts the proxy; anything else is a shutdown request,
//! e.g. `{"stop":true,"purge":true}`.

use crate::error::ServiceAppError;

use common::ErrorLocation;
use models::ShutdownRequest;
use proxy_core::config::AppConfig;
use proxy_core::service::{ProxyServiceHost, StartOutcome};

use std::panic::Location;
use std::path::Path;

use log::warn;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundRequest {
    Start,
    Shutdown(ShutdownRequest),
}

#[derive(Deserialize)]
struct WireRequest {
    #[serde(default)]
    start: Option<bool>,
    #[serde(flatten)]
    shutdown: ShutdownRequest,
}

/// Parse one request line. Blank lines yield `None`.
///
/// A line asking to both start and stop is rejected.
#[track_caller]
pub fn parse_request(line: &str) -> Result<Option<InboundRequest>, ServiceAppError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let wire: WireRequest =
        serde_json::from_str(line).map_err(|e| ServiceAppError::Request {
            message: format!("Invalid request '{line}': {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if !wire.start.unwrap_or(false) {
        return Ok(Some(InboundRequest::Shutdown(wire.shutdown)));
    }

    if wire.shutdown.is_stop() {
        return Err(ServiceAppError::Request {
            message: format!("Request '{line}' asks to both start and stop"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(Some(InboundRequest::Start))
}

/// Start the proxy from the config currently in `config_dir`.
///
/// The config is re-read so edits made while the service was idle apply.
/// An unusable config is passed on as a missing one.
pub fn handle_start(
    service: &ProxyServiceHost,
    config_dir: &Path,
) -> Result<StartOutcome, ServiceAppError> {
    let proxy_config = match AppConfig::load(config_dir).and_then(|c| c.proxy_config()) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("No usable proxy configuration: {e}");
            None
        }
    };

    service
        .handle_start_request(proxy_config)
        .map_err(ServiceAppError::from_core)
}
