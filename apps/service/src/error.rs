use common::ErrorLocation;
use proxy_core::error::CoreError;

use std::panic::Location;

use thiserror::Error;

/// Errors surfaced by the service binary.
#[derive(Debug, Error)]
pub enum ServiceAppError {
    /// Error from this binary's own setup
    #[error("Service Error: {message} {location}")]
    Service {
        message: String,
        location: ErrorLocation,
    },

    /// Error from proxy-core (config, lifecycle, service host)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
        #[source]
        source: CoreError,
    },

    /// Malformed inbound request
    #[error("Request Error: {message} {location}")]
    Request {
        message: String,
        location: ErrorLocation,
    },
}

impl ServiceAppError {
    /// Wrap any proxy-core error, keeping it as the source.
    #[track_caller]
    pub fn from_core(error: impl Into<CoreError>) -> Self {
        let source = error.into();
        Self::Core {
            message: source.to_string(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }
}
