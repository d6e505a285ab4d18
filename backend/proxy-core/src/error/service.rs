use crate::error::native::NativeError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ServiceError {
    #[error("Missing Config Error: {message} {location}")]
    MissingConfig {
        message: String,
        location: ErrorLocation,
    },

    #[error("Construct Error: {message} {location}")]
    Construct {
        message: String,
        location: ErrorLocation,
        #[source]
        source: NativeError,
    },

    #[error("Not Running Error: {message} {location}")]
    NotRunning {
        message: String,
        location: ErrorLocation,
    },
}
