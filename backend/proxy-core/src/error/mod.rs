pub mod config;
pub mod lifecycle;
pub mod native;
pub mod service;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),

    #[error(transparent)]
    Service(#[from] service::ServiceError),

    #[error(transparent)]
    Native(#[from] native::NativeError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
