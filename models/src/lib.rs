//! Domain models for the Ouinet service.
//!
//! Pure data structures passed between layers. Models carry validation
//! but no behavior: the lifecycle controller and service host live in
//! `proxy-core`.

pub mod error;
pub mod proxy_config;
pub mod shutdown_request;

pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use proxy_config::ProxyConfig;
pub use proxy_config::builder::ProxyConfigBuilder;
pub use shutdown_request::{QuitOptions, ShutdownRequest};

#[cfg(test)]
mod tests;
