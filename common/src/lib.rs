//! Shared building blocks for the Ouinet service workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): Error location tracking and secret handling
//! - **models**: Pure data structures (configuration, requests)
//! - **proxy-core**: Lifecycle controller and proxy service host
//! - **ouinet-service**: Binary wiring everything together

pub mod error;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_secret::RedactedSecret;

#[cfg(test)]
mod tests;
