//! Seam between the service host and the native proxy component.
//!
//! The component's internals (content distribution, caching, injector
//! protocol) are opaque here. [`client::ExternalClientProxy`] drives the
//! stand-alone Ouinet client executable; tests plug in fakes.

pub mod client;

use crate::error::native::NativeError;

use models::ProxyConfig;

use std::path::PathBuf;
use std::sync::Arc;

/// A constructed native proxy instance.
pub trait NativeProxy: Send + Sync {
    /// Bring the proxy up. Blocks until it is serving or has failed.
    fn start(&self) -> Result<(), NativeError>;

    /// Tear the proxy down.
    ///
    /// Must be safe before `start`, concurrently with it, and repeatedly.
    fn stop(&self);

    /// Whether the component has gone away on its own after a successful
    /// `start`. Polled by the service host's exit watcher.
    fn has_exited(&self) -> bool;

    /// Root CA certificate the proxy uses to re-sign TLS traffic.
    fn path_to_ca_root_cert(&self) -> PathBuf;
}

/// Constructs native proxy instances from configuration.
pub trait ProxyFactory: Send + Sync {
    fn construct(&self, config: &ProxyConfig) -> Result<Arc<dyn NativeProxy>, NativeError>;
}
