//! Configuration record handed to the native proxy component.

pub mod builder;

use common::RedactedSecret;

use std::path::{Path, PathBuf};

/// Immutable configuration for one native proxy instance.
///
/// Only obtainable through [`builder::ProxyConfigBuilder`], which rejects
/// partial configuration. Values are opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    repo_root: PathBuf,
    injector_endpoint: String,
    injector_credentials: Option<RedactedSecret>,
    cache_public_key: Option<String>,
    cache_index: Option<String>,
    tls_ca_cert_store_path: PathBuf,
    injector_tls_cert: Option<String>,
}

impl ProxyConfig {
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn injector_endpoint(&self) -> &str {
        &self.injector_endpoint
    }

    pub fn injector_credentials(&self) -> Option<&RedactedSecret> {
        self.injector_credentials.as_ref()
    }

    pub fn cache_public_key(&self) -> Option<&str> {
        self.cache_public_key.as_deref()
    }

    pub fn cache_index(&self) -> Option<&str> {
        self.cache_index.as_deref()
    }

    pub fn tls_ca_cert_store_path(&self) -> &Path {
        &self.tls_ca_cert_store_path
    }

    pub fn injector_tls_cert(&self) -> Option<&str> {
        self.injector_tls_cert.as_deref()
    }
}
