use crate::error::model_error::ModelError;
use crate::{ErrorLocation, ProxyConfig};

use common::RedactedSecret;

use std::panic::Location;
use std::path::PathBuf;

/// Builder for creating validated ProxyConfig instances.
///
/// Required: repo root, injector endpoint, TLS CA store path. Everything
/// else is optional and passed through untouched.
#[derive(Debug, Default)]
pub struct ProxyConfigBuilder {
    repo_root: Option<PathBuf>,
    injector_endpoint: Option<String>,
    injector_credentials: Option<RedactedSecret>,
    cache_public_key: Option<String>,
    cache_index: Option<String>,
    tls_ca_cert_store_path: Option<PathBuf>,
    injector_tls_cert: Option<String>,
}

impl ProxyConfigBuilder {
    pub fn with_repo_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_root = Some(path.into());
        self
    }

    pub fn with_injector_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.injector_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_injector_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.injector_credentials = Some(RedactedSecret::new(credentials));
        self
    }

    pub fn with_cache_public_key(mut self, key: impl Into<String>) -> Self {
        self.cache_public_key = Some(key.into());
        self
    }

    pub fn with_cache_index(mut self, index: impl Into<String>) -> Self {
        self.cache_index = Some(index.into());
        self
    }

    pub fn with_tls_ca_cert_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_ca_cert_store_path = Some(path.into());
        self
    }

    pub fn with_injector_tls_cert(mut self, cert: impl Into<String>) -> Self {
        self.injector_tls_cert = Some(cert.into());
        self
    }

    /// Build the ProxyConfig with validation.
    #[track_caller]
    pub fn build(self) -> Result<ProxyConfig, ModelError> {
        let repo_root = self.repo_root.ok_or_else(|| ModelError::Validation {
            message: String::from("Repo root is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if repo_root.as_os_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Repo root cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let injector_endpoint = self.injector_endpoint.ok_or_else(|| ModelError::Validation {
            message: String::from("Injector endpoint is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if injector_endpoint.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Injector endpoint cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let tls_ca_cert_store_path =
            self.tls_ca_cert_store_path
                .ok_or_else(|| ModelError::Validation {
                    message: String::from("TLS CA cert store path is required"),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        if tls_ca_cert_store_path.as_os_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("TLS CA cert store path cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(ProxyConfig {
            repo_root,
            injector_endpoint,
            injector_credentials: self.injector_credentials.filter(|c| !c.is_empty()),
            cache_public_key: self.cache_public_key.filter(|k| !k.is_empty()),
            cache_index: self.cache_index.filter(|i| !i.is_empty()),
            tls_ca_cert_store_path,
            injector_tls_cert: self.injector_tls_cert.filter(|c| !c.is_empty()),
        })
    }
}
