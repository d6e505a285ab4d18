use crate::OUINET_CLIENT_BINARY;
use crate::error::config::ConfigError;

use common::ErrorLocation;
use models::{ProxyConfig, ProxyConfigBuilder, QuitOptions};

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const APP_DIR_NAME: &str = "ouinet";
const REPO_DIR_NAME: &str = "repo";
const DEFAULT_CACHE_INDEX: &str = "bep5-http";

/// Environment variable carrying the injector credentials.
///
/// Credentials are kept out of `config.json` so saving the config never
/// persists them.
pub const INJECTOR_CREDENTIALS_ENV: &str = "OUINET_INJECTOR_CREDENTIALS";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "OUINET_CONFIG_DIR";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    /// Send a stop+purge request instead of a plain stop on exit.
    #[serde(default)]
    pub purge_on_exit: bool,
    #[serde(default)]
    pub sanitize_on_exit: bool,
    /// Override for the native client executable name or path.
    pub client_binary: Option<String>,
    /// Extra directories removed by a purge, besides the repo root.
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_start: default_auto_start(),
            purge_on_exit: false,
            sanitize_on_exit: false,
            client_binary: None,
            data_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySection {
    pub repo_root: Option<PathBuf>,
    pub injector_endpoint: Option<String>,
    pub cache_public_key: Option<String>,
    #[serde(default = "default_cache_index")]
    pub cache_index: Option<String>,
    pub tls_ca_cert_store_path: Option<PathBuf>,
    pub injector_tls_cert: Option<String>,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            repo_root: None,
            injector_endpoint: None,
            cache_public_key: None,
            cache_index: default_cache_index(),
            tls_ca_cert_store_path: None,
            injector_tls_cert: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub proxy: ProxySection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            service: ServiceConfig::default(),
            proxy: ProxySection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_auto_start() -> bool {
    true
}
fn default_cache_index() -> Option<String> {
    Some(DEFAULT_CACHE_INDEX.to_string())
}

/// Config directory: `$OUINET_CONFIG_DIR`, else `{config_dir}/ouinet`.
///
/// # Errors
///
/// Returns [`ConfigError::DirectoryNotFound`] when neither is available.
#[track_caller]
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("no platform config directory and {CONFIG_DIR_ENV} is unset"),
        })
}

/// Default native repo root: `{data_dir}/ouinet/repo`.
pub fn default_repo_root() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join(REPO_DIR_NAME))
}

// ============================================
// IMPLEMENTATION
// ============================================

impl AppConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(AppConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: AppConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// Uses temp file + rename so a crash never leaves a truncated file.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// Proxy fields are not checked here: missing values surface when
    /// [`AppConfig::proxy_config`] builds the native configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if let Some(ref binary) = self.service.client_binary
            && binary.is_empty()
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "client_binary cannot be empty string".to_string(),
            });
        }

        if self.service.data_dirs.iter().any(|d| d.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "data_dirs cannot contain empty paths".to_string(),
            });
        }

        Ok(())
    }

    /// Repo root from config, falling back to the platform data dir.
    pub fn repo_root(&self) -> Option<PathBuf> {
        self.proxy.repo_root.clone().or_else(default_repo_root)
    }

    /// Native client executable to launch.
    pub fn client_binary(&self) -> &str {
        self.service
            .client_binary
            .as_deref()
            .unwrap_or(OUINET_CLIENT_BINARY)
    }

    /// Directories wiped by a purge: the repo root plus `service.data_dirs`.
    pub fn purge_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.repo_root().into_iter().collect();
        for dir in &self.service.data_dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        dirs
    }

    pub fn quit_options(&self) -> QuitOptions {
        QuitOptions {
            sanitize_on_exit: self.service.sanitize_on_exit,
        }
    }

    /// Build the native proxy configuration.
    ///
    /// Credentials are read from [`INJECTOR_CREDENTIALS_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Proxy`] if a required value is missing.
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        let mut builder = ProxyConfigBuilder::default();

        if let Some(root) = self.repo_root() {
            builder = builder.with_repo_root(root);
        }
        if let Some(ref endpoint) = self.proxy.injector_endpoint {
            builder = builder.with_injector_endpoint(endpoint.as_str());
        }
        if let Some(ref key) = self.proxy.cache_public_key {
            builder = builder.with_cache_public_key(key.as_str());
        }
        if let Some(ref index) = self.proxy.cache_index {
            builder = builder.with_cache_index(index.as_str());
        }
        if let Some(ref path) = self.proxy.tls_ca_cert_store_path {
            builder = builder.with_tls_ca_cert_store_path(path);
        }
        if let Some(ref cert) = self.proxy.injector_tls_cert {
            builder = builder.with_injector_tls_cert(cert.as_str());
        }
        if let Ok(credentials) = env::var(INJECTOR_CREDENTIALS_ENV) {
            debug!("Using injector credentials from {INJECTOR_CREDENTIALS_ENV}");
            builder = builder.with_injector_credentials(credentials);
        }

        Ok(builder.build()?)
    }
}
