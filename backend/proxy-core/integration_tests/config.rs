use proxy_core::config::{AppConfig, CONFIG_DIR_ENV, INJECTOR_CREDENTIALS_ENV, default_config_dir};
use proxy_core::error::config::ConfigError;

use std::path::PathBuf;

use serial_test::serial;
use tempfile::tempdir;

/// **VALUE**: Verifies that a missing config file yields defaults.
///
/// **WHY THIS MATTERS**: First launch has no config; the service must still come up.
///
/// **BUG THIS CATCHES**: Would catch `load()` erroring on a missing file.
#[test]
fn given_empty_dir_when_load_called_then_returns_defaults() {
    // GIVEN: An empty config dir
    let dir = tempdir().unwrap();

    // WHEN: Loading
    let config = AppConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config.version, 1);
    assert!(config.service.auto_start);
    assert!(!config.service.purge_on_exit);
    assert_eq!(config.proxy.cache_index.as_deref(), Some("bep5-http"));
}

/// **VALUE**: Verifies that a saved config loads back with the same values.
///
/// **WHY THIS MATTERS**: The atomic save path (temp file + rename) must produce a file that
/// `load()` accepts.
///
/// **BUG THIS CATCHES**: Would catch serde attribute mismatches between save and load.
#[test]
fn given_saved_config_when_loaded_then_values_survive() {
    // GIVEN: A customized config saved to disk
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.service.purge_on_exit = true;
    config.service.data_dirs = vec![PathBuf::from("/tmp/ouinet-cache")];
    config.proxy.injector_endpoint = Some("bep5:swarm".to_string());
    config.save(dir.path()).unwrap();

    // WHEN: Loading
    let loaded = AppConfig::load(dir.path()).unwrap();

    // THEN: Values survive and no temp file remains
    assert!(loaded.service.purge_on_exit);
    assert_eq!(loaded.service.data_dirs, vec![PathBuf::from("/tmp/ouinet-cache")]);
    assert_eq!(loaded.proxy.injector_endpoint.as_deref(), Some("bep5:swarm"));
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// **VALUE**: Verifies that corrupted JSON is reported instead of silently replaced.
///
/// **WHY THIS MATTERS**: Silently falling back to defaults would start the proxy against
/// the wrong injector.
///
/// **BUG THIS CATCHES**: Would catch parse errors being swallowed.
#[test]
fn given_corrupt_file_when_load_called_then_returns_parse_error() {
    // GIVEN: Garbage in config.json
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    // WHEN: Loading
    let result = AppConfig::load(dir.path());

    // THEN: ParseError
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies version validation.
///
/// **WHY THIS MATTERS**: A config written by a newer release may not mean what we think.
///
/// **BUG THIS CATCHES**: Would catch the version bound check being removed.
#[test]
fn given_future_version_when_validated_then_returns_validation_error() {
    // GIVEN: A config from the future
    let config = AppConfig {
        version: 99,
        ..AppConfig::default()
    };

    // WHEN/THEN: Validation fails
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies that building the proxy config fails fast on missing required values.
///
/// **WHY THIS MATTERS**: The service must not start the native component half-configured.
///
/// **BUG THIS CATCHES**: Would catch `proxy_config()` filling in required values.
#[test]
#[serial]
fn given_no_injector_endpoint_when_proxy_config_called_then_returns_proxy_error() {
    // GIVEN: Defaults (no injector endpoint, no CA store)
    let config = AppConfig::default();

    // WHEN: Building the proxy config
    let result = config.proxy_config();

    // THEN: Proxy validation error
    assert!(matches!(result, Err(ConfigError::Proxy { .. })));
}

/// **VALUE**: Verifies the proxy config picks up values from file and credentials from env.
///
/// **WHY THIS MATTERS**: Credentials never live in config.json; the env var is the only way
/// they reach the native component.
///
/// **BUG THIS CATCHES**: Would catch the env lookup being dropped.
#[test]
#[serial]
fn given_complete_config_and_env_credentials_when_proxy_config_called_then_builds() {
    // GIVEN: Required values and credentials in env
    let mut config = AppConfig::default();
    config.proxy.repo_root = Some(PathBuf::from("/tmp/ouinet-repo"));
    config.proxy.injector_endpoint = Some("bep5:swarm".to_string());
    config.proxy.tls_ca_cert_store_path = Some(PathBuf::from("/etc/ssl/certs"));
    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var(INJECTOR_CREDENTIALS_ENV, "ouinet:secret") };

    // WHEN: Building
    let result = config.proxy_config();
    unsafe { std::env::remove_var(INJECTOR_CREDENTIALS_ENV) };

    // THEN: Built with credentials and default index
    let proxy = result.unwrap();
    assert_eq!(proxy.injector_endpoint(), "bep5:swarm");
    assert_eq!(
        proxy.injector_credentials().map(|c| c.expose()),
        Some("ouinet:secret")
    );
    assert_eq!(proxy.cache_index(), Some("bep5-http"));
}

/// **VALUE**: Verifies purge dirs include the repo root and extra dirs without duplicates.
///
/// **WHY THIS MATTERS**: These are exactly the directories a purge deletes.
///
/// **BUG THIS CATCHES**: Would catch the repo root being left behind after a purge.
#[test]
fn given_repo_and_extra_dirs_when_purge_dirs_called_then_lists_each_once() {
    // GIVEN: Repo root also listed in data_dirs
    let mut config = AppConfig::default();
    config.proxy.repo_root = Some(PathBuf::from("/tmp/ouinet-repo"));
    config.service.data_dirs = vec![
        PathBuf::from("/tmp/ouinet-repo"),
        PathBuf::from("/tmp/ouinet-cache"),
    ];

    // WHEN: Listing purge dirs
    let dirs = config.purge_dirs();

    // THEN: Each once, repo first
    assert_eq!(
        dirs,
        vec![
            PathBuf::from("/tmp/ouinet-repo"),
            PathBuf::from("/tmp/ouinet-cache")
        ]
    );
}

/// **VALUE**: Verifies the config directory override and its platform fallback.
///
/// **WHY THIS MATTERS**: The service reads its config, logs and `proxy.env` from here.
/// Deployments relocate it with `OUINET_CONFIG_DIR`.
///
/// **BUG THIS CATCHES**: Would catch the override being ignored, or an empty override
/// being taken as the current directory.
#[test]
#[serial]
fn given_config_dir_env_when_default_config_dir_called_then_override_wins() {
    // GIVEN: An override
    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var(CONFIG_DIR_ENV, "/srv/ouinet") };

    // WHEN: Resolving, then resolving with an empty override
    let overridden = default_config_dir();
    unsafe { std::env::set_var(CONFIG_DIR_ENV, "") };
    let fallback = default_config_dir();
    unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

    // THEN: Override used; empty override falls back to `{config_dir}/ouinet` or reports
    // a missing directory
    assert_eq!(overridden.unwrap(), PathBuf::from("/srv/ouinet"));
    match fallback {
        Ok(dir) => assert!(dir.ends_with("ouinet")),
        Err(e) => assert!(matches!(e, ConfigError::DirectoryNotFound { .. })),
    }
}
