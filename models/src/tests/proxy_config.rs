use crate::{ModelError, ProxyConfigBuilder};

use std::path::Path;

fn complete_builder() -> ProxyConfigBuilder {
    ProxyConfigBuilder::default()
        .with_repo_root("/data/ouinet")
        .with_injector_endpoint("bep5:example-swarm")
        .with_tls_ca_cert_store_path("/system/etc/security/cacerts")
}

/// **VALUE**: Verifies that a complete configuration builds and keeps every value.
///
/// **WHY THIS MATTERS**: The native component receives exactly what the builder produces.
/// A dropped field would silently start the proxy without its injector or trust anchors.
///
/// **BUG THIS CATCHES**: Would catch fields being lost or swapped in `build()`.
#[test]
fn given_all_fields_when_build_called_then_returns_config() {
    // GIVEN: A builder with every field set
    let builder = complete_builder()
        .with_injector_credentials("ouinet:secret")
        .with_cache_public_key("zh6ylt6dghu6swhhje2j66icmjnonv53tstxxvj6acu64sc62fnq")
        .with_cache_index("bep5-http")
        .with_injector_tls_cert("-----BEGIN CERTIFICATE-----");

    // WHEN: Building
    let config = builder.build().expect("complete config should build");

    // THEN: All values should be preserved
    assert_eq!(config.repo_root(), Path::new("/data/ouinet"));
    assert_eq!(config.injector_endpoint(), "bep5:example-swarm");
    assert_eq!(
        config.injector_credentials().map(|c| c.expose()),
        Some("ouinet:secret")
    );
    assert_eq!(config.cache_index(), Some("bep5-http"));
    assert!(config.cache_public_key().is_some());
    assert!(config.injector_tls_cert().is_some());
    assert_eq!(
        config.tls_ca_cert_store_path(),
        Path::new("/system/etc/security/cacerts")
    );
}

/// **VALUE**: Verifies fail-fast behavior on missing required fields.
///
/// **WHY THIS MATTERS**: The service must never construct the native component from a
/// partial configuration.
///
/// **BUG THIS CATCHES**: Would catch if a required field silently defaults.
#[test]
fn given_missing_injector_endpoint_when_build_called_then_returns_validation_error() {
    // GIVEN: A builder without the injector endpoint
    let builder = ProxyConfigBuilder::default()
        .with_repo_root("/data/ouinet")
        .with_tls_ca_cert_store_path("/etc/ssl/certs");

    // WHEN: Building
    let result = builder.build();

    // THEN: Should be a validation error naming the field
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert!(message.contains("Injector endpoint"), "got: {message}")
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that empty required strings count as missing.
///
/// **WHY THIS MATTERS**: Config files often contain `""` for unset values.
///
/// **BUG THIS CATCHES**: Would catch if only `None` is rejected.
#[test]
fn given_empty_repo_root_when_build_called_then_returns_validation_error() {
    // GIVEN: An empty repo root
    let builder = complete_builder().with_repo_root("");

    // WHEN: Building
    let result = builder.build();

    // THEN: Should fail
    assert!(result.is_err(), "Empty repo root must be rejected");
}

/// **VALUE**: Verifies that empty optional values are normalized to `None`.
///
/// **WHY THIS MATTERS**: The native client is launched with one flag per present option.
/// An empty string would produce a flag with no value.
///
/// **BUG THIS CATCHES**: Would catch if empty optionals leak through as `Some("")`.
#[test]
fn given_empty_optional_fields_when_build_called_then_they_are_none() {
    // GIVEN: Empty optional values
    let builder = complete_builder()
        .with_injector_credentials("")
        .with_cache_public_key("")
        .with_cache_index("");

    // WHEN: Building
    let config = builder.build().expect("required fields are present");

    // THEN: Optionals should be None
    assert!(config.injector_credentials().is_none());
    assert!(config.cache_public_key().is_none());
    assert!(config.cache_index().is_none());
}
