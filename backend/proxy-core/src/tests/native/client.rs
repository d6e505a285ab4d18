// Unit tests for the external client proxy's private helpers

use crate::native::NativeProxy;
use crate::native::client::{ExternalClientProxy, is_listening};
use crate::{FRONT_END_ENDPOINT, OUINET_CLIENT_BINARY, PROXY_ENDPOINT, PROXY_PORT};

use models::{ProxyConfig, ProxyConfigBuilder};

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use sysinfo::{Pid, ProcessesToUpdate, System};
use tempfile::tempdir;

fn minimal_config() -> ProxyConfig {
    ProxyConfigBuilder::default()
        .with_repo_root("/tmp/ouinet-repo")
        .with_injector_endpoint("bep5:example-swarm")
        .with_tls_ca_cert_store_path("/etc/ssl/certs")
        .build()
        .expect("valid config")
}

fn args_of(proxy: &ExternalClientProxy) -> Vec<String> {
    proxy
        .build_command(OUINET_CLIENT_BINARY)
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect()
}

/// **VALUE**: Verifies the client command binds the proxy to the loopback endpoint.
///
/// **WHY THIS MATTERS**: Routing properties point at 127.0.0.1:8077. If the client listened
/// anywhere else, all proxied traffic would fail.
///
/// **BUG THIS CATCHES**: Would catch the listen flag or endpoint being dropped or changed.
#[test]
fn given_minimal_config_when_build_command_called_then_listens_on_loopback_proxy() {
    // GIVEN: A proxy with only required configuration
    let proxy = ExternalClientProxy::new(OUINET_CLIENT_BINARY, minimal_config());

    // WHEN: Building the command
    let cmd = proxy.build_command(OUINET_CLIENT_BINARY);
    let args = args_of(&proxy);

    // THEN: Binary, repo and endpoints are set; optional flags are absent
    assert_eq!(cmd.get_program(), OUINET_CLIENT_BINARY);
    assert!(args.windows(2).any(|w| w == ["--repo", "/tmp/ouinet-repo"]));
    assert!(args.windows(2).any(|w| w == ["--listen-on-tcp", PROXY_ENDPOINT]));
    assert!(args.windows(2).any(|w| w == ["--front-end-ep", FRONT_END_ENDPOINT]));
    assert!(args.windows(2).any(|w| w == ["--injector-ep", "bep5:example-swarm"]));
    assert!(!args.iter().any(|a| a == "--injector-credentials"));
    assert!(!args.iter().any(|a| a == "--cache-http-public-key"));
}

/// **VALUE**: Verifies optional configuration is passed as flags, except credentials.
///
/// **WHY THIS MATTERS**: The cache key and index select the content the client fetches.
/// Credentials on the command line would be readable by every local user.
///
/// **BUG THIS CATCHES**: Would catch optional fields being ignored by `build_command()`,
/// or credentials leaking into the child's arguments.
#[test]
fn given_full_config_when_build_command_called_then_passes_optional_flags() {
    // GIVEN: A config with credentials, cache key and index
    let config = ProxyConfigBuilder::default()
        .with_repo_root("/tmp/ouinet-repo")
        .with_injector_endpoint("bep5:example-swarm")
        .with_tls_ca_cert_store_path("/etc/ssl/certs")
        .with_injector_credentials("ouinet:secret")
        .with_cache_public_key("pubkey")
        .with_cache_index("bep5-http")
        .build()
        .expect("valid config");
    let proxy = ExternalClientProxy::new(OUINET_CLIENT_BINARY, config);

    // WHEN: Building the command
    let args = args_of(&proxy);

    // THEN: Each optional value is present with its flag; the secret is nowhere
    assert!(!args.iter().any(|a| a.contains("ouinet:secret")));
    assert!(!args.iter().any(|a| a == "--injector-credentials"));
    assert!(args.windows(2).any(|w| w == ["--cache-http-public-key", "pubkey"]));
    assert!(args.windows(2).any(|w| w == ["--cache-type", "bep5-http"]));
}

/// **VALUE**: Verifies the root CA path lives inside the repo root.
///
/// **WHY THIS MATTERS**: Callers install this certificate as a trust anchor. A wrong path
/// would make every TLS connection through the proxy fail validation.
///
/// **BUG THIS CATCHES**: Would catch the file name or base directory changing.
#[test]
fn given_proxy_when_path_to_ca_root_cert_called_then_points_into_repo() {
    // GIVEN: A proxy
    let proxy = ExternalClientProxy::new(OUINET_CLIENT_BINARY, minimal_config());

    // WHEN: Asking for the CA path
    let path = proxy.path_to_ca_root_cert();

    // THEN: Should be <repo>/ssl-ca-cert.pem
    assert_eq!(path, Path::new("/tmp/ouinet-repo/ssl-ca-cert.pem"));
}

/// **VALUE**: Verifies that `stop()` before `start()` is harmless and blocks a later start.
///
/// **WHY THIS MATTERS**: The service host may stop an instance whose initializer has not
/// run yet. The late start must not spawn an orphan client.
///
/// **BUG THIS CATCHES**: Would catch `start()` ignoring the stopped flag.
#[test]
fn given_stopped_proxy_when_start_called_then_returns_error_without_spawning() {
    // GIVEN: A proxy that was stopped before starting
    let proxy = ExternalClientProxy::new("definitely-not-a-real-ouinet-binary", minimal_config());
    proxy.stop();
    proxy.stop();

    // WHEN: Starting
    let result = proxy.start();

    // THEN: Should refuse
    assert!(result.is_err(), "Start after stop must fail");
}

/// **VALUE**: Verifies that a missing client binary surfaces as an error.
///
/// **WHY THIS MATTERS**: The initializer logs this error and reports `Failed`. A panic
/// would take down the blocking worker instead.
///
/// **BUG THIS CATCHES**: Would catch unwraps in the spawn fallback path.
#[test]
fn given_missing_binary_when_start_called_then_returns_spawn_error() {
    // GIVEN: A proxy pointing at a binary that does not exist
    let proxy = ExternalClientProxy::new("definitely-not-a-real-ouinet-binary", minimal_config());

    // WHEN: Starting
    let result = proxy.start();

    // THEN: Should be an error
    assert!(result.is_err(), "Missing binary must fail to start");
}

/// **VALUE**: Verifies the listen check reports false for a PID with no sockets.
///
/// **WHY THIS MATTERS**: Readiness polling relies on this returning false until the client
/// binds. A false positive would mark the service `Running` too early.
///
/// **BUG THIS CATCHES**: Would catch the PID filter being dropped from `is_listening()`.
#[test]
fn given_nonexistent_pid_when_is_listening_called_then_returns_false() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Checking the proxy port
    let result = is_listening(fake_pid, PROXY_PORT);

    // THEN: Should be Ok(false) (or a query error in restricted sandboxes)
    if let Ok(listening) = result {
        assert!(!listening);
    }
}

fn config_in(repo_root: &Path, credentials: Option<&str>) -> ProxyConfig {
    let mut builder = ProxyConfigBuilder::default()
        .with_repo_root(repo_root)
        .with_injector_endpoint("bep5:example-swarm")
        .with_tls_ca_cert_store_path("/etc/ssl/certs");
    if let Some(credentials) = credentials {
        builder = builder.with_injector_credentials(credentials);
    }
    builder.build().expect("valid config")
}

/// **VALUE**: Verifies credentials land in the repo's client config, replacing stale ones.
///
/// **WHY THIS MATTERS**: This file is how the client receives credentials. Other settings
/// an operator put there must survive, and an old secret must not linger.
///
/// **BUG THIS CATCHES**: Would catch duplicated credentials lines, clobbered settings, or a
/// world-readable file.
#[test]
fn given_existing_client_conf_when_written_then_credentials_replaced_and_rest_kept() {
    // GIVEN: A repo with a client config holding an old secret and another setting
    let repo = tempdir().unwrap();
    let conf = repo.path().join("ouinet-client.conf");
    fs::write(&conf, "log-level = DEBUG\ninjector-credentials = old:secret\n").unwrap();
    let proxy = ExternalClientProxy::new(OUINET_CLIENT_BINARY, config_in(repo.path(), Some("new:secret")));

    // WHEN: Writing the client config
    proxy.write_client_conf().unwrap();

    // THEN: One new credentials line, other settings intact
    let contents = fs::read_to_string(&conf).unwrap();
    assert_eq!(proxy.client_conf_path(), conf);
    assert!(contents.contains("log-level = DEBUG\n"));
    assert!(contents.contains("injector-credentials = new:secret\n"));
    assert!(!contents.contains("old:secret"));
    assert_eq!(contents.matches("injector-credentials").count(), 1);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&conf).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "Client config must be private to the owner");
    }
}

/// **VALUE**: Verifies that dropping credentials removes them from the client config.
///
/// **WHY THIS MATTERS**: An operator revoking credentials expects the client to stop using
/// them on the next start. Without credentials and without a file, nothing is created.
///
/// **BUG THIS CATCHES**: Would catch a stale secret surviving a restart.
#[test]
fn given_no_credentials_when_written_then_stale_secret_removed_and_no_file_created() {
    // GIVEN: One repo with a stale secret and one empty repo
    let stale = tempdir().unwrap();
    let conf = stale.path().join("ouinet-client.conf");
    fs::write(&conf, "injector-credentials = old:secret\n").unwrap();
    let empty = tempdir().unwrap();

    // WHEN: Writing without credentials
    ExternalClientProxy::new(OUINET_CLIENT_BINARY, config_in(stale.path(), None))
        .write_client_conf()
        .unwrap();
    let fresh = ExternalClientProxy::new(OUINET_CLIENT_BINARY, config_in(empty.path(), None));
    fresh.write_client_conf().unwrap();

    // THEN: Secret gone; no file conjured up
    assert!(!fs::read_to_string(&conf).unwrap().contains("old:secret"));
    assert!(!fresh.client_conf_path().exists());
}

/// **VALUE**: Verifies a child spawned after `stop()` is killed and reaped, not kept.
///
/// **WHY THIS MATTERS**: `stop()` can run while `start()` is between spawning the client and
/// storing it. Keeping that child would leave a client nobody will ever stop.
///
/// **BUG THIS CATCHES**: Would catch the stopped re-check under the child lock being removed.
#[test]
fn given_stopped_proxy_when_child_adopted_then_child_killed_and_reaped() {
    // GIVEN: A stopped proxy and a freshly spawned child
    let proxy = ExternalClientProxy::new(OUINET_CLIENT_BINARY, minimal_config());
    proxy.stop();
    let child = Command::new("sleep")
        .arg("60")
        .stdout(Stdio::null())
        .spawn()
        .expect("sleep is available");
    let pid = child.id();

    // WHEN: Handing the child over
    let result = proxy.adopt_child(child);

    // THEN: Refused, not stored, and the process is gone
    assert!(result.is_err());
    assert!(proxy.pid().is_none());
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    assert!(sys.process(Pid::from_u32(pid)).is_none());
}
