use crate::helpers::{config_with_repo, stand_in_client, start_in_background};

use proxy_core::lifecycle::ProcessManager;
use proxy_core::native::NativeProxy;
use proxy_core::native::client::ExternalClientProxy;
use proxy_core::lifecycle::process::{SysinfoProcessManager, force_kill_pid};

use std::sync::Arc;

use serial_test::serial;
use tempfile::tempdir;

/// **VALUE**: Verifies that `force_kill_pid()` handles PIDs that don't exist.
///
/// **WHY THIS MATTERS**: A sibling process can exit on its own between enumeration and the
/// purge kill loop.
///
/// **BUG THIS CATCHES**: Would catch a panic instead of returning false.
#[test]
fn given_nonexistent_pid_when_force_kill_pid_called_then_returns_false() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN/THEN: Kill reports false
    assert!(!force_kill_pid(fake_pid));
}

/// **VALUE**: Prevents signalling PID 1 (init) under any circumstances.
///
/// **WHY THIS MATTERS**: A corrupted process list during a purge must not take down the OS.
///
/// **BUG THIS CATCHES**: Would catch removal of the minimum-PID guard.
#[test]
fn given_pid_1_when_killed_then_refuses() {
    // GIVEN: PID 1
    // WHEN/THEN: Kill refuses
    assert!(!force_kill_pid(1));
}

/// **VALUE**: Verifies that package enumeration includes the calling process.
///
/// **WHY THIS MATTERS**: The controller excludes its own PID from the sibling kills by
/// comparing against this list. If enumeration did not match our own executable, it would
/// never find siblings either.
///
/// **BUG THIS CATCHES**: Would catch the executable comparison breaking.
#[test]
fn given_running_test_when_package_processes_called_then_contains_own_pid() {
    // GIVEN: The real process manager
    let manager = SysinfoProcessManager::default();

    // WHEN: Enumerating
    let pids = manager.package_processes();

    // THEN: Our own PID is present
    let pids = pids.expect("process enumeration available on test hosts");
    assert!(pids.contains(&manager.own_pid()));
}

/// **VALUE**: Verifies data clearing removes the configured directories and is idempotent.
///
/// **WHY THIS MATTERS**: Redelivered purge requests must not fail on already-cleared data.
///
/// **BUG THIS CATCHES**: Would catch NotFound being treated as an error.
#[test]
fn given_data_dirs_when_cleared_twice_then_removed_and_second_call_succeeds() {
    // GIVEN: Two data dirs with content
    let root = tempdir().unwrap();
    let repo = root.path().join("repo");
    let cache = root.path().join("cache");
    std::fs::create_dir_all(repo.join("nested")).unwrap();
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(repo.join("nested/state.db"), b"state").unwrap();

    let manager = SysinfoProcessManager::new(vec![repo.clone(), cache.clone()]);
    assert!(manager.can_clear_application_data());

    // WHEN: Clearing twice
    let first = manager.clear_application_data();
    let second = manager.clear_application_data();

    // THEN: Both succeed and the dirs are gone
    assert!(first.is_ok(), "{first:?}");
    assert!(second.is_ok(), "{second:?}");
    assert!(!repo.exists());
    assert!(!cache.exists());
}

/// **VALUE**: Verifies that no configured data dirs means no purge capability.
///
/// **WHY THIS MATTERS**: The capability gate decides whether purge is offered at all.
///
/// **BUG THIS CATCHES**: Would catch the capability reporting true with nothing to clear.
#[test]
fn given_no_data_dirs_when_checked_then_purge_is_unsupported() {
    // GIVEN: A manager without data dirs
    let manager = SysinfoProcessManager::default();

    // THEN: Capability false, clear fails
    assert!(!manager.can_clear_application_data());
    assert!(manager.clear_application_data().is_err());
}

/// **VALUE**: Verifies the native client child counts as a package process.
///
/// **WHY THIS MATTERS**: A purge skips the graceful stop. If the client were not on the kill
/// list it would outlive the purge and keep writing into the cleared repo.
///
/// **BUG THIS CATCHES**: Would catch enumeration matching only our own executable.
#[cfg(unix)]
#[test]
#[serial(process)]
fn given_spawned_client_when_package_processes_called_then_client_included() {
    // GIVEN: A stand-in client running a different executable
    let dir = tempdir().unwrap();
    let binary = stand_in_client(dir.path(), "exec sleep 60");
    let proxy = Arc::new(ExternalClientProxy::new(
        binary.to_string_lossy(),
        config_with_repo(dir.path()),
    ));
    let (worker, client_pid) = start_in_background(&proxy);

    // WHEN: Enumerating package processes
    let pids = SysinfoProcessManager::default()
        .package_processes()
        .expect("process scan available");

    // THEN: Both the caller and the client are listed
    proxy.stop();
    let _ = worker.join();
    assert!(pids.contains(&std::process::id()));
    assert!(pids.contains(&client_pid), "Client {client_pid} missing from {pids:?}");
}
