#![cfg(unix)]

use crate::helpers::{config_with_repo, process_exists, stand_in_client, start_in_background};

use proxy_core::native::NativeProxy;
use proxy_core::native::client::ExternalClientProxy;

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use serial_test::serial;
use tempfile::tempdir;

/// **VALUE**: Verifies `stop()` terminates a real client with SIGTERM and reaps it.
///
/// **WHY THIS MATTERS**: An unreaped child lingers as a zombie, and a client that is never
/// stopped keeps the proxy port and repo busy.
///
/// **BUG THIS CATCHES**: Would catch `stop()` returning before the child is gone, or a
/// pending `start()` not being released by the stop.
#[test]
#[serial(process)]
fn given_running_client_when_stopped_then_terminated_and_reaped() {
    // GIVEN: A stand-in client that never listens
    let dir = tempdir().unwrap();
    let binary = stand_in_client(dir.path(), "exec sleep 60");
    let proxy = Arc::new(ExternalClientProxy::new(
        binary.to_string_lossy(),
        config_with_repo(dir.path()),
    ));
    let (worker, pid) = start_in_background(&proxy);
    assert!(process_exists(pid));

    // WHEN: Stopping
    proxy.stop();

    // THEN: The child is gone, the pending start failed, and the proxy reports exited
    assert!(!process_exists(pid), "Client must be reaped by stop()");
    assert!(proxy.pid().is_none());
    assert!(worker.join().unwrap().is_err());
    assert!(proxy.has_exited());
}

/// **VALUE**: Verifies a client ignoring SIGTERM is killed once the grace period ends.
///
/// **WHY THIS MATTERS**: A wedged client must not survive a stop and keep the port bound.
///
/// **BUG THIS CATCHES**: Would catch the SIGKILL fallback after `terminate_child()` being
/// removed.
#[test]
#[serial(process)]
fn given_client_ignoring_term_when_stopped_then_killed() {
    // GIVEN: A stand-in client that ignores SIGTERM
    let dir = tempdir().unwrap();
    let binary = stand_in_client(dir.path(), "trap '' TERM\nwhile :; do sleep 1; done");
    let proxy = Arc::new(ExternalClientProxy::new(
        binary.to_string_lossy(),
        config_with_repo(dir.path()),
    ));
    let (worker, pid) = start_in_background(&proxy);
    // Let the shell install its trap
    sleep(Duration::from_millis(200));

    // WHEN: Stopping
    proxy.stop();

    // THEN: Gone anyway
    assert!(!process_exists(pid), "Client must be force-killed after the grace period");
    assert!(worker.join().unwrap().is_err());
}

/// **VALUE**: Verifies a client that dies on its own is reported as exited.
///
/// **WHY THIS MATTERS**: The service host's exit watcher polls this to release a dead
/// instance.
///
/// **BUG THIS CATCHES**: Would catch `has_exited()` only looking at the stopped flag.
#[test]
#[serial(process)]
fn given_client_killed_externally_when_polled_then_has_exited() {
    // GIVEN: A running stand-in client
    let dir = tempdir().unwrap();
    let binary = stand_in_client(dir.path(), "exec sleep 60");
    let proxy = Arc::new(ExternalClientProxy::new(
        binary.to_string_lossy(),
        config_with_repo(dir.path()),
    ));
    let (worker, pid) = start_in_background(&proxy);
    assert!(!proxy.has_exited());

    // WHEN: Something else kills it
    proxy_core::lifecycle::process::force_kill_pid(pid);

    // THEN: Exit is observed
    let mut exited = false;
    for _ in 0..100 {
        if proxy.has_exited() {
            exited = true;
            break;
        }
        sleep(Duration::from_millis(20));
    }
    assert!(exited);

    proxy.stop();
    assert!(worker.join().unwrap().is_err());
}
