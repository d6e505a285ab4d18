use crate::proxy_env::{PROXY_ENV_FILE_NAME, remove, render, track, write};

use proxy_core::service::ServiceState;
use proxy_core::service::routing::apply_loopback_routing;

use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

async fn wait_until(path: &Path, exists: bool) -> bool {
    timeout(Duration::from_secs(5), async {
        while path.exists() != exists {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// **VALUE**: Verifies that `proxy.env` carries the loopback routing.
///
/// **WHY THIS MATTERS**: Processes that source this file send their traffic through the
/// proxy; a wrong value bypasses it.
///
/// **BUG THIS CATCHES**: Would catch the file not reflecting the routing registry.
#[test]
fn given_routing_applied_when_written_then_file_has_proxy_variables() {
    // GIVEN: Routing applied and a target path
    apply_loopback_routing();
    let dir = tempdir().unwrap();
    let path = dir.path().join(PROXY_ENV_FILE_NAME);

    // WHEN: Writing, then removing twice
    write(&path).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    let removed = remove(&path);
    let removed_again = remove(&path);

    // THEN: Variables present, removal idempotent
    assert_eq!(render().as_deref(), Some(contents.as_str()));
    assert!(contents.contains("HTTP_PROXY=http://127.0.0.1:8077\n"));
    assert!(contents.contains("HTTPS_PROXY=http://127.0.0.1:8077\n"));
    assert!(contents.contains("NO_PROXY=127.0.0.1,localhost\n"));
    assert!(removed.is_ok() && removed_again.is_ok());
    assert!(!path.exists());
}

/// **VALUE**: Verifies the file exists exactly while the service is running.
///
/// **WHY THIS MATTERS**: A file left behind after a stop or failure would route other
/// programs into a dead proxy.
///
/// **BUG THIS CATCHES**: Would catch `Failed` or `Stopped` not removing the file.
#[tokio::test]
async fn given_state_changes_when_tracked_then_file_follows_running_state() {
    // GIVEN: A tracked state channel
    apply_loopback_routing();
    let dir = tempdir().unwrap();
    let path = dir.path().join(PROXY_ENV_FILE_NAME);
    let (tx, rx) = watch::channel(ServiceState::Starting);
    let task = tokio::spawn(track(rx, path.clone()));

    // WHEN/THEN: Running writes the file
    tx.send_replace(ServiceState::Running);
    assert!(wait_until(&path, true).await);

    // WHEN/THEN: Failed removes it
    tx.send_replace(ServiceState::Failed);
    assert!(wait_until(&path, false).await);

    // WHEN/THEN: Running again, then Stopped
    tx.send_replace(ServiceState::Running);
    assert!(wait_until(&path, true).await);
    tx.send_replace(ServiceState::Stopped);
    assert!(wait_until(&path, false).await);

    // WHEN: The service goes away
    drop(tx);

    // THEN: The tracker finishes
    assert!(timeout(Duration::from_secs(5), task).await.is_ok());
}
