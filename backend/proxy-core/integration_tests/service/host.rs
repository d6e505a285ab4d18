use crate::helpers::{FakeFactory, RecordingNotifier, test_config};

use proxy_core::error::service::ServiceError;
use proxy_core::lifecycle::ServiceStopper;
use proxy_core::service::routing::http_proxy_url;
use proxy_core::service::{ProxyServiceHost, ServiceState, StartOutcome};

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serial_test::serial;
use tokio::runtime::Handle;
use tokio::time::timeout;

const STATE_WAIT: Duration = Duration::from_secs(5);

fn host(factory: &Arc<FakeFactory>, notifier: &Arc<RecordingNotifier>) -> ProxyServiceHost {
    ProxyServiceHost::new(
        factory.clone(),
        notifier.clone(),
        Handle::current(),
    )
}

async fn wait_for_state(host: &ProxyServiceHost, expected: ServiceState) -> bool {
    let mut rx = host.subscribe_state();
    timeout(STATE_WAIT, rx.wait_for(|state| *state == expected))
        .await
        .is_ok_and(|r| r.is_ok())
}

/// **VALUE**: Verifies the full start path: construct, notify, initialize, `Running`.
///
/// **WHY THIS MATTERS**: This is the service's main job. Every step must happen exactly
/// once, with routing applied before the native start.
///
/// **BUG THIS CATCHES**: Would catch a missing notification, a skipped native start, or
/// the state never reaching `Running`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_config_when_started_then_reaches_running_with_routing_and_notification() {
    // GIVEN: A host with a fake factory
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);
    host.initialize();
    assert_eq!(host.state(), ServiceState::Unstarted);

    // WHEN: Starting
    let outcome = host.start(test_config()).unwrap();

    // THEN: Started, running, routed, notified
    assert_eq!(outcome, StartOutcome::Started);
    assert!(wait_for_state(&host, ServiceState::Running).await);
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    assert_eq!(factory.last_proxy().starts.load(Ordering::SeqCst), 1);
    assert_eq!(http_proxy_url().as_deref(), Some("http://127.0.0.1:8077"));
    assert_eq!(notifier.channels.lock().unwrap().len(), 1);
    assert_eq!(notifier.posted.lock().unwrap().len(), 1);

    host.stop();
}

/// **VALUE**: Verifies that a second start before stop constructs nothing.
///
/// **WHY THIS MATTERS**: Two native instances would fight over the proxy port and repo.
///
/// **BUG THIS CATCHES**: Would catch the existing-instance check being removed.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_host_when_started_again_then_returns_already_running() {
    // GIVEN: A started host
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);
    host.start(test_config()).unwrap();

    // WHEN: Starting again
    let second = host.start(test_config()).unwrap();

    // THEN: No second construction or notification
    assert_eq!(second, StartOutcome::AlreadyRunning);
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.posted.lock().unwrap().len(), 1);

    host.stop();
}

/// **VALUE**: Verifies that concurrent start requests construct exactly one instance.
///
/// **WHY THIS MATTERS**: Start requests arrive on host dispatch threads and may overlap.
///
/// **BUG THIS CATCHES**: Would catch construction moving outside the instance lock.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_concurrent_starts_when_both_run_then_exactly_one_construction() {
    // GIVEN: A shared host
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = Arc::new(host(&factory, &notifier));

    // WHEN: Two starts race
    let a = tokio::task::spawn_blocking({
        let host = Arc::clone(&host);
        move || host.start(test_config()).unwrap()
    });
    let b = tokio::task::spawn_blocking({
        let host = Arc::clone(&host);
        move || host.start(test_config()).unwrap()
    });
    let outcomes = [a.await.unwrap(), b.await.unwrap()];

    // THEN: One Started, one AlreadyRunning, one construction
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    assert!(outcomes.contains(&StartOutcome::Started));
    assert!(outcomes.contains(&StartOutcome::AlreadyRunning));

    host.stop();
}

/// **VALUE**: Verifies that stop without start, and a double stop, are harmless.
///
/// **WHY THIS MATTERS**: Both the lifecycle controller and the host's destroy hook call stop.
///
/// **BUG THIS CATCHES**: Would catch a second teardown of the same native instance.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_stop_called_twice_when_handled_then_single_teardown() {
    // GIVEN: A host that was never started
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);

    // WHEN: Stopping before start
    host.stop();

    // THEN: Nothing happened
    assert_eq!(host.state(), ServiceState::Unstarted);
    assert_eq!(notifier.clears.load(Ordering::SeqCst), 0);

    // WHEN: Starting, then stopping twice (once via the stopper trait)
    host.start(test_config()).unwrap();
    assert!(wait_for_state(&host, ServiceState::Running).await);
    host.stop();
    host.stop_service();

    // THEN: One native stop, state Stopped
    let proxy = factory.last_proxy();
    assert_eq!(proxy.stops.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.clears.load(Ordering::SeqCst), 1);
    assert_eq!(host.state(), ServiceState::Stopped);
}

/// **VALUE**: Verifies that stop during initialization wins over the late `Running`.
///
/// **WHY THIS MATTERS**: The initializer is detached. If it reported `Running` after a stop,
/// callers would believe a torn-down proxy is serving.
///
/// **BUG THIS CATCHES**: Would catch the generation check in the initializer being removed.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_slow_start_when_stopped_mid_initialization_then_stays_stopped() {
    // GIVEN: A native start that takes a while
    let factory = Arc::new(FakeFactory {
        start_delay: Duration::from_millis(300),
        ..FakeFactory::default()
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);
    host.start(test_config()).unwrap();
    assert_eq!(host.state(), ServiceState::Starting);

    // WHEN: Stopping while start() is still sleeping
    tokio::time::sleep(Duration::from_millis(50)).await;
    host.stop();

    // THEN: Stop reached the proxy before start finished, and state stays Stopped
    let proxy = factory.last_proxy();
    assert!(proxy.stopped_before_start_finished.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(host.state(), ServiceState::Stopped);
}

/// **VALUE**: Verifies that a fresh start after stop creates a new instance.
///
/// **WHY THIS MATTERS**: `Stopped` is terminal per instance, not per host.
///
/// **BUG THIS CATCHES**: Would catch stop leaving a stale handle that blocks restarts.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_stopped_host_when_started_again_then_new_instance_runs() {
    // GIVEN: A host that ran and stopped
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);
    host.start(test_config()).unwrap();
    host.stop();

    // WHEN: Starting again
    let outcome = host.start(test_config()).unwrap();

    // THEN: Second construction, running again
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 2);
    assert!(wait_for_state(&host, ServiceState::Running).await);

    host.stop();
}

/// **VALUE**: Verifies a failing native start is reported as `Failed` and still stoppable.
///
/// **WHY THIS MATTERS**: The initializer runs detached; its error only surfaces through state.
///
/// **BUG THIS CATCHES**: Would catch a failed start being reported as `Running`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_failing_native_start_when_started_then_state_is_failed() {
    // GIVEN: A factory whose proxies fail to start
    let factory = Arc::new(FakeFactory {
        fail_start: true,
        ..FakeFactory::default()
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);

    // WHEN: Starting
    host.start(test_config()).unwrap();

    // THEN: Failed, and stop still tears it down
    assert!(wait_for_state(&host, ServiceState::Failed).await);
    host.stop();
    assert_eq!(factory.last_proxy().stops.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies that a missing configuration fails fast without construction.
///
/// **WHY THIS MATTERS**: The native component must never see partial configuration.
///
/// **BUG THIS CATCHES**: Would catch the start hook constructing before checking config.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_no_config_when_start_requested_then_missing_config_error() {
    // GIVEN: A host
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);

    // WHEN: A start request without config
    let result = host.handle_start_request(None);

    // THEN: MissingConfig and nothing constructed
    assert!(matches!(result, Err(ServiceError::MissingConfig { .. })));
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 0);
    assert_eq!(host.state(), ServiceState::Unstarted);
}

/// **VALUE**: Verifies that construction failure surfaces as an error and leaves no instance.
///
/// **WHY THIS MATTERS**: A half-registered instance would block every later start.
///
/// **BUG THIS CATCHES**: Would catch the handle being stored before construction succeeds.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_failing_factory_when_started_then_construct_error_and_no_instance() {
    // GIVEN: A failing factory
    let factory = Arc::new(FakeFactory {
        fail_construct: true,
        ..FakeFactory::default()
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);

    // WHEN: Starting
    let result = host.handle_start_request(Some(test_config()));

    // THEN: Construct error, no notification, root cert unavailable
    assert!(matches!(result, Err(ServiceError::Construct { .. })));
    assert!(notifier.posted.lock().unwrap().is_empty());
    assert!(host.root_certificate_path().is_err());
}

/// **VALUE**: Verifies the root certificate path is only available with a live instance.
///
/// **WHY THIS MATTERS**: Returning a made-up path before start would let callers install a
/// certificate that does not exist.
///
/// **BUG THIS CATCHES**: Would catch a default path being returned instead of `NotRunning`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_lifecycle_when_root_certificate_requested_then_only_available_while_started() {
    // GIVEN: A host
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);

    // THEN: Not available before start
    assert!(matches!(
        host.root_certificate_path(),
        Err(ServiceError::NotRunning { .. })
    ));

    // WHEN: Started
    host.start(test_config()).unwrap();

    // THEN: Available from the instance
    assert_eq!(
        host.root_certificate_path().unwrap(),
        Path::new("/tmp/ouinet-test-repo/ssl-ca-cert.pem")
    );

    // WHEN: Stopped
    host.stop();

    // THEN: Not available again
    assert!(host.root_certificate_path().is_err());
}

/// **VALUE**: Verifies the purge action follows the capability passed to the host.
///
/// **WHY THIS MATTERS**: The notification is the user's entry point to purge.
///
/// **BUG THIS CATCHES**: Would catch `with_purge_action` being ignored.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_purge_capability_when_started_then_notification_offers_purge() {
    // GIVEN: A host with purge enabled
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier).with_purge_action(true);

    // WHEN: Starting
    host.start(test_config()).unwrap();

    // THEN: Two actions on the posted notification
    let posted = notifier.posted.lock().unwrap().clone();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].actions.len(), 2);

    host.stop();
}

/// **VALUE**: Verifies that a component dying after start is noticed and released.
///
/// **WHY THIS MATTERS**: Without an exit watcher the state stays `Running`, the root
/// certificate points at a dead proxy, and every later start returns `AlreadyRunning`.
///
/// **BUG THIS CATCHES**: Would catch the watcher not releasing the instance, or not
/// clearing the foreground notification.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_proxy_when_it_exits_on_its_own_then_failed_and_restartable() {
    // GIVEN: A running host
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = host(&factory, &notifier);
    host.start(test_config()).unwrap();
    assert!(wait_for_state(&host, ServiceState::Running).await);

    // WHEN: The native component dies
    factory.last_proxy().crash();

    // THEN: Failed, released, notification cleared
    assert!(wait_for_state(&host, ServiceState::Failed).await);
    assert!(matches!(
        host.root_certificate_path(),
        Err(ServiceError::NotRunning { .. })
    ));
    assert_eq!(notifier.clears.load(Ordering::SeqCst), 1);

    // WHEN: Starting again
    let outcome = host.start(test_config()).unwrap();

    // THEN: A fresh instance comes up
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 2);
    assert!(wait_for_state(&host, ServiceState::Running).await);

    host.stop();
}

/// **VALUE**: Verifies that a start landing during a blocking stop keeps its notification.
///
/// **WHY THIS MATTERS**: The native stop runs without the instance lock. A start request
/// in that window posts a fresh notification that the finishing stop must not clear.
///
/// **BUG THIS CATCHES**: Would catch `clear_foreground()` or `Stopped` being issued without
/// re-checking that the slot is still empty.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_start_during_native_stop_when_stop_finishes_then_new_instance_is_kept() {
    // GIVEN: A running host whose native stop triggers a new start
    let factory = Arc::new(FakeFactory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let host = Arc::new(host(&factory, &notifier));
    host.start(test_config()).unwrap();
    assert!(wait_for_state(&host, ServiceState::Running).await);

    let restart = Arc::clone(&host);
    *factory.last_proxy().on_stop.lock().unwrap() = Some(Box::new(move || {
        restart.start(test_config()).unwrap();
    }));

    // WHEN: Stopping
    host.stop();

    // THEN: The second instance's notification survives and state is not Stopped
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 2);
    assert_eq!(notifier.posted.lock().unwrap().len(), 2);
    assert_eq!(notifier.clears.load(Ordering::SeqCst), 0);
    assert_ne!(host.state(), ServiceState::Stopped);
    assert!(host.root_certificate_path().is_ok());

    host.stop();
    assert_eq!(host.state(), ServiceState::Stopped);
}
