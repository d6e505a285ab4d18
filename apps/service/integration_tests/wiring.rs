use ouinet_service::error::ServiceAppError;
use ouinet_service::host::QuitSignal;
use ouinet_service::requests::handle_start;

use proxy_core::config::AppConfig;
use proxy_core::error::CoreError;
use proxy_core::error::native::NativeError;
use proxy_core::error::service::ServiceError;
use proxy_core::lifecycle::{LifecycleController, ProcessManager, ShutdownOutcome};
use proxy_core::lifecycle::process::SysinfoProcessManager;
use proxy_core::native::{NativeProxy, ProxyFactory};
use proxy_core::service::{LogNotifier, ProxyServiceHost, ServiceState, StartOutcome};

use models::{ProxyConfig, ProxyConfigBuilder, QuitOptions, ShutdownRequest};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::tempdir;
use tokio::runtime::Handle;
use tokio::time::timeout;

#[derive(Default)]
struct CountingProxy {
    stops: AtomicUsize,
}

impl NativeProxy for CountingProxy {
    fn start(&self) -> Result<(), NativeError> {
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn has_exited(&self) -> bool {
        false
    }

    fn path_to_ca_root_cert(&self) -> PathBuf {
        PathBuf::from("/tmp/ouinet-wiring/ssl-ca-cert.pem")
    }
}

struct SharedProxyFactory {
    proxy: Arc<CountingProxy>,
}

impl ProxyFactory for SharedProxyFactory {
    fn construct(&self, _config: &ProxyConfig) -> Result<Arc<dyn NativeProxy>, NativeError> {
        let proxy: Arc<dyn NativeProxy> = self.proxy.clone();
        Ok(proxy)
    }
}

fn config() -> ProxyConfig {
    ProxyConfigBuilder::default()
        .with_repo_root("/tmp/ouinet-wiring")
        .with_injector_endpoint("bep5:wiring")
        .with_tls_ca_cert_store_path("/etc/ssl/certs")
        .build()
        .unwrap()
}

/// **VALUE**: Verifies the binary's wiring: a stop request stops the real service host and
/// signals the quit pathway with the configured sanitize options.
///
/// **WHY THIS MATTERS**: Each piece is tested alone; this checks they are connected the way
/// `main` connects them.
///
/// **BUG THIS CATCHES**: Would catch the controller being wired to the wrong stopper or host.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_running_service_when_stop_requested_then_service_stops_and_quit_is_signalled() {
    // GIVEN: A running service wired to a controller and quit signal
    let proxy = Arc::new(CountingProxy::default());
    let processes = Arc::new(SysinfoProcessManager::default());
    let quit = Arc::new(QuitSignal::new(Vec::new()));
    let service = Arc::new(
        ProxyServiceHost::new(
            Arc::new(SharedProxyFactory {
                proxy: proxy.clone(),
            }),
            Arc::new(LogNotifier),
            Handle::current(),
        )
        .with_purge_action(processes.can_clear_application_data()),
    );
    let controller = LifecycleController::new(
        processes,
        service.clone(),
        quit.clone(),
        QuitOptions {
            sanitize_on_exit: false,
        },
    );
    service.initialize();
    service.start(config()).unwrap();
    let mut rx = service.subscribe_state();
    timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| *s == ServiceState::Running),
    )
    .await
    .unwrap()
    .unwrap();

    // WHEN: A stop request arrives
    let outcome = controller
        .handle_shutdown_request(&ShutdownRequest::stop())
        .unwrap();

    // THEN: Service stopped once, quit signalled, purge not offered without data dirs
    assert_eq!(outcome, ShutdownOutcome::Stopped);
    assert_eq!(proxy.stops.load(Ordering::SeqCst), 1);
    assert_eq!(service.state(), ServiceState::Stopped);
    assert_eq!(quit.wait().await, QuitOptions::default());
    assert!(!controller.can_purge());
}

/// **VALUE**: Verifies a start request brings the proxy up from the config on disk.
///
/// **WHY THIS MATTERS**: With `auto_start` off this is the only way to start the proxy, and
/// an unusable config must be refused before anything is constructed.
///
/// **BUG THIS CATCHES**: Would catch start requests not reaching the service host, or a
/// missing config surfacing as anything but a missing-config error.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_config_on_disk_when_start_requested_then_proxy_starts_once() {
    // GIVEN: A host, an empty config dir and a complete one
    let proxy = Arc::new(CountingProxy::default());
    let service = ProxyServiceHost::new(
        Arc::new(SharedProxyFactory {
            proxy: proxy.clone(),
        }),
        Arc::new(LogNotifier),
        Handle::current(),
    );
    let empty = tempdir().unwrap();
    let complete = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.proxy.repo_root = Some(PathBuf::from("/tmp/ouinet-wiring"));
    config.proxy.injector_endpoint = Some("bep5:wiring".to_string());
    config.proxy.tls_ca_cert_store_path = Some(PathBuf::from("/etc/ssl/certs"));
    config.save(complete.path()).unwrap();

    // WHEN: Starting from the empty dir
    let missing = handle_start(&service, empty.path());

    // THEN: Missing config, nothing started
    assert!(matches!(
        missing,
        Err(ServiceAppError::Core {
            source: CoreError::Service(ServiceError::MissingConfig { .. }),
            ..
        })
    ));
    assert_eq!(service.state(), ServiceState::Unstarted);

    // WHEN: Starting from the complete dir, twice
    let first = handle_start(&service, complete.path()).unwrap();
    let second = handle_start(&service, complete.path()).unwrap();

    // THEN: One start, and it runs
    assert_eq!(first, StartOutcome::Started);
    assert_eq!(second, StartOutcome::AlreadyRunning);
    let mut rx = service.subscribe_state();
    timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| *s == ServiceState::Running),
    )
    .await
    .unwrap()
    .unwrap();

    service.stop();
    assert_eq!(proxy.stops.load(Ordering::SeqCst), 1);
}
