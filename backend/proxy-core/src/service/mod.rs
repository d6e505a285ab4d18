//! Proxy service host.
//!
//! Owns the one native proxy instance of this process. Start requests
//! construct the instance under a lock (check-and-set, so concurrent
//! requests construct at most one), post the foreground notification and
//! hand the blocking initialization to a detached worker:
//!
//! - Process-wide routing properties are pointed at the loopback proxy
//! - The native component's `start()` runs
//!
//! No lock is held during initialization. `stop` may race it; the
//! initializer only reports `Running` if its instance is still current.
//!
//! Once running, a watcher task polls the instance. A component that exits
//! on its own is released and reported as `Failed`, so the next start
//! request constructs a fresh one.

pub mod notification;
pub mod routing;
pub mod state;

pub use notification::{ForegroundNotification, ForegroundNotifier, LogNotifier, NotificationChannel};
pub use state::{ServiceState, StartOutcome};

use crate::error::service::ServiceError;
use crate::lifecycle::ServiceStopper;
use crate::native::{NativeProxy, ProxyFactory};

use common::ErrorLocation;
use models::ProxyConfig;

use std::panic::Location;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct Instance {
    proxy: Arc<dyn NativeProxy>,
    generation: u64,
}

struct Shared {
    instance: Mutex<Option<Instance>>,
    state_tx: watch::Sender<ServiceState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Instance>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(guard: &Option<Instance>, generation: u64) -> bool {
        guard
            .as_ref()
            .is_some_and(|instance| instance.generation == generation)
    }
}

/// Single-instance host for the native proxy component.
pub struct ProxyServiceHost {
    factory: Arc<dyn ProxyFactory>,
    notifier: Arc<dyn ForegroundNotifier>,
    runtime: Handle,
    purge_action: bool,
    generations: AtomicU64,
    shared: Arc<Shared>,
}

impl ProxyServiceHost {
    /// Create a host. Initialization work runs on `runtime`'s blocking pool.
    pub fn new(
        factory: Arc<dyn ProxyFactory>,
        notifier: Arc<dyn ForegroundNotifier>,
        runtime: Handle,
    ) -> Self {
        let (state_tx, _) = watch::channel(ServiceState::Unstarted);

        Self {
            factory,
            notifier,
            runtime,
            purge_action: false,
            generations: AtomicU64::new(0),
            shared: Arc::new(Shared {
                instance: Mutex::new(None),
                state_tx,
            }),
        }
    }

    /// Offer the stop-and-purge action on the foreground notification.
    ///
    /// Pass [`LifecycleController::can_purge`](crate::lifecycle::LifecycleController::can_purge).
    pub fn with_purge_action(mut self, can_purge: bool) -> Self {
        self.purge_action = can_purge;
        self
    }

    /// Host creation hook: registers the notification channel.
    pub fn initialize(&self) {
        self.notifier.create_channel(&NotificationChannel::default());
        debug!("Proxy service host initialized");
    }

    /// Host start hook.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingConfig`] when no configuration was
    /// delivered. Nothing is constructed in that case.
    #[track_caller]
    pub fn handle_start_request(
        &self,
        config: Option<ProxyConfig>,
    ) -> Result<StartOutcome, ServiceError> {
        let config = config.ok_or_else(|| ServiceError::MissingConfig {
            message: String::from("Start request carried no proxy configuration"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        self.start(config)
    }

    /// Construct and start the native proxy unless one already exists.
    ///
    /// Returns as soon as initialization is scheduled; watch
    /// [`ProxyServiceHost::subscribe_state`] for `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Construct`] if the factory fails.
    #[track_caller]
    pub fn start(&self, config: ProxyConfig) -> Result<StartOutcome, ServiceError> {
        let (proxy, generation) = {
            let mut guard = self.shared.lock();

            if let Some(existing) = guard.as_ref() {
                debug!(
                    "Proxy instance {} already exists, ignoring start request",
                    existing.generation
                );
                return Ok(StartOutcome::AlreadyRunning);
            }

            let proxy = self
                .factory
                .construct(&config)
                .map_err(|e| ServiceError::Construct {
                    message: format!("Failed to construct native proxy: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                })?;

            let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            *guard = Some(Instance {
                proxy: Arc::clone(&proxy),
                generation,
            });
            self.shared.state_tx.send_replace(ServiceState::Starting);

            (proxy, generation)
        };

        info!("Starting native proxy instance {generation}");
        self.notifier
            .post_foreground(&ForegroundNotification::running(self.purge_action));

        let shared = Arc::clone(&self.shared);
        let notifier = Arc::clone(&self.notifier);
        let runtime = self.runtime.clone();
        drop(self.runtime.spawn_blocking(move || {
            initialize_proxy(shared, notifier, runtime, proxy, generation)
        }));

        Ok(StartOutcome::Started)
    }

    /// Stop and release the native proxy. No-op when there is none.
    pub fn stop(&self) {
        let instance = self.shared.lock().take();

        let Some(instance) = instance else {
            debug!("No proxy instance, nothing to stop");
            return;
        };

        info!("Stopping native proxy instance {}", instance.generation);
        instance.proxy.stop();

        // A start may have slipped in while the native stop was blocking
        let guard = self.shared.lock();
        if guard.is_none() {
            self.notifier.clear_foreground();
            self.shared.state_tx.send_replace(ServiceState::Stopped);
        }
    }

    /// Host destroy hook.
    pub fn shutdown(&self) {
        debug!("Proxy service host shutting down");
        self.stop();
    }

    /// Root CA certificate path of the live instance.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRunning`] before `start` or after `stop`.
    #[track_caller]
    pub fn root_certificate_path(&self) -> Result<PathBuf, ServiceError> {
        self.shared
            .lock()
            .as_ref()
            .map(|instance| instance.proxy.path_to_ca_root_cert())
            .ok_or_else(|| ServiceError::NotRunning {
                message: String::from("Root certificate requested with no proxy instance"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub fn state(&self) -> ServiceState {
        *self.shared.state_tx.borrow()
    }

    /// Readiness signal for the asynchronous `Starting -> Running` step.
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.shared.state_tx.subscribe()
    }
}

impl ServiceStopper for ProxyServiceHost {
    fn stop_service(&self) {
        self.stop();
    }
}

fn initialize_proxy(
    shared: Arc<Shared>,
    notifier: Arc<dyn ForegroundNotifier>,
    runtime: Handle,
    proxy: Arc<dyn NativeProxy>,
    generation: u64,
) {
    routing::apply_loopback_routing();

    let result = proxy.start();

    {
        let guard = shared.lock();
        if !Shared::is_current(&guard, generation) {
            debug!("Proxy instance {generation} was stopped during start-up");
            return;
        }

        if let Err(e) = result {
            error!("Native proxy instance {generation} failed to start: {e}");
            shared.state_tx.send_replace(ServiceState::Failed);
            return;
        }

        info!("Native proxy instance {generation} running");
        shared.state_tx.send_replace(ServiceState::Running);
    }

    drop(runtime.spawn(watch_proxy(shared, notifier, proxy, generation)));
}

/// Poll a running instance until it is stopped or exits on its own.
async fn watch_proxy(
    shared: Arc<Shared>,
    notifier: Arc<dyn ForegroundNotifier>,
    proxy: Arc<dyn NativeProxy>,
    generation: u64,
) {
    let mut ticks = interval(EXIT_POLL_INTERVAL);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        if release_if_exited(&shared, notifier.as_ref(), proxy.as_ref(), generation) {
            return;
        }
    }
}

/// One watcher step. Returns `true` once there is nothing left to watch.
fn release_if_exited(
    shared: &Shared,
    notifier: &dyn ForegroundNotifier,
    proxy: &dyn NativeProxy,
    generation: u64,
) -> bool {
    let mut guard = shared.lock();

    if !Shared::is_current(&guard, generation) {
        debug!("Proxy instance {generation} no longer current, watcher done");
        return true;
    }

    if !proxy.has_exited() {
        return false;
    }

    warn!("Native proxy instance {generation} exited unexpectedly");
    *guard = None;
    notifier.clear_foreground();
    shared.state_tx.send_replace(ServiceState::Failed);
    true
}
