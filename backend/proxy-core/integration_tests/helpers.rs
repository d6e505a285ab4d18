//! Recording fakes for the collaborator traits.

use proxy_core::error::lifecycle::LifecycleError;
use proxy_core::error::native::NativeError;
use proxy_core::lifecycle::{ApplicationHost, ProcessManager, ServiceStopper};
use proxy_core::native::client::ExternalClientProxy;
use proxy_core::native::{NativeProxy, ProxyFactory};
use proxy_core::service::{ForegroundNotification, ForegroundNotifier, NotificationChannel};

use common::ErrorLocation;
use models::{ProxyConfig, ProxyConfigBuilder, QuitOptions};

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, sleep};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Every side effect the lifecycle controller can cause, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Kill(u32),
    ClearData,
    StopService,
    Quit(QuitOptions),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

pub struct FakeProcessManager {
    pub own_pid: u32,
    pub processes: Option<Vec<u32>>,
    pub can_clear: bool,
    pub log: EventLog,
}

impl ProcessManager for FakeProcessManager {
    fn own_pid(&self) -> u32 {
        self.own_pid
    }

    fn package_processes(&self) -> Option<Vec<u32>> {
        self.processes.clone()
    }

    fn kill_process(&self, pid: u32) {
        self.log.lock().unwrap().push(Event::Kill(pid));
    }

    fn can_clear_application_data(&self) -> bool {
        self.can_clear
    }

    fn clear_application_data(&self) -> Result<(), LifecycleError> {
        if !self.can_clear {
            return Err(LifecycleError::Unsupported {
                message: String::from("clear data unsupported"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.log.lock().unwrap().push(Event::ClearData);
        Ok(())
    }
}

pub struct FakeStopper {
    pub log: EventLog,
}

impl ServiceStopper for FakeStopper {
    fn stop_service(&self) {
        self.log.lock().unwrap().push(Event::StopService);
    }
}

pub struct FakeHost {
    pub log: EventLog,
}

impl ApplicationHost for FakeHost {
    fn quit_application(&self, options: QuitOptions) {
        self.log.lock().unwrap().push(Event::Quit(options));
    }
}

pub type StopHook = Box<dyn FnOnce() + Send>;

/// Native proxy whose `start` sleeps for `start_delay` then succeeds or fails.
pub struct FakeProxy {
    pub repo_root: PathBuf,
    pub start_delay: Duration,
    pub fail_start: bool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub stopped_before_start_finished: AtomicBool,
    /// Runs once inside `stop()`, while the host is not holding its lock.
    pub on_stop: Mutex<Option<StopHook>>,
    started: AtomicBool,
    exited: AtomicBool,
}

impl FakeProxy {
    /// Simulate the component dying on its own.
    pub fn crash(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }
}

impl NativeProxy for FakeProxy {
    fn start(&self) -> Result<(), NativeError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        sleep(self.start_delay);
        if self.fail_start {
            return Err(NativeError::Timeout {
                message: String::from("fake start failure"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) {
            self.stopped_before_start_finished
                .store(true, Ordering::SeqCst);
        }
        self.stops.fetch_add(1, Ordering::SeqCst);

        let hook = self.on_stop.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn path_to_ca_root_cert(&self) -> PathBuf {
        self.repo_root.join("ssl-ca-cert.pem")
    }
}

/// Factory counting constructions and remembering the proxies it built.
#[derive(Default)]
pub struct FakeFactory {
    pub start_delay: Duration,
    pub fail_start: bool,
    pub fail_construct: bool,
    pub constructions: AtomicUsize,
    pub built: Mutex<Vec<Arc<FakeProxy>>>,
}

impl FakeFactory {
    pub fn last_proxy(&self) -> Arc<FakeProxy> {
        self.built
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a proxy was constructed")
    }
}

impl ProxyFactory for FakeFactory {
    fn construct(&self, config: &ProxyConfig) -> Result<Arc<dyn NativeProxy>, NativeError> {
        // Widen the window for concurrent start requests
        sleep(Duration::from_millis(20));

        if self.fail_construct {
            return Err(NativeError::Spawn {
                message: String::from("fake construct failure"),
                location: ErrorLocation::from(Location::caller()),
                source: "construct".into(),
            });
        }

        self.constructions.fetch_add(1, Ordering::SeqCst);
        let proxy = Arc::new(FakeProxy {
            repo_root: config.repo_root().to_path_buf(),
            start_delay: self.start_delay,
            fail_start: self.fail_start,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            stopped_before_start_finished: AtomicBool::new(false),
            on_stop: Mutex::new(None),
            started: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        });
        self.built.lock().unwrap().push(Arc::clone(&proxy));

        let native: Arc<dyn NativeProxy> = proxy;
        Ok(native)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub channels: Mutex<Vec<NotificationChannel>>,
    pub posted: Mutex<Vec<ForegroundNotification>>,
    pub clears: AtomicUsize,
}

impl ForegroundNotifier for RecordingNotifier {
    fn create_channel(&self, channel: &NotificationChannel) {
        self.channels.lock().unwrap().push(channel.clone());
    }

    fn post_foreground(&self, notification: &ForegroundNotification) {
        self.posted.lock().unwrap().push(notification.clone());
    }

    fn clear_foreground(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> ProxyConfig {
    ProxyConfigBuilder::default()
        .with_repo_root("/tmp/ouinet-test-repo")
        .with_injector_endpoint("bep5:test-swarm")
        .with_tls_ca_cert_store_path("/etc/ssl/certs")
        .build()
        .expect("valid test config")
}

/// Shell script standing in for the native client binary. Ignores its arguments.
#[cfg(unix)]
pub fn stand_in_client(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("stand-in-ouinet-client");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Run `start()` on a worker thread and wait until the child has been spawned.
pub fn start_in_background(
    proxy: &Arc<ExternalClientProxy>,
) -> (JoinHandle<Result<(), NativeError>>, u32) {
    let worker = {
        let proxy = Arc::clone(proxy);
        thread::spawn(move || proxy.start())
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(pid) = proxy.pid() {
            return (worker, pid);
        }
        assert!(Instant::now() < deadline, "stand-in client never spawned");
        sleep(Duration::from_millis(10));
    }
}

pub fn process_exists(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid)).is_some()
}

pub fn config_with_repo(repo_root: &Path) -> ProxyConfig {
    ProxyConfigBuilder::default()
        .with_repo_root(repo_root)
        .with_injector_endpoint("bep5:test-swarm")
        .with_tls_ca_cert_store_path("/etc/ssl/certs")
        .build()
        .expect("valid test config")
}
