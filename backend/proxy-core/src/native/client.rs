use crate::error::native::NativeError;
use crate::lifecycle::process::with_process;
use crate::native::{NativeProxy, ProxyFactory};
use crate::{FRONT_END_ENDPOINT, PROXY_ENDPOINT, PROXY_PORT};

use common::ErrorLocation;
use models::ProxyConfig;

use std::env::current_exe;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Error as IoError, ErrorKind, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, sleep};
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use netstat2::{
    AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, SocketInfo, TcpState, get_sockets_info,
};
use sysinfo::Signal;
use zeroize::Zeroizing;

const READY_MAX_ELAPSED: Duration = Duration::from_secs(30);
const STOP_MAX_ELAPSED: Duration = Duration::from_secs(5);
const CA_ROOT_CERT_FILE_NAME: &str = "ssl-ca-cert.pem";
const CLIENT_CONF_FILE_NAME: &str = "ouinet-client.conf";
const CREDENTIALS_KEY: &str = "injector-credentials";

const REPO_FLAG: &str = "--repo";
const LISTEN_FLAG: &str = "--listen-on-tcp";
const FRONT_END_FLAG: &str = "--front-end-ep";
const INJECTOR_EP_FLAG: &str = "--injector-ep";
const INJECTOR_TLS_CERT_FLAG: &str = "--injector-tls-cert";
const CACHE_TYPE_FLAG: &str = "--cache-type";
const CACHE_PUBLIC_KEY_FLAG: &str = "--cache-http-public-key";
const TLS_CA_STORE_FLAG: &str = "--tls-ca-cert-store-path";

#[track_caller]
fn query_tcp_sockets() -> Result<Vec<SocketInfo>, NativeError> {
    get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .map_err(|e| NativeError::NetworkQuery {
        message: format!("Failed to query network sockets: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })
}

/// Whether `pid` has a TCP socket listening on `port`.
#[track_caller]
pub(crate) fn is_listening(pid: u32, port: u16) -> Result<bool, NativeError> {
    let sockets = query_tcp_sockets()?;

    Ok(sockets.iter().any(|s| {
        matches!(&s.protocol_socket_info, ProtocolSocketInfo::Tcp(tcp)
            if tcp.state == TcpState::Listen && tcp.local_port == port)
            && s.associated_pids.contains(&pid)
    }))
}

#[track_caller]
fn configure_error(path: &Path, source: IoError) -> NativeError {
    NativeError::Configure {
        message: format!("Failed to write client config {}: {source}", path.display()),
        location: ErrorLocation::from(Location::caller()),
        source,
    }
}

/// Write `contents` readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<(), IoError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(0o600);
        let mut file = options.open(path)?;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)
    }

    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(contents)
    }
}

/// SIGTERM `child` and reap it, waiting up to [`STOP_MAX_ELAPSED`].
///
/// Polls `try_wait` rather than the process table: an unreaped child stays
/// listed as a zombie.
fn terminate_child(child: &mut Child) -> bool {
    let pid = child.id();
    let signalled = with_process(pid, |p| p.kill_with(Signal::Term).unwrap_or(false))
        .unwrap_or(false);

    if !signalled {
        return false;
    }

    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(STOP_MAX_ELAPSED),
        ..Default::default()
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Client (PID {pid}) exited with {status}");
                return true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll client (PID {pid}): {e}");
                return false;
            }
        }

        match backoff.next_backoff() {
            Some(duration) => sleep(duration),
            None => return false,
        }
    }
}

/// Native proxy running as the stand-alone Ouinet client executable.
///
/// The client listens on [`PROXY_ENDPOINT`] and serves its front-end on
/// [`FRONT_END_ENDPOINT`].
pub struct ExternalClientProxy {
    binary: String,
    config: ProxyConfig,
    child: Mutex<Option<Child>>,
    stopped: AtomicBool,
}

impl ExternalClientProxy {
    pub fn new(binary: impl Into<String>, config: ProxyConfig) -> Self {
        Self {
            binary: binary.into(),
            config,
            child: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// PID of the running client, if one has been spawned and not stopped.
    pub fn pid(&self) -> Option<u32> {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Child::id)
    }

    /// Path of the client's own config file inside the repo.
    pub fn client_conf_path(&self) -> PathBuf {
        self.config.repo_root().join(CLIENT_CONF_FILE_NAME)
    }

    /// Put the injector credentials into the repo's client config file.
    ///
    /// Credentials never go on the command line, where any local user can
    /// read them. Other lines of an existing file are kept; a stale
    /// credentials line is replaced or, without credentials, removed.
    #[track_caller]
    pub(crate) fn write_client_conf(&self) -> Result<(), NativeError> {
        let path = self.client_conf_path();
        let credentials = self.config.injector_credentials();

        let existing = match fs::read_to_string(&path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if credentials.is_none() {
                    return Ok(());
                }
                Zeroizing::new(String::new())
            }
            Err(e) => return Err(configure_error(&path, e)),
        };

        let mut contents = Zeroizing::new(String::with_capacity(existing.len()));
        for line in existing
            .lines()
            .filter(|line| line.split('=').next().map(str::trim) != Some(CREDENTIALS_KEY))
        {
            contents.push_str(line);
            contents.push('\n');
        }
        if let Some(credentials) = credentials {
            contents.push_str(CREDENTIALS_KEY);
            contents.push_str(" = ");
            contents.push_str(credentials.expose());
            contents.push('\n');
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| configure_error(dir, e))?;
        }
        write_private(&path, contents.as_bytes()).map_err(|e| configure_error(&path, e))?;

        debug!("Client config written to {}", path.display());
        Ok(())
    }

    pub(crate) fn build_command(&self, program: impl AsRef<OsStr>) -> Command {
        let config = &self.config;
        let mut cmd = Command::new(program);

        cmd.arg(REPO_FLAG)
            .arg(config.repo_root())
            .arg(LISTEN_FLAG)
            .arg(PROXY_ENDPOINT)
            .arg(FRONT_END_FLAG)
            .arg(FRONT_END_ENDPOINT)
            .arg(INJECTOR_EP_FLAG)
            .arg(config.injector_endpoint())
            .arg(TLS_CA_STORE_FLAG)
            .arg(config.tls_ca_cert_store_path());

        if let Some(cert) = config.injector_tls_cert() {
            cmd.arg(INJECTOR_TLS_CERT_FLAG).arg(cert);
        }
        if let Some(index) = config.cache_index() {
            cmd.arg(CACHE_TYPE_FLAG).arg(index);
        }
        if let Some(key) = config.cache_public_key() {
            cmd.arg(CACHE_PUBLIC_KEY_FLAG).arg(key);
        }

        cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        cmd
    }

    fn spawn_client(&self) -> Result<Child, NativeError> {
        debug!("Attempting to spawn {} from PATH", self.binary);

        match self.build_command(&self.binary).spawn() {
            Ok(child) => Ok(child),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{} not in PATH, trying local binary", self.binary);
                self.spawn_local_binary()
            }
            Err(err) => Err(NativeError::Spawn {
                message: format!("Failed to spawn {}: {err}", self.binary),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(err),
            }),
        }
    }

    fn spawn_local_binary(&self) -> Result<Child, NativeError> {
        let exe = current_exe().map_err(|e| NativeError::Spawn {
            message: format!("Failed to get current executable path: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

        let dir = exe.parent().ok_or_else(|| NativeError::Spawn {
            message: format!("Executable has no parent directory: {}", exe.display()),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(IoError::new(ErrorKind::NotFound, "no parent dir")),
        })?;

        let local_path = dir.join(&self.binary);
        debug!("Attempting to spawn from {}", local_path.display());

        self.build_command(&local_path)
            .current_dir(dir)
            .spawn()
            .map_err(|e| NativeError::Spawn {
                message: format!("Failed to spawn {}: {e}", local_path.display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })
    }

    fn wait_until_listening(&self, pid: u32) -> Result<(), NativeError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(READY_MAX_ELAPSED),
            ..Default::default()
        };

        debug!("Waiting for client (PID {pid}) to listen on {PROXY_ENDPOINT}");

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(NativeError::Stopped {
                    message: format!("Client (PID {pid}) stopped during start-up"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if self.child_exited() {
                return Err(NativeError::Stopped {
                    message: format!("Client (PID {pid}) exited during start-up"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if is_listening(pid, PROXY_PORT)? {
                info!("Client is serving on {PROXY_ENDPOINT} (PID: {pid})");
                return Ok(());
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Client not ready, retrying after {duration:?}");
                    sleep(duration);
                }
                None => {
                    return Err(NativeError::Timeout {
                        message: format!(
                            "Client did not listen on {PROXY_ENDPOINT} within {READY_MAX_ELAPSED:?}"
                        ),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
    }

    /// Hand a freshly spawned child to this proxy.
    ///
    /// A `stop()` that ran while the child was being spawned wins: the
    /// child is killed and reaped instead of kept.
    pub(crate) fn adopt_child(&self, mut child: Child) -> Result<(), NativeError> {
        let pid = child.id();
        let mut guard = self.child.lock().unwrap_or_else(PoisonError::into_inner);

        if self.stopped.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(NativeError::Stopped {
                message: format!("Client (PID {pid}) stopped during spawn"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        *guard = Some(child);
        Ok(())
    }

    fn child_exited(&self) -> bool {
        let mut guard = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                warn!("Client exited with {status}");
                true
            }
            Some(Ok(None)) => false,
            Some(Err(e)) => {
                warn!("Failed to poll client status: {e}");
                false
            }
            None => true,
        }
    }
}

impl NativeProxy for ExternalClientProxy {
    fn start(&self) -> Result<(), NativeError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(NativeError::Stopped {
                message: String::from("Client stopped before start"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.write_client_conf()?;

        let mut child = self.spawn_client()?;
        let pid = child.id();
        info!("Spawned {} (PID: {pid})", self.binary);

        if let Some(stderr) = child.stderr.take() {
            let spawned = thread::Builder::new()
                .name(format!("ouinet-client-{pid}-stderr"))
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        trace!("Client stderr: {line}");
                    }
                });
            if let Err(e) = spawned {
                debug!("Not capturing client stderr: {e}");
            }
        }

        self.adopt_child(child)?;

        self.wait_until_listening(pid)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        let child = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut child) = child else {
            debug!("Client not running, nothing to stop");
            return;
        };

        let pid = child.id();
        if !terminate_child(&mut child) {
            debug!("Graceful stop of PID {pid} failed, killing");
            let _ = child.kill();
        }
        let _ = child.wait();
        info!("Client (PID {pid}) stopped");
    }

    fn has_exited(&self) -> bool {
        self.child_exited()
    }

    fn path_to_ca_root_cert(&self) -> PathBuf {
        self.config.repo_root().join(CA_ROOT_CERT_FILE_NAME)
    }
}

/// Factory producing [`ExternalClientProxy`] instances.
#[derive(Debug, Clone)]
pub struct ClientProxyFactory {
    binary: String,
}

impl ClientProxyFactory {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ProxyFactory for ClientProxyFactory {
    fn construct(&self, config: &ProxyConfig) -> Result<Arc<dyn NativeProxy>, NativeError> {
        debug!("Constructing client proxy with repo {}", config.repo_root().display());
        Ok(Arc::new(ExternalClientProxy::new(
            self.binary.as_str(),
            config.clone(),
        )))
    }
}
