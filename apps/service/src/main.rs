use ouinet_service::error::ServiceAppError;
use ouinet_service::host::QuitSignal;
use ouinet_service::logger::initialize as LoggerInitialize;
use ouinet_service::proxy_env::{self, PROXY_ENV_FILE_NAME};
use ouinet_service::requests::{InboundRequest, handle_start, parse_request};

use proxy_core::config::{AppConfig, default_config_dir};
use proxy_core::lifecycle::process::SysinfoProcessManager;
use proxy_core::lifecycle::{LifecycleController, ProcessManager, ShutdownOutcome};
use proxy_core::native::client::ClientProxyFactory;
use proxy_core::service::{LogNotifier, ProxyServiceHost};

use common::ErrorLocation;
use models::ShutdownRequest;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tokio::runtime::Handle;
use tokio::signal::ctrl_c;
use tokio::task::spawn_blocking;

const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServiceAppError> {
    // .env may carry OUINET_INJECTOR_CREDENTIALS and OUINET_LOG
    let _ = dotenvy::dotenv();

    let config_dir = default_config_dir().map_err(ServiceAppError::from_core)?;

    let log_dir = config_dir.join(LOG_DIR_NAME);
    create_dir_all(&log_dir).map_err(|e| ServiceAppError::Service {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    LoggerInitialize(&log_dir)?;

    info!("Ouinet service starting");
    info!("Config directory: {}", config_dir.display());

    let config = AppConfig::load(&config_dir).map_err(ServiceAppError::from_core)?;

    let processes = Arc::new(SysinfoProcessManager::new(config.purge_dirs()));
    let quit = Arc::new(QuitSignal::new(config.service.data_dirs.clone()));

    let service = Arc::new(
        ProxyServiceHost::new(
            Arc::new(ClientProxyFactory::new(config.client_binary())),
            Arc::new(LogNotifier),
            Handle::current(),
        )
        .with_purge_action(processes.can_clear_application_data()),
    );

    let controller = Arc::new(LifecycleController::new(
        processes,
        service.clone(),
        quit.clone(),
        config.quit_options(),
    ));

    service.initialize();

    let proxy_env_path = config_dir.join(PROXY_ENV_FILE_NAME);
    tokio::spawn(proxy_env::track(
        service.subscribe_state(),
        proxy_env_path.clone(),
    ));

    if config.service.auto_start {
        let proxy_config = config.proxy_config().map_err(ServiceAppError::from_core)?;
        service.start(proxy_config).map_err(ServiceAppError::from_core)?;
    } else {
        info!("Auto start disabled, waiting for a start request");
    }

    tokio::spawn(read_requests(
        Arc::clone(&controller),
        Arc::clone(&service),
        config_dir.clone(),
    ));

    tokio::select! {
        _ = ctrl_c() => {
            let request = if config.service.purge_on_exit {
                ShutdownRequest::stop_and_purge()
            } else {
                ShutdownRequest::stop()
            };
            info!("Interrupted, handling {request:?}");
            dispatch(&controller, request).await?;
        }
        _ = quit.wait() => {}
    }

    let options = quit.wait().await;
    if options.sanitize_on_exit {
        quit.sanitize()?;
    }

    service.shutdown();
    if let Err(e) = proxy_env::remove(&proxy_env_path) {
        warn!("{e}");
    }
    info!("Ouinet service stopped");
    Ok(())
}

/// Run a request on the blocking pool; stops and kills may wait on processes.
async fn dispatch(
    controller: &Arc<LifecycleController>,
    request: ShutdownRequest,
) -> Result<ShutdownOutcome, ServiceAppError> {
    let controller = Arc::clone(controller);

    spawn_blocking(move || controller.handle_shutdown_request(&request))
        .await
        .map_err(|e| ServiceAppError::Service {
            message: format!("Shutdown request task failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?
        .map_err(ServiceAppError::from_core)
}

/// Requests from cooperating components, one JSON object per line.
async fn read_requests(
    controller: Arc<LifecycleController>,
    service: Arc<ProxyServiceHost>,
    config_dir: PathBuf,
) {
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Request input closed");
                return;
            }
            Err(e) => {
                warn!("Failed to read request input: {e}");
                return;
            }
        };

        let request = match parse_request(&line) {
            Ok(Some(InboundRequest::Start)) => {
                match handle_start(&service, &config_dir) {
                    Ok(outcome) => info!("Start request handled: {outcome:?}"),
                    Err(e) => error!("Start request failed: {e}"),
                }
                continue;
            }
            Ok(Some(InboundRequest::Shutdown(request))) => request,
            Ok(None) => continue,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };

        match dispatch(&controller, request).await {
            Ok(outcome) => debug!("Request {request:?} handled: {outcome:?}"),
            Err(e) => error!("Request {request:?} failed: {e}"),
        }
    }
}
