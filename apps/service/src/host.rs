//! Graceful quit pathway for the headless service.

use crate::error::ServiceAppError;

use common::ErrorLocation;
use models::QuitOptions;
use proxy_core::lifecycle::ApplicationHost;

use std::fs::remove_dir_all;
use std::io::ErrorKind;
use std::panic::Location;
use std::path::PathBuf;

use log::{debug, info};
use tokio::sync::watch;

/// [`ApplicationHost`] that asks the main loop to exit.
///
/// `quit_application` only records the request; the main loop picks it up
/// from [`QuitSignal::wait`] and runs [`QuitSignal::sanitize`] if asked to.
pub struct QuitSignal {
    tx: watch::Sender<Option<QuitOptions>>,
    sanitize_dirs: Vec<PathBuf>,
}

impl QuitSignal {
    /// `sanitize_dirs` are removed on a quit with `sanitize_on_exit`.
    pub fn new(sanitize_dirs: Vec<PathBuf>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, sanitize_dirs }
    }

    pub fn requested(&self) -> Option<QuitOptions> {
        *self.tx.borrow()
    }

    /// Resolve once a quit has been requested.
    pub async fn wait(&self) -> QuitOptions {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(options) = *rx.borrow_and_update() {
                return options;
            }
            if rx.changed().await.is_err() {
                return QuitOptions::default();
            }
        }
    }

    /// Remove the sanitize directories. Missing directories are fine.
    #[track_caller]
    pub fn sanitize(&self) -> Result<(), ServiceAppError> {
        for dir in &self.sanitize_dirs {
            match remove_dir_all(dir) {
                Ok(()) => info!("Sanitized {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} already absent", dir.display())
                }
                Err(e) => {
                    return Err(ServiceAppError::Service {
                        message: format!("Failed to sanitize {}: {e}", dir.display()),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
        Ok(())
    }
}

impl ApplicationHost for QuitSignal {
    fn quit_application(&self, options: QuitOptions) {
        info!("Quit requested (sanitize_on_exit={})", options.sanitize_on_exit);
        self.tx.send_replace(Some(options));
    }
}
