//! Typed stop/purge request delivered to the lifecycle controller.

use serde::{Deserialize, Serialize};

/// Inbound shutdown message.
///
/// Both flags are optional on the wire. An absent `stop` means the request
/// is ignored; `purge` only counts together with `stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge: Option<bool>,
}

impl ShutdownRequest {
    /// Stop-only request.
    pub fn stop() -> Self {
        Self {
            stop: Some(true),
            purge: None,
        }
    }

    /// Stop plus purge. Carries everything [`ShutdownRequest::stop`] carries.
    pub fn stop_and_purge() -> Self {
        Self {
            purge: Some(true),
            ..Self::stop()
        }
    }

    pub fn is_stop(&self) -> bool {
        self.stop.unwrap_or(false)
    }

    /// Purge without stop is rejected, so this is false unless both are set.
    pub fn is_purge(&self) -> bool {
        self.is_stop() && self.purge.unwrap_or(false)
    }
}

/// Options for the host's graceful quit pathway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitOptions {
    /// Apply the user's sanitize-on-exit settings while quitting.
    #[serde(default)]
    pub sanitize_on_exit: bool,
}
