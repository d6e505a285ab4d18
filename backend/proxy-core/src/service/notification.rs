//! Foreground notification posted while the proxy runs.

use models::ShutdownRequest;

use log::info;

pub const CHANNEL_ID: &str = "ouinet";
pub const FOREGROUND_NOTIFICATION_ID: u32 = 1;

const CHANNEL_NAME: &str = "Ouinet";
const NOTIFICATION_TITLE: &str = "Ouinet is running";
const NOTIFICATION_TEXT: &str = "Tap Stop to shut down the proxy";
const STOP_LABEL: &str = "Stop";
const PURGE_LABEL: &str = "Stop and purge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self {
            id: CHANNEL_ID.to_string(),
            name: CHANNEL_NAME.to_string(),
        }
    }
}

/// A button on the notification and the request it sends when tapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: String,
    pub request: ShutdownRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundNotification {
    pub id: u32,
    pub channel_id: String,
    pub title: String,
    pub text: String,
    pub actions: Vec<NotificationAction>,
}

impl ForegroundNotification {
    /// Notification with a Stop action, plus Stop-and-purge when supported.
    pub fn running(can_purge: bool) -> Self {
        let mut actions = vec![NotificationAction {
            label: STOP_LABEL.to_string(),
            request: ShutdownRequest::stop(),
        }];

        if can_purge {
            actions.push(NotificationAction {
                label: PURGE_LABEL.to_string(),
                request: ShutdownRequest::stop_and_purge(),
            });
        }

        Self {
            id: FOREGROUND_NOTIFICATION_ID,
            channel_id: CHANNEL_ID.to_string(),
            title: NOTIFICATION_TITLE.to_string(),
            text: NOTIFICATION_TEXT.to_string(),
            actions,
        }
    }
}

/// Host notification surface.
pub trait ForegroundNotifier: Send + Sync {
    fn create_channel(&self, channel: &NotificationChannel);

    /// Post the persistent notification that keeps the process alive.
    fn post_foreground(&self, notification: &ForegroundNotification);

    fn clear_foreground(&self);
}

/// Notifier for headless hosts: writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ForegroundNotifier for LogNotifier {
    fn create_channel(&self, channel: &NotificationChannel) {
        info!("Notification channel '{}' ({})", channel.name, channel.id);
    }

    fn post_foreground(&self, notification: &ForegroundNotification) {
        let labels: Vec<&str> = notification
            .actions
            .iter()
            .map(|a| a.label.as_str())
            .collect();
        info!(
            "{}: {} [actions: {}]",
            notification.title,
            notification.text,
            labels.join(", ")
        );
    }

    fn clear_foreground(&self) {
        info!("Foreground notification cleared");
    }
}
