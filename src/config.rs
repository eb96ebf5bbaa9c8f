//! Runtime configuration.

use std::time::Duration;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default timeout for a single store request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sync configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Interval between the starts of consecutive poll cycles.
    pub poll_interval: Duration,

    /// Timeout applied to every store request.
    pub request_timeout: Duration,

    /// Collection holding one child collection per channel.
    pub messages_root: String,

    /// Local notification settings.
    pub notification: NotificationConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            messages_root: "mensajes".to_string(),
            notification: NotificationConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Store path of a channel's message collection.
    pub fn channel_path(&self, channel: &str) -> String {
        format!("{}/{}", self.messages_root.trim_end_matches('/'), channel)
    }
}

/// Local notification settings.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// Platform channel id, created lazily on first use.
    pub channel_id: String,

    /// Human-readable channel name.
    pub channel_name: String,

    /// Title shown for new-message notifications.
    pub title: String,

    /// Post notifications at all.
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_id: "mensajes".to_string(),
            channel_name: "Mensajes".to_string(),
            title: "Nuevo mensaje".to_string(),
            enabled: true,
        }
    }
}
