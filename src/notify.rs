//! Local notifications for newly delivered messages.

use crate::config::NotificationConfig;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The host's notification facilities.
pub trait NotificationSurface: Send + Sync {
    /// Whether the host UI currently has focus.
    fn is_foreground(&self) -> Result<bool>;

    /// Create the notification channel. Called once before the first post.
    fn create_channel(&self, id: &str, name: &str) -> Result<()>;

    /// Show a notification on `channel_id`.
    fn post(&self, channel_id: &str, title: &str, body: &str) -> Result<()>;
}

/// What happened to a notification request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Posted,
    /// The host UI had focus.
    Suppressed,
    /// Notifications are turned off in the config.
    Disabled,
}

/// Turns delivered messages into user-visible notifications.
pub struct NotificationDispatcher {
    surface: Arc<dyn NotificationSurface>,
    config: NotificationConfig,
    channel_created: Mutex<bool>,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn NotificationSurface>, config: NotificationConfig) -> Self {
        Self {
            surface,
            config,
            channel_created: Mutex::new(false),
        }
    }

    /// Title used for new-message notifications.
    pub fn title(&self) -> &str {
        &self.config.title
    }

    /// Post a notification unless the host UI has focus.
    ///
    /// A failed foreground query counts as background, so the notification
    /// is shown.
    pub fn notify(&self, title: &str, body: &str) -> Result<NotifyOutcome> {
        if !self.config.enabled {
            return Ok(NotifyOutcome::Disabled);
        }

        let foreground = match self.surface.is_foreground() {
            Ok(foreground) => foreground,
            Err(e) => {
                warn!(error = %e, "foreground query failed, assuming background");
                false
            }
        };
        if foreground {
            debug!("host in foreground, notification suppressed");
            return Ok(NotifyOutcome::Suppressed);
        }

        self.ensure_channel()?;
        self.surface.post(&self.config.channel_id, title, body)?;
        Ok(NotifyOutcome::Posted)
    }

    fn ensure_channel(&self) -> Result<()> {
        let mut created = self.channel_created.lock();
        if !*created {
            self.surface
                .create_channel(&self.config.channel_id, &self.config.channel_name)?;
            *created = true;
        }
        Ok(())
    }
}

/// A surface for hosts without a notification UI: notifications become
/// log events.
#[derive(Default)]
pub struct TracingSurface {
    foreground: AtomicBool,
}

impl TracingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }
}

impl NotificationSurface for TracingSurface {
    fn is_foreground(&self) -> Result<bool> {
        Ok(self.foreground.load(Ordering::SeqCst))
    }

    fn create_channel(&self, id: &str, name: &str) -> Result<()> {
        debug!(channel = id, name, "notification channel ready");
        Ok(())
    }

    fn post(&self, channel_id: &str, title: &str, body: &str) -> Result<()> {
        info!(channel = channel_id, title, body, "notification");
        Ok(())
    }
}
