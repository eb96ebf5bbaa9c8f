//! Registry of live polling subscriptions, one per channel.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::notify::{NotificationDispatcher, NotificationSurface};
use crate::remote::{RemoteStore, StoreEndpoint};
use crate::types::ChannelId;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::poller::PollingSubscription;
use super::types::{MessageListener, SubscriptionStats};

/// Owns every active subscription of an app session.
///
/// Construct one per session and share it (e.g. behind an `Arc`) with
/// every caller. At most one subscription exists per channel; `subscribe`
/// and `unsubscribe` may be called from any thread and never wait on the
/// network. Dropping the manager stops all subscriptions.
pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    config: SyncConfig,
    notifier: Option<Arc<NotificationDispatcher>>,
    /// Active subscriptions by channel.
    subscriptions: RwLock<HashMap<ChannelId, PollingSubscription>>,
}

impl SubscriptionManager {
    /// Create a manager without local notifications.
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            notifier: None,
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Also post a local notification for every delivered message.
    pub fn with_notifications(mut self, surface: Arc<dyn NotificationSurface>) -> Self {
        self.notifier = Some(Arc::new(NotificationDispatcher::new(
            surface,
            self.config.notification.clone(),
        )));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Start polling `channel` unless it is already subscribed.
    ///
    /// Returns `true` if a new subscription was started. When one already
    /// exists this is a no-op and the existing listener keeps receiving;
    /// `listener` is dropped.
    pub fn subscribe(
        &self,
        channel: ChannelId,
        endpoint: StoreEndpoint,
        listener: impl MessageListener,
    ) -> Result<bool> {
        if channel.as_str().is_empty() {
            return Err(SyncError::Validation("channel id is required".to_string()));
        }
        if endpoint.base_url.is_empty() || endpoint.auth_token.is_empty() {
            return Err(SyncError::Validation(
                "database URL and auth token are required".to_string(),
            ));
        }

        let mut subs = self.subscriptions.write();
        match subs.entry(channel) {
            Entry::Occupied(entry) => {
                debug!(channel = %entry.key(), "already subscribed");
                Ok(false)
            }
            Entry::Vacant(entry) => {
                let path = self.config.channel_path(entry.key().as_str());
                let subscription = PollingSubscription::new(
                    entry.key().clone(),
                    path,
                    self.config.poll_interval,
                    Arc::clone(&self.store),
                    endpoint,
                    Box::new(listener),
                    self.notifier.clone(),
                );
                subscription.start()?;
                entry.insert(subscription);
                Ok(true)
            }
        }
    }

    /// Stop and remove the subscription for `channel`.
    ///
    /// Returns `false` if there was none.
    pub fn unsubscribe(&self, channel: &ChannelId) -> bool {
        let removed = self.subscriptions.write().remove(channel);
        match removed {
            Some(subscription) => {
                subscription.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, channel: &ChannelId) -> bool {
        self.subscriptions.read().contains_key(channel)
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Channels with an active subscription.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.subscriptions.read().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn stats(&self, channel: &ChannelId) -> Option<SubscriptionStats> {
        self.subscriptions.read().get(channel).map(|s| s.stats())
    }

    /// Stop every subscription and wait for their poll threads to exit.
    pub fn shutdown(&self) {
        let drained: Vec<PollingSubscription> =
            self.subscriptions.write().drain().map(|(_, s)| s).collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "shutting down subscriptions");
        for subscription in &drained {
            subscription.stop();
        }
        for subscription in &drained {
            subscription.stop_and_join();
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        for (_, subscription) in self.subscriptions.get_mut().drain() {
            subscription.stop();
        }
    }
}
