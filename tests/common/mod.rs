//! Shared helpers for integration tests.

#![allow(dead_code)]

use matchsync::{
    MemoryStore, NotificationSurface, Result, StoreEndpoint, SubscriptionManager, SyncConfig,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const WAIT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn fast_config() -> SyncConfig {
    SyncConfig::default().with_poll_interval(POLL_INTERVAL)
}

pub fn memory_manager() -> (Arc<MemoryStore>, SubscriptionManager) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let manager = SubscriptionManager::new(store.clone(), fast_config());
    (store, manager)
}

pub fn endpoint() -> StoreEndpoint {
    StoreEndpoint::new("memory://", "token")
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Notification surface that records what it was asked to show.
#[derive(Default)]
pub struct RecordingSurface {
    pub foreground: AtomicBool,
    pub channels: Mutex<Vec<String>>,
    pub posts: Mutex<Vec<(String, String)>>,
}

impl NotificationSurface for RecordingSurface {
    fn is_foreground(&self) -> Result<bool> {
        Ok(self.foreground.load(Ordering::SeqCst))
    }

    fn create_channel(&self, id: &str, _name: &str) -> Result<()> {
        self.channels.lock().push(id.to_string());
        Ok(())
    }

    fn post(&self, _channel_id: &str, title: &str, body: &str) -> Result<()> {
        self.posts.lock().push((title.to_string(), body.to_string()));
        Ok(())
    }
}
