//! # Match Sync
//!
//! Client-side synchronization for a matching app whose backend is a JSON
//! document store reachable only through plain HTTP reads and writes.
//!
//! ## Core Concepts
//!
//! - **Channels**: a two-party conversation, identified by a canonical
//!   [`ChannelId`] that both participants derive identically
//! - **Polling subscriptions**: one background thread per channel that
//!   periodically reads the channel's messages and delivers each record
//!   exactly once per subscription
//! - **Subscription manager**: the session-wide registry guaranteeing at
//!   most one subscription per channel
//! - **Notifications**: new messages become local notifications unless the
//!   host UI has focus
//!
//! ## Example
//!
//! ```ignore
//! use matchsync::{HttpStore, MessagingService, SubscribeRequest, SubscriptionManager, SyncConfig};
//! use std::sync::Arc;
//!
//! let config = SyncConfig::default();
//! let store = Arc::new(HttpStore::from_config(&config));
//! let manager = Arc::new(SubscriptionManager::new(store, config));
//! let messaging = MessagingService::new(Arc::clone(&manager));
//!
//! let channel = messaging.subscribe(
//!     &SubscribeRequest {
//!         uid_a: Some("alice".into()),
//!         uid_b: Some("bob".into()),
//!         database_url: Some("https://example.firebaseio.com/".into()),
//!         id_token: Some(id_token),
//!     },
//!     |message: &Message| println!("{}: {}", message.sender_id, message.text),
//! )?;
//!
//! // Later, at the end of the session.
//! manager.shutdown();
//! ```

pub mod config;
pub mod error;
pub mod matches;
pub mod messaging;
pub mod notify;
pub mod remote;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::{NotificationConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use matches::MatchService;
pub use messaging::{MessagingService, SendMessageRequest, SubscribeRequest};
pub use notify::{NotificationDispatcher, NotificationSurface, NotifyOutcome, TracingSurface};
pub use remote::{Collection, HttpStore, MemoryStore, RemoteStore, StoreEndpoint};
pub use subscriptions::{
    new_messages, MessageListener, PollingSubscription, SubscriptionManager, SubscriptionState,
    SubscriptionStats,
};
pub use types::*;
