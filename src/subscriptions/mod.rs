//! Polling-based subscriptions to channel message collections.
//!
//! The store has no push channel, so each subscribed channel gets its own
//! poll thread that periodically reads the channel's collection and hands
//! records it has not seen before to a listener:
//! - at most one subscription per channel, held by [`SubscriptionManager`]
//! - each record id is delivered once per subscription lifetime
//! - failed poll cycles are logged and counted, never fatal
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(Arc::new(HttpStore::default()), SyncConfig::default());
//! let endpoint = StoreEndpoint::new("https://example.firebaseio.com/", id_token);
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! manager.subscribe(ChannelId::derive("alice", "bob"), endpoint, tx)?;
//!
//! while let Ok(message) = rx.recv() {
//!     println!("{}: {}", message.sender_id, message.text);
//! }
//! ```

mod manager;
mod poller;
mod types;

pub use manager::SubscriptionManager;
pub use poller::{new_messages, PollingSubscription, META_KEY};
pub use types::{MessageListener, SubscriptionState, SubscriptionStats};
