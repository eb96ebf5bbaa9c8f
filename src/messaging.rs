//! Host-facing messaging operations: send, subscribe, stop.
//!
//! Requests arrive as loosely typed host payloads, so every field is
//! optional on the wire and checked here before anything touches the store.

use crate::error::{Result, SyncError};
use crate::remote::{RemoteStore, StoreEndpoint};
use crate::subscriptions::{MessageListener, SubscriptionManager, META_KEY};
use crate::types::{ChannelId, ConversationMeta, Message};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Request to send one message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "remitenteId")]
    pub sender_id: Option<String>,
    #[serde(rename = "destinatarioId")]
    pub recipient_id: Option<String>,
    #[serde(rename = "texto")]
    pub text: Option<String>,
    #[serde(rename = "databaseURL")]
    pub database_url: Option<String>,
    #[serde(rename = "idToken")]
    pub id_token: Option<String>,
}

/// Request to follow the conversation between two users.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "uidA")]
    pub uid_a: Option<String>,
    #[serde(rename = "uidB")]
    pub uid_b: Option<String>,
    #[serde(rename = "databaseURL")]
    pub database_url: Option<String>,
    #[serde(rename = "idToken")]
    pub id_token: Option<String>,
}

/// Collects missing fields so one error can name all of them.
#[derive(Default)]
struct Required {
    missing: Vec<&'static str>,
}

impl Required {
    fn take<'a>(&mut self, name: &'static str, value: &'a Option<String>) -> &'a str {
        match value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.missing.push(name);
                ""
            }
        }
    }

    fn check(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Validation(format!(
                "missing required parameters: {}",
                self.missing.join(", ")
            )))
        }
    }
}

/// Sends messages and manages conversation subscriptions.
pub struct MessagingService {
    manager: Arc<SubscriptionManager>,
}

impl MessagingService {
    pub fn new(manager: Arc<SubscriptionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }

    /// Append a message to the sender/recipient channel.
    ///
    /// Errors surface to the caller. After a transport or protocol error
    /// the message may or may not have been stored; resending can create
    /// a duplicate.
    pub fn send_message(&self, request: &SendMessageRequest) -> Result<Message> {
        let mut required = Required::default();
        let sender = required.take("remitenteId", &request.sender_id);
        let recipient = required.take("destinatarioId", &request.recipient_id);
        let text = required.take("texto", &request.text);
        let database_url = required.take("databaseURL", &request.database_url);
        let id_token = required.take("idToken", &request.id_token);
        required.check()?;

        let endpoint = StoreEndpoint::new(database_url, id_token);
        let channel = ChannelId::derive(sender, recipient);
        ensure_meta(
            self.manager.store().as_ref(),
            &endpoint,
            &self.meta_path(&channel),
            sender,
            recipient,
        )?;

        let message = Message::outgoing(sender, recipient, text);
        let payload = serde_json::to_value(&message)?;
        let path = self.manager.config().channel_path(channel.as_str());
        self.manager.store().append(&endpoint, &path, &payload)?;
        debug!(channel = %channel, "message sent");
        Ok(message)
    }

    /// Start delivering the conversation's messages to `listener`.
    ///
    /// Returns once the subscription is registered. The conversation's
    /// participant record is written afterwards on a short-lived thread;
    /// failing to write it is only logged.
    ///
    /// If the conversation is already followed, the existing listener
    /// stays in place and `listener` is dropped.
    pub fn subscribe(
        &self,
        request: &SubscribeRequest,
        listener: impl MessageListener,
    ) -> Result<ChannelId> {
        let mut required = Required::default();
        let uid_a = required.take("uidA", &request.uid_a);
        let uid_b = required.take("uidB", &request.uid_b);
        let database_url = required.take("databaseURL", &request.database_url);
        let id_token = required.take("idToken", &request.id_token);
        required.check()?;

        let endpoint = StoreEndpoint::new(database_url, id_token);
        let channel = ChannelId::derive(uid_a, uid_b);
        self.manager.subscribe(channel.clone(), endpoint.clone(), listener)?;

        let store = Arc::clone(self.manager.store());
        let path = self.meta_path(&channel);
        let meta_channel = channel.clone();
        let (x, y) = (uid_a.to_string(), uid_b.to_string());
        let spawned = thread::Builder::new()
            .name(format!("meta-{channel}"))
            .spawn(move || {
                if let Err(e) = ensure_meta(store.as_ref(), &endpoint, &path, &x, &y) {
                    warn!(channel = %meta_channel, error = %e, "could not create conversation meta");
                }
            });
        if let Err(e) = spawned {
            warn!(channel = %channel, error = %e, "could not start conversation meta writer");
        }
        Ok(channel)
    }

    /// Stop following the conversation. Returns `false` if it was not followed.
    pub fn unsubscribe(&self, uid_a: &str, uid_b: &str) -> bool {
        if uid_a.is_empty() || uid_b.is_empty() {
            return false;
        }
        self.manager.unsubscribe(&ChannelId::derive(uid_a, uid_b))
    }

    fn meta_path(&self, channel: &ChannelId) -> String {
        format!(
            "{}/{}",
            self.manager.config().channel_path(channel.as_str()),
            META_KEY
        )
    }
}

/// Write the conversation's participant record if it is missing.
fn ensure_meta(
    store: &dyn RemoteStore,
    endpoint: &StoreEndpoint,
    path: &str,
    x: &str,
    y: &str,
) -> Result<()> {
    if store.fetch_collection(endpoint, path)?.is_some() {
        return Ok(());
    }
    let meta = serde_json::to_value(ConversationMeta::for_participants(x, y))?;
    store.replace(endpoint, path, &meta)
}
