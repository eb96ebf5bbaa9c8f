//! Core types shared by the store client and subscriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Canonical identifier of a two-party conversation.
///
/// Both participants derive the same id no matter who initiates, so the
/// lexicographically smaller participant always comes first.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Derive the channel id for participants `a` and `b`.
    pub fn derive(a: &str, b: &str) -> Self {
        if a <= b {
            ChannelId(format!("{a}_{b}"))
        } else {
            ChannelId(format!("{b}_{a}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A chat message as stored under a channel's collection.
///
/// Field names on the wire follow the store's existing schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Record key assigned by the store. Never part of the written payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "remitenteId")]
    pub sender_id: String,

    #[serde(rename = "destinatarioId")]
    pub recipient_id: String,

    #[serde(rename = "texto")]
    pub text: String,

    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
}

impl Message {
    /// Build an outgoing message stamped with the current time.
    pub fn outgoing(sender_id: &str, recipient_id: &str, text: &str) -> Self {
        Self {
            id: String::new(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
            timestamp_millis: Timestamp::now().millis(),
        }
    }

    /// Build a message from a stored record.
    ///
    /// Never fails: missing text fields become empty and a missing
    /// timestamp becomes the current time.
    pub fn from_record(id: &str, record: &Value) -> Self {
        Self {
            id: id.to_string(),
            sender_id: str_field(record, "remitenteId"),
            recipient_id: str_field(record, "destinatarioId"),
            text: str_field(record, "texto"),
            timestamp_millis: millis_field(record, "timestamp")
                .unwrap_or_else(|| Timestamp::now().millis()),
        }
    }

    /// The channel this message belongs to.
    pub fn channel(&self) -> ChannelId {
        ChannelId::derive(&self.sender_id, &self.recipient_id)
    }
}

/// Conversation metadata stored next to the messages under the `meta` key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub a: String,
    pub b: String,
}

impl ConversationMeta {
    pub fn for_participants(x: &str, y: &str) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a: a.to_string(),
            b: b.to_string(),
        }
    }
}

/// Review outcome of one user for another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aceptado")]
    Accepted,
    #[serde(rename = "rechazado")]
    Rejected,
    /// Both users accepted each other.
    #[serde(rename = "mutuo")]
    Mutual,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pendiente",
            MatchStatus::Accepted => "aceptado",
            MatchStatus::Rejected => "rechazado",
            MatchStatus::Mutual => "mutuo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(MatchStatus::Pending),
            "aceptado" => Some(MatchStatus::Accepted),
            "rechazado" => Some(MatchStatus::Rejected),
            "mutuo" => Some(MatchStatus::Mutual),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A match record stored at `matches/{uid}/{other}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    pub other_user_id: String,
    pub status: MatchStatus,
    pub timestamp_millis: i64,
}

impl MatchRecord {
    /// Parse a stored record. Returns `None` when the status is missing
    /// or unknown.
    pub fn from_record(other_user_id: &str, record: &Value) -> Option<Self> {
        let status = record
            .get("estado")
            .and_then(Value::as_str)
            .and_then(MatchStatus::parse)?;
        Some(Self {
            other_user_id: other_user_id.to_string(),
            status,
            timestamp_millis: millis_field(record, "timestamp").unwrap_or(0),
        })
    }

    /// The payload written for this record.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "estado": self.status.as_str(),
            "timestamp": self.timestamp_millis,
        })
    }
}

/// Public profile of a candidate user, read from `usuarios/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "edad")]
    pub age: u32,
    pub email: String,
    #[serde(rename = "fotoUrl")]
    pub photo_url: String,
    pub bio: String,
}

impl UserProfile {
    /// Build a profile from a stored record, defaulting missing fields.
    pub fn from_record(id: &str, record: &Value) -> Self {
        Self {
            id: id.to_string(),
            name: str_field(record, "nombre"),
            age: record
                .get("edad")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            email: str_field(record, "email"),
            photo_url: str_field(record, "fotoUrl"),
            bio: str_field(record, "bio"),
        }
    }
}

fn str_field(record: &Value, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn millis_field(record: &Value, key: &str) -> Option<i64> {
    let value = record.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}
