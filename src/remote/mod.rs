//! Access to the remote JSON document store.
//!
//! The store only offers request/response access:
//! - `GET {base}{path}.json?auth={token}` reads a subtree (`null` or an
//!   empty body when nothing is stored there)
//! - `POST` appends a child under a store-assigned key
//! - `PUT` replaces the value at a known path
//!
//! [`RemoteStore`] is the seam between the subscription machinery and the
//! transport. [`HttpStore`] talks to a real store, [`MemoryStore`] keeps the
//! tree in-process.

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::error::{Result, SyncError};
use serde_json::{Map, Value};

/// Records of a collection keyed by their store-assigned ids.
pub type Collection = Map<String, Value>;

/// Characters the store refuses inside path segments.
const FORBIDDEN_PATH_CHARS: &[char] = &['.', '#', '$', '[', ']', '?', '&'];

/// Where a store lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    pub base_url: String,
    pub auth_token: String,
}

impl StoreEndpoint {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Full request URL for `path`.
    pub fn url(&self, path: &str) -> Result<String> {
        let segments = split_path(path)?;
        let base = self.base_url.trim_end_matches('/');
        Ok(format!(
            "{}/{}.json?auth={}",
            base,
            segments.join("/"),
            self.auth_token
        ))
    }
}

impl std::fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("base_url", &self.base_url)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Read and write access to the document store.
///
/// Implementations must be shareable across poll threads.
pub trait RemoteStore: Send + Sync {
    /// Read the collection at `path`.
    ///
    /// `Ok(None)` means nothing is stored there yet; callers treat it as
    /// zero records, not as a fault.
    fn fetch_collection(&self, endpoint: &StoreEndpoint, path: &str) -> Result<Option<Collection>>;

    /// Append `payload` under a fresh store-assigned key (POST).
    ///
    /// Not idempotent. After an error the outcome is unknown and the
    /// record may still have been written.
    fn append(&self, endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()>;

    /// Replace the value stored at `path` (PUT).
    fn replace(&self, endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()>;
}

/// Split a store path into validated segments.
pub(crate) fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(SyncError::InvalidPath(path.to_string()));
    }
    if segments
        .iter()
        .any(|s| s.contains(FORBIDDEN_PATH_CHARS) || s.chars().any(char::is_control))
    {
        return Err(SyncError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Parse a successful read body.
pub(crate) fn parse_collection(body: &str) -> Result<Option<Collection>> {
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SyncError::protocol(None, format!("unparseable body: {e}")))?;
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(SyncError::protocol(
            None,
            format!("expected an object, got {}", json_kind(&other)),
        )),
    }
}

/// Map a non-2xx response to a protocol error.
///
/// The store reports failures as `{"error": "..."}`; anything else is
/// passed through as the raw body.
pub(crate) fn status_error(status: u16, body: &str) -> SyncError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty error body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    SyncError::protocol(Some(status), message)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_format() {
        let endpoint = StoreEndpoint::new("https://db.example.com/", "tok");
        assert_eq!(
            endpoint.url("mensajes/A_B").unwrap(),
            "https://db.example.com/mensajes/A_B.json?auth=tok"
        );

        let endpoint = StoreEndpoint::new("https://db.example.com", "tok");
        assert_eq!(
            endpoint.url("/usuarios").unwrap(),
            "https://db.example.com/usuarios.json?auth=tok"
        );
    }

    #[test]
    fn test_url_rejects_bad_paths() {
        let endpoint = StoreEndpoint::new("https://db.example.com/", "tok");
        assert!(matches!(endpoint.url(""), Err(SyncError::InvalidPath(_))));
        assert!(matches!(endpoint.url("a//b"), Err(SyncError::InvalidPath(_))));
        assert!(matches!(endpoint.url("a/b.json"), Err(SyncError::InvalidPath(_))));
        assert!(matches!(endpoint.url("a?auth=x"), Err(SyncError::InvalidPath(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let endpoint = StoreEndpoint::new("https://db.example.com/", "secret-token");
        assert!(!format!("{endpoint:?}").contains("secret-token"));
    }

    #[test]
    fn test_parse_absent_bodies() {
        assert!(parse_collection("").unwrap().is_none());
        assert!(parse_collection("null").unwrap().is_none());
        assert!(parse_collection("  null\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_collection_object() {
        let map = parse_collection(r#"{"m1": {"texto": "hi"}}"#).unwrap().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["m1"]["texto"], "hi");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            parse_collection("[1,2]"),
            Err(SyncError::Protocol { status: None, .. })
        ));
        assert!(matches!(
            parse_collection("{not json"),
            Err(SyncError::Protocol { .. })
        ));
    }

    #[test]
    fn test_status_error_shapes() {
        match status_error(401, r#"{"error": "Permission denied"}"#) {
            SyncError::Protocol { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Permission denied");
            }
            other => panic!("unexpected {other:?}"),
        }

        match status_error(502, "<html>bad gateway</html>") {
            SyncError::Protocol { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "<html>bad gateway</html>");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
