//! HTTP transport for the document store.

use super::{parse_collection, status_error, Collection, RemoteStore, StoreEndpoint};
use crate::config::{SyncConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{Result, SyncError};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Blocking HTTP client for the store.
///
/// One agent is shared by every subscription so connections are pooled.
#[derive(Clone)]
pub struct HttpStore {
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.request_timeout)
    }

    fn send(&self, method: &str, endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()> {
        let url = endpoint.url(path)?;
        let body = serde_json::to_string(payload)?;
        debug!(method, path, bytes = body.len(), "store write");
        let result = self
            .agent
            .request(method, &url)
            .set("Content-Type", JSON_CONTENT_TYPE)
            .send_string(&body);
        read_body(result).map(|_| ())
    }
}

impl Default for HttpStore {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl RemoteStore for HttpStore {
    fn fetch_collection(&self, endpoint: &StoreEndpoint, path: &str) -> Result<Option<Collection>> {
        let url = endpoint.url(path)?;
        debug!(path, "store read");
        let body = read_body(self.agent.get(&url).call())?;
        parse_collection(&body)
    }

    fn append(&self, endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()> {
        self.send("POST", endpoint, path, payload)
    }

    fn replace(&self, endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()> {
        self.send("PUT", endpoint, path, payload)
    }
}

fn read_body(result: std::result::Result<ureq::Response, ureq::Error>) -> Result<String> {
    match result {
        Ok(response) => response
            .into_string()
            .map_err(|e| SyncError::Transport(format!("failed to read response body: {e}"))),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(status_error(status, &body))
        }
        Err(ureq::Error::Transport(transport)) => Err(SyncError::Transport(transport.to_string())),
    }
}
