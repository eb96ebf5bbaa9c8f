//! Error types for store access and subscriptions.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input was missing. The operation was not attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a non-2xx status or an unreadable body.
    #[error("Protocol error{}: {message}", status_suffix(.status))]
    Protocol {
        status: Option<u16>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl SyncError {
    pub fn protocol(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::Protocol {
            status,
            message: message.into(),
        }
    }

    /// True for caller mistakes that retrying will not fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// True for failures a later poll cycle may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Protocol { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
