//! Remote record store related error types

use thiserror::Error;

/// Errors surfaced by the remote store's read and write primitives
#[derive(Error, Debug)]
pub enum RemoteError {
    /// A read query against the store failed
    #[error("Remote query failed for {object_type}: {message}")]
    Query {
        object_type: String,
        message: String,
    },

    /// An update call against the store failed
    #[error("Remote write failed for {object_type}: {message}")]
    Write {
        object_type: String,
        message: String,
    },
}

impl RemoteError {
    /// Create a query error
    pub fn query(object_type: &str, message: impl Into<String>) -> Self {
        Self::Query {
            object_type: object_type.to_string(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(object_type: &str, message: impl Into<String>) -> Self {
        Self::Write {
            object_type: object_type.to_string(),
            message: message.into(),
        }
    }
}
