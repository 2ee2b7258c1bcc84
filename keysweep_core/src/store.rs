//! External collaborator interfaces
//!
//! The core consumes the remote record store through the narrow primitives
//! defined here: read, write, schema lookups, id generation, and an audit
//! sink. Session handling, metadata caching, and the rest of the migration
//! glue live behind these traits in the surrounding system.

use crate::error::{InternalError, Result};
use crate::record::{Query, Record};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Matching-key definitions: object type to its ordered matching fields
pub type MatchingKeys = IndexMap<String, Vec<String>>;

/// Per-record outcome of an update call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Identifier of the record the outcome belongs to, when the store echoes it
    pub id: Option<String>,
    /// Whether the store accepted the update
    pub success: bool,
    /// Store-reported failure messages, empty on success
    pub errors: Vec<String>,
}

impl UpdateOutcome {
    /// An accepted update for `id`
    pub fn accepted(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            success: true,
            errors: Vec::new(),
        }
    }

    /// A rejected update for `id` with the store's messages
    pub fn rejected(id: &str, errors: Vec<String>) -> Self {
        Self {
            id: Some(id.to_string()),
            success: false,
            errors,
        }
    }
}

/// Read/write/schema primitives the remote record store exposes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Execute a read query, returning records in store order
    async fn read(&self, query: &Query) -> Result<Vec<Record>>;

    /// Update records of one object type, returning per-record outcomes
    /// in the same order as the input
    async fn update(&self, object_type: &str, records: Vec<Record>) -> Result<Vec<UpdateOutcome>>;

    /// Externally supplied matching-key definitions
    async fn matching_key_definitions(&self) -> Result<MatchingKeys>;

    /// Object types currently present in the store's schema
    async fn valid_schema_objects(&self) -> Result<HashSet<String>>;
}

/// Source of opaque unique identifier values
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default [`IdGenerator`] producing v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sink for the human-readable audit trail of a run
pub trait AuditSink: Send + Sync {
    fn record(&self, message: String);
}

/// In-memory [`AuditSink`] that keeps every entry in order
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<String>>,
}

impl AuditLog {
    /// Create an empty audit log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded so far
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("audit log lock poisoned").clone()
    }
}

impl AuditSink for AuditLog {
    fn record(&self, message: String) {
        log::info!("{message}");
        self.entries
            .lock()
            .expect("audit log lock poisoned")
            .push(message);
    }
}

/// Run `op` up to `max_attempts` times with linear backoff between attempts.
///
/// Returns the first success or the last error observed. Zero attempts is a
/// caller bug and reported as such rather than looping forever.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!("attempt {attempt}/{max_attempts} failed: {e}");
                last_error = Some(e);
                if attempt < max_attempts {
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| InternalError::retries_exhausted(max_attempts).into()))
}
