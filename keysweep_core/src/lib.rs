//! Core library for scanning a remote record store for duplicate and
//! missing global identifiers and repairing what it finds.
//!
//! The crate is organised around a small pipeline:
//!
//! - [`planner::MatchingKeyPlanner`] turns matching-key definitions into
//!   scan queries, dropping object types the run must not touch
//! - [`scanner::DuplicateScanner`] collates query results into repair
//!   candidates keyed by their matching-key signature
//! - [`repair::RepairExecutor`] validates candidates and writes fresh
//!   global identifiers back through the store
//! - [`pool::WorkerPool`] bounds the concurrency of both phases
//!
//! [`repair::Deduplicator`] drives the whole pass and produces a
//! [`repair::DeduplicationReport`]. Storage access goes through the
//! [`store::RecordStore`] trait so the pipeline stays independent of any
//! one backend.

pub mod error;
pub mod planner;
pub mod pool;
pub mod record;
pub mod repair;
pub mod scanner;
pub mod store;

pub use error::{Error, Result};
pub use record::{Fields, Query, Record};
pub use repair::{DeduplicationReport, Deduplicator};
pub use store::{MatchingKeys, RecordStore, UpdateOutcome};

use serde::{Deserialize, Serialize};

/// Tuning knobs and field-name conventions for a deduplication run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Upper bound on concurrent scan queries
    pub scan_concurrency: usize,
    /// Upper bound on concurrent record updates
    pub write_concurrency: usize,
    /// Name of the record identifier field
    pub id_field: String,
    /// Name of the last-modified timestamp field
    pub last_modified_field: String,
    /// Name of the store-injected metadata field stripped before matching
    pub metadata_field: String,
    /// Name of the global identifier field the run repairs
    pub global_id_field: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            scan_concurrency: 50,
            write_concurrency: 5,
            id_field: "Id".to_string(),
            last_modified_field: "LastModifiedDate".to_string(),
            metadata_field: "attributes".to_string(),
            global_id_field: "GlobalKey__c".to_string(),
        }
    }
}

impl DedupConfig {
    /// Configuration for tests: same field conventions, small pools
    pub fn test() -> Self {
        Self {
            scan_concurrency: 4,
            write_concurrency: 2,
            ..Self::default()
        }
    }
}
