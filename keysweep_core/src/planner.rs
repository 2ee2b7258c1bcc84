//! Builds one read query per object type eligible for duplicate scanning

use crate::DedupConfig;
use crate::record::Query;
use crate::store::MatchingKeys;
use std::collections::HashSet;

/// Object types the platform owns; never scanned regardless of definitions
pub const PLATFORM_RESERVED_OBJECTS: &[&str] = &[
    "User",
    "Account",
    "PricebookEntry",
    "Attachment",
    "RecordType",
];

/// Store convention: custom extension object types carry a `__c` suffix
pub fn is_custom_extension(object_type: &str) -> bool {
    object_type.ends_with("__c")
}

/// Turns matching-key definitions into the scan phase's read queries
pub struct MatchingKeyPlanner<'a> {
    config: &'a DedupConfig,
}

impl<'a> MatchingKeyPlanner<'a> {
    pub fn new(config: &'a DedupConfig) -> Self {
        Self { config }
    }

    /// Build queries for every eligible object type, in definition order.
    ///
    /// Platform-reserved object types are dropped unconditionally. Custom
    /// extensions referencing schema no longer present in `valid_objects`
    /// are dropped (stale definitions survive schema deletions). Object
    /// types with an empty field list are skipped. Each emitted query
    /// selects the identifier, the last-modification timestamp, and the
    /// matching-key fields.
    pub fn build_queries(
        &self,
        definitions: &MatchingKeys,
        valid_objects: &HashSet<String>,
    ) -> Vec<Query> {
        let mut queries = Vec::new();

        for (object_type, fields) in definitions {
            if PLATFORM_RESERVED_OBJECTS.contains(&object_type.as_str()) {
                log::debug!("skipping platform-reserved object type {object_type}");
                continue;
            }
            if is_custom_extension(object_type) && !valid_objects.contains(object_type) {
                log::debug!("skipping {object_type}: not present in the current schema");
                continue;
            }
            if fields.is_empty() {
                log::debug!("skipping {object_type}: matching-key definition has no fields");
                continue;
            }

            let mut selected = vec![
                self.config.id_field.clone(),
                self.config.last_modified_field.clone(),
            ];
            for field in fields {
                if !selected.contains(field) {
                    selected.push(field.clone());
                }
            }

            queries.push(Query::select(object_type, selected));
        }

        queries
    }
}
