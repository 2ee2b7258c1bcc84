//! Duplicate detection over one object type's records
//!
//! Runs as a pool task per planner query. Each record is reduced to a
//! deterministic signature over its non-volatile fields; records whose
//! signature was already seen in the same scan, and records missing their
//! global identifier, are scheduled for repair.

use crate::DedupConfig;
use crate::error::Result;
use crate::record::{Query, Record, display_value};
use crate::store::{AuditSink, IdGenerator, RecordStore};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Candidate records awaiting repair for one object type, keyed by the
/// colliding signature or by a generated key for null-identifier anomalies
pub type ObjectDuplicates = IndexMap<String, Record>;

/// Candidates across all object types. Outer keys are pre-partitioned by
/// object type: scanners for distinct object types never touch the same
/// outer entry, so merging scan outputs needs no per-record coordination.
pub type DuplicatesMap = IndexMap<String, ObjectDuplicates>;

/// First record observed under a signature, with the largest
/// last-modification timestamp seen for that signature so far
struct SeenEntry {
    record: Record,
    last_modified: Option<String>,
}

/// Scans one query's result rows for anomalies requiring repair
pub struct DuplicateScanner<'a> {
    store: &'a dyn RecordStore,
    ids: &'a dyn IdGenerator,
    audit: &'a dyn AuditSink,
    config: &'a DedupConfig,
}

impl<'a> DuplicateScanner<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        ids: &'a dyn IdGenerator,
        audit: &'a dyn AuditSink,
        config: &'a DedupConfig,
    ) -> Self {
        Self {
            store,
            ids,
            audit,
            config,
        }
    }

    /// Execute `query` and collate its rows into repair candidates
    pub async fn scan(&self, query: &Query) -> Result<ObjectDuplicates> {
        let records = self.store.read(query).await?;
        log::debug!(
            "scanning {} {} record(s) for duplicates",
            records.len(),
            query.object_type
        );
        let (duplicates, _) = self.collate(&query.object_type, records);
        Ok(duplicates)
    }

    /// Deterministic signature over the record's non-volatile fields, in
    /// field declaration order. The identifier never contributes.
    fn signature(&self, record: &Record) -> String {
        let mut out = String::new();
        for (name, value) in &record.fields {
            if name == &self.config.id_field {
                continue;
            }
            out.push_str(&format!("Field: {name} Value: {} ", display_value(value)));
        }
        out
    }

    /// Fold result rows into repair candidates.
    ///
    /// Timestamps and transport metadata are stripped before the signature
    /// is computed. A null global identifier is always an anomaly and gets a
    /// freshly generated slot key, so it cannot collide with a genuine
    /// signature. On a signature collision the record *first* seen under
    /// that signature is scheduled; its stored timestamp becomes the max of
    /// the two so later comparisons stay monotonic.
    fn collate(
        &self,
        object_type: &str,
        records: Vec<Record>,
    ) -> (ObjectDuplicates, HashMap<String, SeenEntry>) {
        let mut duplicates = ObjectDuplicates::new();
        let mut seen: HashMap<String, SeenEntry> = HashMap::new();

        for mut record in records {
            let last_modified = record
                .remove(&self.config.last_modified_field)
                .and_then(|v| v.as_str().map(str::to_string));
            record.remove(&self.config.metadata_field);

            if record.get(&self.config.global_id_field) == Some(&Value::Null) {
                let fresh = self.ids.generate();
                let record_id = record
                    .id(&self.config.id_field)
                    .unwrap_or("unknown")
                    .to_string();
                record.set(&self.config.global_id_field, Value::String(fresh.clone()));
                self.audit.record(format!(
                    "Missing global identifier: {object_type} record {record_id} scheduled for repair"
                ));
                duplicates.insert(fresh, record.clone());
            }

            let signature = self.signature(&record);

            match seen.entry(signature) {
                Entry::Occupied(mut entry) => {
                    let signature = entry.key().clone();
                    let prior = entry.get_mut();
                    if last_modified > prior.last_modified {
                        prior.last_modified = last_modified;
                    }

                    let earlier_id = prior
                        .record
                        .id(&self.config.id_field)
                        .unwrap_or("unknown")
                        .to_string();
                    let newer_id = record
                        .id(&self.config.id_field)
                        .unwrap_or("unknown")
                        .to_string();
                    self.audit.record(format!(
                        "Duplicate found: {object_type} records {earlier_id},{newer_id} matching info {signature}"
                    ));
                    // the earlier record's identity is now ambiguous; it is
                    // the one scheduled for repair
                    duplicates.insert(signature, prior.record.clone());
                }
                Entry::Vacant(entry) => {
                    entry.insert(SeenEntry {
                        record,
                        last_modified,
                    });
                }
            }
        }

        (duplicates, seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AuditLog;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Deterministic id source for tests
    struct SeqIds(AtomicU32);

    impl SeqIds {
        fn new() -> Self {
            Self(AtomicU32::new(0))
        }
    }

    impl IdGenerator for SeqIds {
        fn generate(&self) -> String {
            format!("key-{:04}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    /// Store stub; collate tests never reach the read path
    struct NoStore;

    #[async_trait::async_trait]
    impl RecordStore for NoStore {
        async fn read(&self, _query: &Query) -> Result<Vec<Record>> {
            unreachable!("collate tests do not read")
        }
        async fn update(
            &self,
            _object_type: &str,
            _records: Vec<Record>,
        ) -> Result<Vec<crate::store::UpdateOutcome>> {
            unreachable!()
        }
        async fn matching_key_definitions(&self) -> Result<crate::store::MatchingKeys> {
            unreachable!()
        }
        async fn valid_schema_objects(&self) -> Result<std::collections::HashSet<String>> {
            unreachable!()
        }
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn widget(id: &str, modified: &str, name: &str, global_key: Value) -> Record {
        record(&[
            ("Id", json!(id)),
            ("LastModifiedDate", json!(modified)),
            ("attributes", json!({ "type": "Widget__c" })),
            ("Name", json!(name)),
            ("GlobalKey__c", global_key),
        ])
    }

    struct Fixture {
        config: DedupConfig,
        ids: SeqIds,
        audit: AuditLog,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: DedupConfig::test(),
                ids: SeqIds::new(),
                audit: AuditLog::new(),
            }
        }

        fn scanner(&self) -> DuplicateScanner<'_> {
            DuplicateScanner::new(&NoStore, &self.ids, &self.audit, &self.config)
        }
    }

    #[test]
    fn test_distinct_records_produce_no_candidates() {
        let fx = Fixture::new();
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            widget("002", "2024-01-02T00:00:00Z", "beta", json!("g-2")),
        ];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);
        assert!(duplicates.is_empty());
        assert!(fx.audit.entries().is_empty());
    }

    #[test]
    fn test_rescan_of_unchanged_rows_stays_empty() {
        let fx = Fixture::new();
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            widget("002", "2024-01-02T00:00:00Z", "beta", json!("g-2")),
        ];

        let (first, _) = fx.scanner().collate("Widget__c", rows.clone());
        let (second, _) = fx.scanner().collate("Widget__c", rows);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn test_collision_schedules_earlier_record() {
        let fx = Fixture::new();
        // identical except identifier and timestamp
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            widget("002", "2024-01-05T00:00:00Z", "alpha", json!("g-1")),
        ];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);

        assert_eq!(duplicates.len(), 1);
        let (_, candidate) = duplicates.first().unwrap();
        assert_eq!(candidate.id("Id"), Some("001"));

        let audit = fx.audit.entries();
        assert_eq!(audit.len(), 1);
        assert!(audit[0].contains("001,002"));
        assert!(audit[0].contains("Duplicate found"));
    }

    #[test]
    fn test_collision_stores_max_timestamp() {
        let fx = Fixture::new();
        let rows = vec![
            widget("001", "2024-01-03T00:00:00Z", "alpha", json!("g-1")),
            widget("002", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            widget("003", "2024-01-09T00:00:00Z", "alpha", json!("g-1")),
        ];

        let (_, seen) = fx.scanner().collate("Widget__c", rows);

        let entry = seen.values().next().unwrap();
        assert_eq!(
            entry.last_modified.as_deref(),
            Some("2024-01-09T00:00:00Z")
        );
        // the first-seen record stays the scheduled one
        assert_eq!(entry.record.id("Id"), Some("001"));
    }

    #[test]
    fn test_null_global_identifier_is_always_an_anomaly() {
        let fx = Fixture::new();
        // no signature twin; null identifier alone triggers repair
        let rows = vec![widget("001", "2024-01-01T00:00:00Z", "alpha", json!(null))];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);

        assert_eq!(duplicates.len(), 1);
        let (slot, candidate) = duplicates.first().unwrap();
        assert_eq!(slot, "key-0000");
        assert_eq!(
            candidate.get("GlobalKey__c"),
            Some(&json!("key-0000"))
        );

        let audit = fx.audit.entries();
        assert_eq!(audit.len(), 1);
        assert!(audit[0].contains("Missing global identifier"));
        assert!(audit[0].contains("001"));
    }

    #[test]
    fn test_generated_slot_never_collides_with_signatures() {
        let fx = Fixture::new();
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!(null)),
            widget("002", "2024-01-02T00:00:00Z", "alpha", json!("g-1")),
            widget("003", "2024-01-03T00:00:00Z", "alpha", json!("g-1")),
        ];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);

        // one null-identifier anomaly plus one collision slot
        assert_eq!(duplicates.len(), 2);
        assert!(duplicates.contains_key("key-0000"));
    }

    #[test]
    fn test_timestamp_and_metadata_do_not_affect_identity() {
        let fx = Fixture::new();
        let mut second = widget("002", "2099-12-31T23:59:59Z", "alpha", json!("g-1"));
        second.set("attributes", json!({ "type": "Widget__c", "url": "/x" }));
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            second,
        ];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);
        assert_eq!(duplicates.len(), 1);
    }

    #[test]
    fn test_signature_excludes_identifier_and_keeps_field_order() {
        let fx = Fixture::new();
        let scanner = fx.scanner();
        let rec = record(&[
            ("Id", json!("001")),
            ("Name", json!("alpha")),
            ("Code__c", json!(7)),
        ]);

        assert_eq!(
            scanner.signature(&rec),
            "Field: Name Value: alpha Field: Code__c Value: 7 "
        );
    }

    #[test]
    fn test_candidate_retains_remaining_fields() {
        let fx = Fixture::new();
        let rows = vec![
            widget("001", "2024-01-01T00:00:00Z", "alpha", json!("g-1")),
            widget("002", "2024-01-02T00:00:00Z", "alpha", json!("g-1")),
        ];

        let (duplicates, _) = fx.scanner().collate("Widget__c", rows);
        let (_, candidate) = duplicates.first().unwrap();

        let names: Vec<&str> = candidate.field_names().collect();
        assert_eq!(names, vec!["Id", "Name", "GlobalKey__c"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Signature computation is deterministic for a fixed field order
            #[test]
            fn signature_is_deterministic(
                pairs in proptest::collection::vec(("[A-Za-z]{1,8}", "[a-z0-9 ]{0,8}"), 1..8)
            ) {
                let fx = Fixture::new();
                let scanner = fx.scanner();

                let rec: Record = pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect();

                prop_assert_eq!(scanner.signature(&rec), scanner.signature(&rec.clone()));
            }

            /// Records identical on everything but the identifier collide
            #[test]
            fn identifier_never_contributes_to_identity(
                name in "[a-z]{1,12}",
                id_a in "[0-9]{3}",
                id_b in "[0-9]{3}",
            ) {
                let fx = Fixture::new();
                let scanner = fx.scanner();

                let a = record(&[("Id", json!(id_a)), ("Name", json!(name.clone()))]);
                let b = record(&[("Id", json!(id_b)), ("Name", json!(name))]);

                prop_assert_eq!(scanner.signature(&a), scanner.signature(&b));
            }
        }
    }
}
