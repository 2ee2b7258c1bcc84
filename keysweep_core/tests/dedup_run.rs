//! End-to-end deduplication runs against the mock record store

use keysweep_core::record::Record;
use keysweep_core::repair::Deduplicator;
use keysweep_core::DedupConfig;
use keysweep_test_utils::{MockRecordStore, SequentialIdGenerator};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Three Widget__c records: two sharing a global key, one with none
fn seed_widgets(store: &MockRecordStore) {
    store.expect_matching_keys("Widget__c", &["GlobalKey__c"]);
    store.expect_records(
        "Widget__c",
        vec![
            record(&[
                ("Id", json!("001")),
                ("LastModifiedDate", json!("2024-01-01T00:00:00Z")),
                ("GlobalKey__c", json!("g-dup")),
            ]),
            record(&[
                ("Id", json!("002")),
                ("LastModifiedDate", json!("2024-02-01T00:00:00Z")),
                ("GlobalKey__c", json!("g-dup")),
            ]),
            record(&[
                ("Id", json!("003")),
                ("LastModifiedDate", json!("2024-03-01T00:00:00Z")),
                ("GlobalKey__c", json!(null)),
            ]),
        ],
    );
}

#[tokio::test]
async fn test_run_repairs_duplicates_and_missing_keys() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.repaired, 2);

    // the earlier of the colliding pair and the keyless record were
    // rewritten; the later duplicate kept its key
    let stored = store.stored("Widget__c");
    let key = |id: &str| {
        stored
            .iter()
            .find(|r| r.id("Id") == Some(id))
            .and_then(|r| r.get("GlobalKey__c"))
            .cloned()
            .unwrap()
    };
    assert_ne!(key("001"), json!("g-dup"));
    assert_eq!(key("002"), json!("g-dup"));
    assert!(key("003").as_str().is_some_and(|k| k.starts_with("generated-")));

    // one audit line for the duplicate pair, one for the missing key, one
    // per repair performed
    assert_eq!(report.audit.len(), 4);
    assert!(report.audit.iter().any(|l| l.contains("001") && l.contains("002")));
    assert!(report.audit.iter().any(|l| l.contains("Missing global identifier")));
}

#[tokio::test]
async fn test_reserved_and_stale_objects_are_never_scanned() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    // reserved type: defined, present, still skipped
    store.expect_matching_keys("Account", &["GlobalKey__c"]);
    store.expect_valid_object("Account");
    // custom type defined but absent from the schema
    store.expect_matching_keys("Retired__c", &["GlobalKey__c"]);
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    assert!(report.is_clean());
    let scanned: Vec<String> = store.reads().into_iter().map(|q| q.object_type).collect();
    assert_eq!(scanned, vec!["Widget__c".to_string()]);
}

#[tokio::test]
async fn test_multi_field_candidates_halt_their_object_type_only() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    // two-field matching key, so its candidates are not pure anomalies
    store.expect_matching_keys("Gadget__c", &["Name", "Code__c"]);
    store.expect_records(
        "Gadget__c",
        vec![
            record(&[
                ("Id", json!("101")),
                ("LastModifiedDate", json!("2024-01-01T00:00:00Z")),
                ("Name", json!("gizmo")),
                ("Code__c", json!("G-1")),
            ]),
            record(&[
                ("Id", json!("102")),
                ("LastModifiedDate", json!("2024-02-01T00:00:00Z")),
                ("Name", json!("gizmo")),
                ("Code__c", json!("G-1")),
            ]),
        ],
    );
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    // Widget__c repairs went through despite the Gadget__c halt
    assert_eq!(report.repaired, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Gadget__c"));
    assert!(report.errors[0].contains("101"));

    // no Gadget__c update was attempted
    assert!(store.updates().iter().all(|(t, _)| t == "Widget__c"));
}

#[tokio::test]
async fn test_write_failures_are_collected_without_aborting_the_run() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    store.expect_write_failure("Widget__c");
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    // every update was attempted even though each one failed
    assert_eq!(store.updates().len(), 2);
    assert_eq!(report.repaired, 0);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().all(|e| e.contains("Widget__c")));
}

#[tokio::test]
async fn test_rejected_update_counts_against_repaired() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    store.expect_rejection("001");
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    assert_eq!(report.repaired, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("001"));
    assert!(report.errors[0].contains("simulated rejection"));
}

#[tokio::test]
async fn test_scan_failure_skips_the_repair_phase() {
    let store = MockRecordStore::new();
    seed_widgets(&store);
    store.expect_read_failure("Widget__c");
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    assert_eq!(report.repaired, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Widget__c"));
    assert!(store.updates().is_empty(), "repair phase must not run");
}

#[tokio::test]
async fn test_scan_queries_overlap_up_to_the_concurrency_bound() {
    let store = MockRecordStore::new();
    for object_type in ["Alpha__c", "Beta__c", "Gamma__c", "Delta__c"] {
        store.expect_matching_keys(object_type, &["GlobalKey__c"]);
        store.expect_records(
            object_type,
            vec![record(&[
                ("Id", json!("001")),
                ("LastModifiedDate", json!("2024-01-01T00:00:00Z")),
                ("GlobalKey__c", json!(format!("{object_type}-key"))),
            ])],
        );
    }
    store.with_read_delay(Duration::from_millis(100));
    let ids = SequentialIdGenerator::new();

    let started = Instant::now();
    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    // four delayed reads fit inside the scan ceiling of four, so they
    // overlap instead of queueing one behind another
    assert!(
        started.elapsed() < Duration::from_millis(350),
        "scans ran sequentially: {:?}",
        started.elapsed()
    );
    assert!(report.is_clean());
    assert_eq!(store.reads().len(), 4);
}

#[tokio::test]
async fn test_run_with_nothing_to_repair_is_clean() {
    let store = MockRecordStore::new();
    store.expect_matching_keys("Widget__c", &["GlobalKey__c"]);
    store.expect_records(
        "Widget__c",
        vec![
            record(&[
                ("Id", json!("001")),
                ("LastModifiedDate", json!("2024-01-01T00:00:00Z")),
                ("GlobalKey__c", json!("g-1")),
            ]),
            record(&[
                ("Id", json!("002")),
                ("LastModifiedDate", json!("2024-02-01T00:00:00Z")),
                ("GlobalKey__c", json!("g-2")),
            ]),
        ],
    );
    let ids = SequentialIdGenerator::new();

    let dedup = Deduplicator::new(&store, &ids, DedupConfig::test());
    let report = dedup.run().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.repaired, 0);
    assert!(report.audit.is_empty());
    assert!(store.updates().is_empty());
}
