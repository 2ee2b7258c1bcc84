//! Mock record store for testing the scan and repair pipeline

use keysweep_core::error::{RemoteError, Result};
use keysweep_core::record::{Query, Record};
use keysweep_core::store::{IdGenerator, MatchingKeys, RecordStore, UpdateOutcome};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock implementation of [`RecordStore`] for testing
///
/// The mock holds records per object type, serves read queries by
/// projecting them onto the requested fields, and applies updates back to
/// its stored records. Failure injection is per object type for whole-call
/// failures and per record id for rejected updates.
///
/// # Examples
///
/// ```rust,no_run
/// use keysweep_test_utils::MockRecordStore;
/// use keysweep_core::record::Query;
/// use keysweep_core::store::RecordStore;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockRecordStore::new();
/// store.expect_records(
///     "Widget__c",
///     vec![[("Id".to_string(), json!("001"))].into_iter().collect()],
/// );
///
/// let query = Query::select("Widget__c", vec!["Id".to_string()]);
/// let records = store.read(&query).await?;
/// assert_eq!(records.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockRecordStore {
    behavior: Arc<Mutex<MockBehavior>>,
    calls: Arc<Mutex<RecordedCalls>>,
}

/// Configuration for mock behavior
#[derive(Debug, Default)]
struct MockBehavior {
    records: HashMap<String, Vec<Record>>,
    matching_keys: MatchingKeys,
    valid_objects: HashSet<String>,
    read_failures: HashSet<String>,
    write_failures: HashSet<String>,
    rejected_ids: HashSet<String>,
    read_delay: Duration,
}

/// Every call the mock has served, in order
#[derive(Debug, Default)]
struct RecordedCalls {
    reads: Vec<Query>,
    updates: Vec<(String, Vec<Record>)>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self {
            behavior: Arc::new(Mutex::new(MockBehavior::default())),
            calls: Arc::new(Mutex::new(RecordedCalls::default())),
        }
    }

    fn behavior(&self) -> std::sync::MutexGuard<'_, MockBehavior> {
        self.behavior.lock().expect("mock behavior lock poisoned")
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, RecordedCalls> {
        self.calls.lock().expect("mock calls lock poisoned")
    }

    /// Store `records` under `object_type` and mark the type as a valid
    /// schema object
    pub fn expect_records(&self, object_type: &str, records: Vec<Record>) {
        let mut behavior = self.behavior();
        behavior.records.insert(object_type.to_string(), records);
        behavior.valid_objects.insert(object_type.to_string());
    }

    /// Configure the matching-key definitions the store reports
    pub fn expect_matching_keys(&self, object_type: &str, fields: &[&str]) {
        self.behavior().matching_keys.insert(
            object_type.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
    }

    /// Add an object type to the reported schema without storing records
    pub fn expect_valid_object(&self, object_type: &str) {
        self.behavior().valid_objects.insert(object_type.to_string());
    }

    /// Make every read of `object_type` fail
    pub fn expect_read_failure(&self, object_type: &str) {
        self.behavior().read_failures.insert(object_type.to_string());
    }

    /// Make every update call for `object_type` fail outright
    pub fn expect_write_failure(&self, object_type: &str) {
        self.behavior().write_failures.insert(object_type.to_string());
    }

    /// Make updates of the record with `id` come back rejected
    pub fn expect_rejection(&self, id: &str) {
        self.behavior().rejected_ids.insert(id.to_string());
    }

    /// Delay every read, for exercising the concurrency bound
    pub fn with_read_delay(&self, delay: Duration) {
        self.behavior().read_delay = delay;
    }

    /// Queries served so far, in call order
    pub fn reads(&self) -> Vec<Query> {
        self.calls().reads.clone()
    }

    /// Update calls served so far, in call order
    pub fn updates(&self) -> Vec<(String, Vec<Record>)> {
        self.calls().updates.clone()
    }

    /// Current stored records for `object_type`, after any applied updates
    pub fn stored(&self, object_type: &str) -> Vec<Record> {
        self.behavior()
            .records
            .get(object_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Project one stored record onto the queried fields, injecting the
    /// store metadata field the way a real backend does
    fn project(object_type: &str, stored: &Record, fields: &[String]) -> Record {
        let mut projected = Record::new();
        projected.set("attributes", json!({ "type": object_type }));
        for field in fields {
            let value = stored.get(field).cloned().unwrap_or(Value::Null);
            projected.set(field, value);
        }
        projected
    }
}

impl Default for MockRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn read(&self, query: &Query) -> Result<Vec<Record>> {
        self.calls().reads.push(query.clone());

        let (delay, result) = {
            let behavior = self.behavior();
            if behavior.read_failures.contains(&query.object_type) {
                (
                    behavior.read_delay,
                    Err(RemoteError::query(&query.object_type, "simulated read failure").into()),
                )
            } else {
                let records = behavior
                    .records
                    .get(&query.object_type)
                    .map(|stored| {
                        stored
                            .iter()
                            .map(|r| Self::project(&query.object_type, r, &query.fields))
                            .collect()
                    })
                    .unwrap_or_default();
                (behavior.read_delay, Ok(records))
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn update(&self, object_type: &str, records: Vec<Record>) -> Result<Vec<UpdateOutcome>> {
        self.calls()
            .updates
            .push((object_type.to_string(), records.clone()));

        let mut behavior = self.behavior();
        if behavior.write_failures.contains(object_type) {
            return Err(RemoteError::write(object_type, "simulated write failure").into());
        }

        let rejected_ids = behavior.rejected_ids.clone();
        let stored = behavior.records.entry(object_type.to_string()).or_default();

        let mut outcomes = Vec::with_capacity(records.len());
        for incoming in records {
            let id = incoming.id("Id").unwrap_or("unknown").to_string();
            if rejected_ids.contains(&id) {
                outcomes.push(UpdateOutcome::rejected(
                    &id,
                    vec!["simulated rejection".to_string()],
                ));
                continue;
            }

            if let Some(target) = stored.iter_mut().find(|r| r.id("Id") == Some(id.as_str())) {
                for (field, value) in &incoming.fields {
                    if field != "Id" {
                        target.set(field, value.clone());
                    }
                }
            }
            outcomes.push(UpdateOutcome::accepted(&id));
        }

        Ok(outcomes)
    }

    async fn matching_key_definitions(&self) -> Result<MatchingKeys> {
        Ok(self.behavior().matching_keys.clone())
    }

    async fn valid_schema_objects(&self) -> Result<HashSet<String>> {
        Ok(self.behavior().valid_objects.clone())
    }
}

/// Deterministic [`IdGenerator`] producing `generated-0000`, `generated-0001`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU32,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many identifiers have been handed out
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::SeqCst)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("generated-{n:04}")
    }
}
