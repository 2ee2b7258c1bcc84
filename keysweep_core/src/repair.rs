//! Repair of scanned anomalies and the top-level deduplication run
//!
//! [`RepairExecutor`] validates scan output, assigns fresh global
//! identifiers, and submits the resulting update tasks through the worker
//! pool at the lower write ceiling. [`Deduplicator`] strings the phases
//! together: plan, scan, repair, report.

use crate::DedupConfig;
use crate::error::{Error, InternalError, RemoteError, Result, ValidationError};
use crate::planner::MatchingKeyPlanner;
use crate::pool::{ExecutionStatus, Task, TaskQueue, TaskRunner, WorkerPool};
use crate::record::Record;
use crate::scanner::{DuplicateScanner, DuplicatesMap, ObjectDuplicates};
use crate::store::{AuditLog, AuditSink, IdGenerator, RecordStore};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

/// Outcome of a full deduplication run
#[derive(Debug, Clone, Serialize)]
pub struct DeduplicationReport {
    /// Number of records successfully repaired
    pub repaired: usize,
    /// Every error encountered, rendered; empty on a clean run
    pub errors: Vec<String>,
    /// Human-readable audit trail of every change made
    pub audit: Vec<String>,
}

impl DeduplicationReport {
    /// True when the run finished without a single error
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates repair candidates and drives the write phase
pub struct RepairExecutor<'a> {
    store: &'a dyn RecordStore,
    ids: &'a dyn IdGenerator,
    config: &'a DedupConfig,
}

/// What the repair phase produced: successful update count plus the
/// validation and write errors collected along the way
pub struct RepairOutcome {
    pub repaired: usize,
    pub errors: Vec<Error>,
}

impl<'a> RepairExecutor<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        ids: &'a dyn IdGenerator,
        config: &'a DedupConfig,
    ) -> Self {
        Self { store, ids, config }
    }

    /// A candidate is repair-eligible only when it carries exactly the
    /// identifier plus the global-identifier field. Anything else means the
    /// scanner's output was not a pure anomaly and an automatic fix would
    /// be ambiguous.
    fn is_pure_anomaly(&self, record: &Record) -> bool {
        record.len() == 2
            && record.get(&self.config.id_field).is_some()
            && record.get(&self.config.global_id_field).is_some()
    }

    /// Validate candidates and build the update batch for one object type.
    ///
    /// A shape violation halts the remainder of that object type's batch
    /// (fail closed rather than apply an ambiguous partial fix); candidates
    /// already accepted stay in the batch and other object types are
    /// unaffected.
    fn build_batch(
        &self,
        object_type: &str,
        candidates: ObjectDuplicates,
        audit: &dyn AuditSink,
        errors: &mut Vec<Error>,
    ) -> Vec<Task> {
        let mut batch = Vec::new();

        for (_slot, mut record) in candidates {
            if !self.is_pure_anomaly(&record) {
                let record_id = record
                    .id(&self.config.id_field)
                    .unwrap_or("unknown")
                    .to_string();
                let found: Vec<&str> = record.field_names().collect();
                let error = ValidationError::unexpected_candidate_shape(
                    object_type,
                    &record_id,
                    &[self.config.id_field.as_str(), self.config.global_id_field.as_str()],
                    &found,
                );
                log::warn!("halting {object_type} repairs: {error}");
                errors.push(error.into());
                break;
            }

            let fresh = self.ids.generate();
            let record_id = record
                .id(&self.config.id_field)
                .unwrap_or("unknown")
                .to_string();
            record.set(&self.config.global_id_field, Value::String(fresh.clone()));

            audit.record(format!(
                "Global identifier repaired: {object_type} record {record_id} new value {fresh}"
            ));
            batch.push(Task::Update {
                object_type: object_type.to_string(),
                record,
            });
        }

        batch
    }

    /// Validate every object type's candidates and run the resulting update
    /// tasks through the pool at the write ceiling.
    pub async fn repair(&self, duplicates: DuplicatesMap, audit: &dyn AuditSink) -> RepairOutcome {
        let mut errors = Vec::new();
        let mut tasks = Vec::new();

        for (object_type, candidates) in duplicates {
            tasks.extend(self.build_batch(&object_type, candidates, audit, &mut errors));
        }

        let total = tasks.len();
        if total == 0 {
            return RepairOutcome { repaired: 0, errors };
        }

        log::info!(
            "submitting {total} update(s) at write concurrency {}",
            self.config.write_concurrency
        );
        let queue = TaskQueue::from_tasks(tasks);
        let runner = UpdateRunner {
            store: self.store,
            config: self.config,
        };

        match WorkerPool::run_bounded(&runner, &queue, self.config.write_concurrency).await {
            Ok(()) => RepairOutcome {
                repaired: total,
                errors,
            },
            Err(Error::Aggregate(aggregate)) => {
                // one error per failed update; the rest went through
                let failed = aggregate.errors.len();
                errors.extend(aggregate.errors);
                RepairOutcome {
                    repaired: total.saturating_sub(failed),
                    errors,
                }
            }
            Err(other) => {
                errors.push(other);
                RepairOutcome {
                    repaired: 0,
                    errors,
                }
            }
        }
    }
}

/// Write-phase task runner: best effort, one record per task.
///
/// A failed update is recorded on the status without cancelling, so sibling
/// updates keep flowing; the pool still surfaces every recorded error in
/// its final aggregate.
struct UpdateRunner<'a> {
    store: &'a dyn RecordStore,
    config: &'a DedupConfig,
}

#[async_trait]
impl TaskRunner for UpdateRunner<'_> {
    async fn run(&self, task: Task, status: &ExecutionStatus) -> Result<()> {
        let Task::Update {
            object_type,
            record,
        } = task
        else {
            return Err(
                InternalError::assertion("scan task dispatched during the write phase").into(),
            );
        };

        let record_id = record
            .id(&self.config.id_field)
            .unwrap_or("unknown")
            .to_string();

        match self.store.update(&object_type, vec![record]).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.success) {
                    let message = format!(
                        "record {record_id} rejected: {}",
                        outcome.errors.join("; ")
                    );
                    log::error!("update rejected for {object_type}: {message}");
                    status.record_error(RemoteError::write(&object_type, message).into());
                }
                Ok(())
            }
            Err(e) => {
                log::error!("update failed for {object_type} record {record_id}: {e}");
                status.record_error(e);
                Ok(())
            }
        }
    }
}

/// Scan-phase task runner: one scanner run per query, merging whole
/// object-type entries into the shared map. Outer keys are partitioned by
/// object type, so concurrent scans never write the same entry.
struct ScanRunner<'a> {
    store: &'a dyn RecordStore,
    ids: &'a dyn IdGenerator,
    audit: &'a dyn AuditSink,
    config: &'a DedupConfig,
    duplicates: &'a Mutex<DuplicatesMap>,
}

#[async_trait]
impl TaskRunner for ScanRunner<'_> {
    async fn run(&self, task: Task, _status: &ExecutionStatus) -> Result<()> {
        let Task::Scan(query) = task else {
            return Err(
                InternalError::assertion("update task dispatched during the scan phase").into(),
            );
        };

        let scanner = DuplicateScanner::new(self.store, self.ids, self.audit, self.config);
        let found = scanner.scan(&query).await?;

        if !found.is_empty() {
            self.duplicates
                .lock()
                .expect("duplicates map lock poisoned")
                .insert(query.object_type.clone(), found);
        }
        Ok(())
    }
}

/// Full duplicate detection-and-repair pass against one store
pub struct Deduplicator<'a> {
    store: &'a dyn RecordStore,
    ids: &'a dyn IdGenerator,
    config: DedupConfig,
}

impl<'a> Deduplicator<'a> {
    pub fn new(store: &'a dyn RecordStore, ids: &'a dyn IdGenerator, config: DedupConfig) -> Self {
        Self { store, ids, config }
    }

    /// Plan queries, scan every eligible object type through the pool at
    /// the scan ceiling, then repair what the scans found at the write
    /// ceiling.
    ///
    /// The run never reports a silently partial success: it returns a full
    /// audit of every change made, together with every error encountered.
    /// A scan-phase failure cancels sibling scans and skips the repair
    /// phase entirely; the anomaly map may be incomplete at that point and
    /// repairing from it would blur what the run actually covered.
    pub async fn run(&self) -> Result<DeduplicationReport> {
        let definitions = self.store.matching_key_definitions().await?;
        let valid_objects = self.store.valid_schema_objects().await?;

        let planner = MatchingKeyPlanner::new(&self.config);
        let queries = planner.build_queries(&definitions, &valid_objects);
        log::info!("planned {} scan quer(ies)", queries.len());

        let audit = AuditLog::new();
        let duplicates = Mutex::new(DuplicatesMap::new());
        let mut errors: Vec<String> = Vec::new();

        let queue = TaskQueue::from_tasks(queries.into_iter().map(Task::Scan).collect());
        let scan_runner = ScanRunner {
            store: self.store,
            ids: self.ids,
            audit: &audit,
            config: &self.config,
            duplicates: &duplicates,
        };

        if let Err(e) =
            WorkerPool::run_bounded(&scan_runner, &queue, self.config.scan_concurrency).await
        {
            match e {
                Error::Aggregate(aggregate) => errors.extend(aggregate.messages()),
                other => errors.push(other.to_string()),
            }
            log::error!("scan phase failed; skipping repair");
            return Ok(DeduplicationReport {
                repaired: 0,
                errors,
                audit: audit.entries(),
            });
        }

        let duplicates = duplicates
            .into_inner()
            .expect("duplicates map lock poisoned");
        let candidate_count: usize = duplicates.values().map(ObjectDuplicates::len).sum();
        log::info!("scan phase complete: {candidate_count} candidate(s) to repair");

        let executor = RepairExecutor::new(self.store, self.ids, &self.config);
        let outcome = executor.repair(duplicates, &audit).await;
        errors.extend(outcome.errors.iter().map(Error::to_string));

        Ok(DeduplicationReport {
            repaired: outcome.repaired,
            errors,
            audit: audit.entries(),
        })
    }
}
