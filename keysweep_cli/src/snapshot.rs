//! Record store backed by a directory of JSON export files
//!
//! A snapshot directory holds `matching_keys.json` (object type to its
//! matching fields), `schema.json` (object types present in the source
//! schema), and one `<ObjectType>.json` array per exported object type.
//! Updates are applied in memory and written back with [`SnapshotStore::persist`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use keysweep_core::error::RemoteError;
use keysweep_core::record::{Query, Record};
use keysweep_core::store::{MatchingKeys, RecordStore, UpdateOutcome};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const MATCHING_KEYS_FILE: &str = "matching_keys.json";
const SCHEMA_FILE: &str = "schema.json";

pub struct SnapshotStore {
    root: PathBuf,
    id_field: String,
    matching_keys: MatchingKeys,
    schema: HashSet<String>,
    state: Mutex<SnapshotState>,
}

#[derive(Debug, Default)]
struct SnapshotState {
    records: IndexMap<String, Vec<Record>>,
    dirty: HashSet<String>,
}

impl SnapshotStore {
    /// Load a snapshot directory, reading the record file of every object
    /// type the schema lists
    pub fn open(root: &Path, id_field: &str) -> Result<Self> {
        let matching_keys: MatchingKeys = read_json(&root.join(MATCHING_KEYS_FILE))
            .context("Failed to read matching key definitions")?;
        let schema: Vec<String> =
            read_json(&root.join(SCHEMA_FILE)).context("Failed to read schema object list")?;

        let mut records = IndexMap::new();
        for object_type in &schema {
            let path = root.join(format!("{object_type}.json"));
            if path.exists() {
                let loaded: Vec<Record> = read_json(&path)
                    .with_context(|| format!("Failed to read records for {object_type}"))?;
                for record in &loaded {
                    if record.id(id_field).is_none() {
                        anyhow::bail!(
                            "Record without a string {id_field} in {}",
                            path.display()
                        );
                    }
                }
                records.insert(object_type.clone(), loaded);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            id_field: id_field.to_string(),
            matching_keys,
            schema: schema.into_iter().collect(),
            state: Mutex::new(SnapshotState {
                records,
                dirty: HashSet::new(),
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SnapshotState> {
        self.state.lock().expect("snapshot state lock poisoned")
    }

    /// Write every object type touched by an update back to its file
    pub fn persist(&self) -> Result<usize> {
        let state = self.state();
        for object_type in &state.dirty {
            let path = self.root.join(format!("{object_type}.json"));
            let records = state
                .records
                .get(object_type)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let text = serde_json::to_string_pretty(records)?;
            fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(state.dirty.len())
    }

    /// Object types an update has touched since the snapshot was opened
    pub fn touched(&self) -> usize {
        self.state().dirty.len()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

#[async_trait]
impl RecordStore for SnapshotStore {
    async fn read(&self, query: &Query) -> keysweep_core::Result<Vec<Record>> {
        let state = self.state();
        let Some(stored) = state.records.get(&query.object_type) else {
            return Ok(Vec::new());
        };

        // project each stored record onto the queried fields, null for
        // fields the export never carried
        let projected = stored
            .iter()
            .map(|record| {
                query
                    .fields
                    .iter()
                    .map(|field| {
                        (
                            field.clone(),
                            record.get(field).cloned().unwrap_or(Value::Null),
                        )
                    })
                    .collect()
            })
            .collect();
        Ok(projected)
    }

    async fn update(
        &self,
        object_type: &str,
        records: Vec<Record>,
    ) -> keysweep_core::Result<Vec<UpdateOutcome>> {
        let mut state = self.state();
        let Some(stored) = state.records.get_mut(object_type) else {
            return Err(
                RemoteError::write(object_type, "object type missing from snapshot").into(),
            );
        };

        let mut outcomes = Vec::with_capacity(records.len());
        for incoming in records {
            let Some(id) = incoming.id(&self.id_field).map(str::to_string) else {
                outcomes.push(UpdateOutcome {
                    id: None,
                    success: false,
                    errors: vec!["update carries no record identifier".to_string()],
                });
                continue;
            };

            match stored
                .iter_mut()
                .find(|r| r.id(&self.id_field) == Some(id.as_str()))
            {
                Some(target) => {
                    for (field, value) in &incoming.fields {
                        if field != self.id_field.as_str() {
                            target.set(field, value.clone());
                        }
                    }
                    outcomes.push(UpdateOutcome::accepted(&id));
                }
                None => outcomes.push(UpdateOutcome::rejected(
                    &id,
                    vec![format!("no record {id} in snapshot")],
                )),
            }
        }
        state.dirty.insert(object_type.to_string());

        Ok(outcomes)
    }

    async fn matching_key_definitions(&self) -> keysweep_core::Result<MatchingKeys> {
        Ok(self.matching_keys.clone())
    }

    async fn valid_schema_objects(&self) -> keysweep_core::Result<HashSet<String>> {
        Ok(self.schema.clone())
    }
}
