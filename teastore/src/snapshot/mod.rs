// Snapshots - serialize the whole store to JSON and back, counters included

use crate::document::{self, Document, ID_FIELD};
use crate::error::{Result, StoreError};
use crate::store::{CollectionState, MemoryStore};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionSnapshot>,
}

/// One collection: its identifier counter and documents (with `_id`) in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub counter: u64,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl CollectionSnapshot {
    fn into_state(self, name: &str) -> Result<CollectionState> {
        let mut documents = IndexMap::with_capacity(self.documents.len());
        for mut doc in self.documents {
            let id = match doc.remove(ID_FIELD) {
                Some(Value::String(id)) => id,
                other => {
                    return Err(StoreError::Snapshot(format!(
                        "document in '{name}' has no string _id (found {other:?})"
                    )))
                }
            };
            if documents.insert(id.clone(), doc).is_some() {
                return Err(StoreError::Snapshot(format!(
                    "duplicate _id '{id}' in '{name}'"
                )));
            }
        }

        // Never hand out an identifier that is already taken
        let highest = documents
            .keys()
            .filter_map(|id| id.strip_prefix(name)?.strip_prefix('_')?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Ok(CollectionState {
            counter: self.counter.max(highest),
            documents,
        })
    }
}

impl MemoryStore {
    /// Capture every collection as it is right now.
    pub fn snapshot(&self) -> Snapshot {
        let mut collections = BTreeMap::new();
        self.for_each_collection(|name, state| {
            collections.insert(
                name.to_string(),
                CollectionSnapshot {
                    counter: state.counter,
                    documents: state
                        .documents
                        .iter()
                        .map(|(id, doc)| document::with_id(id, doc))
                        .collect(),
                },
            );
        });
        Snapshot {
            exported_at: Utc::now(),
            collections,
        }
    }

    /// Load a snapshot into this store, replacing any collection it names.
    /// Counters are kept so identifiers issued before the snapshot are never
    /// reissued.
    pub fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let mut states = Vec::with_capacity(snapshot.collections.len());
        for (name, collection) in snapshot.collections {
            let state = collection.into_state(&name)?;
            states.push((name, state));
        }
        for (name, state) in states {
            log::debug!("Restoring '{name}' with {} documents", state.documents.len());
            self.replace_collection(&name, state);
        }
        Ok(())
    }

    /// Build a store from a snapshot file.
    pub fn open_snapshot(path: &Path) -> Result<Self> {
        let store = MemoryStore::new();
        store.restore(Snapshot::read_from(path)?)?;
        Ok(store)
    }
}
