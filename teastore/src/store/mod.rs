use crate::aggregate::{GroupCount, Pipeline};
use crate::config::StoreConfig;
use crate::document::{self, Document};
use crate::query::options::{FindOptions, IndexSpec, Update};
use crate::query::Filter;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Driver-style acknowledgement, serialized as `{"ok": 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: u8,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { ok: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub inserted_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Per-collection counters reported by `MemoryStore::stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub documents: u64,
    pub counter: u64,
}

/// Documents of one collection, kept in insertion order, plus the counter
/// identifiers are minted from.
#[derive(Debug, Default)]
pub(crate) struct CollectionState {
    pub(crate) counter: u64,
    pub(crate) documents: IndexMap<String, Document>,
}

impl CollectionState {
    fn matching<'a>(
        &'a self,
        filter: &'a Filter,
    ) -> impl Iterator<Item = (&'a String, &'a Document)> + 'a {
        self.documents
            .iter()
            .filter(move |(id, doc)| filter.matches(id, doc))
    }
}

/// In-memory stand-in for a document-database connection.
///
/// Cloning is cheap and every clone sees the same collections. Each
/// collection sits behind its own lock, so a single operation (including
/// the find-then-mutate of `update_one`/`delete_one` and the counter bump
/// of `insert_one`) is atomic with respect to other threads.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Arc<Mutex<CollectionState>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the configured collections already present.
    pub fn with_config(config: &StoreConfig) -> Self {
        let store = Self::new();
        for name in &config.collections {
            store.collection(name);
        }
        store
    }

    /// Get a handle to a collection, creating it on first access.
    pub fn collection(&self, name: &str) -> Collection {
        if let Some(state) = self.collections.read().get(name) {
            return Collection {
                name: name.to_string(),
                state: Arc::clone(state),
            };
        }

        let mut collections = self.collections.write();
        let state = collections.entry(name.to_string()).or_insert_with(|| {
            log::debug!("Creating collection '{name}'");
            Arc::new(Mutex::new(CollectionState::default()))
        });
        Collection {
            name: name.to_string(),
            state: Arc::clone(state),
        }
    }

    /// Names of every collection created so far, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn admin(&self) -> Admin<'_> {
        Admin { _store: self }
    }

    /// Document count and identifier counter for every collection.
    pub fn stats(&self) -> BTreeMap<String, CollectionStats> {
        self.collections
            .read()
            .iter()
            .map(|(name, state)| {
                let state = state.lock();
                (
                    name.clone(),
                    CollectionStats {
                        documents: state.documents.len() as u64,
                        counter: state.counter,
                    },
                )
            })
            .collect()
    }

    /// Replace a collection's contents wholesale. Handles taken earlier see
    /// the new contents. Used by snapshot restore.
    pub(crate) fn replace_collection(&self, name: &str, state: CollectionState) {
        let mut collections = self.collections.write();
        match collections.get(name) {
            Some(existing) => *existing.lock() = state,
            None => {
                collections.insert(name.to_string(), Arc::new(Mutex::new(state)));
            }
        }
    }

    /// Visit every collection's state under its lock. Used by snapshots.
    pub(crate) fn for_each_collection(&self, mut f: impl FnMut(&str, &CollectionState)) {
        let collections = self.collections.read();
        let mut names: Vec<&String> = collections.keys().collect();
        names.sort();
        for name in names {
            f(name, &collections[name].lock());
        }
    }
}

/// Administrative commands.
pub struct Admin<'a> {
    _store: &'a MemoryStore,
}

impl Admin<'_> {
    /// Liveness probe. The in-memory store is always up.
    pub fn ping(&self) -> Ack {
        Ack::ok()
    }
}

/// A handle to one named collection. Handles are cheap to clone and stay
/// valid for the lifetime of the store.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    state: Arc<Mutex<CollectionState>>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First match in insertion order, with `_id` merged in.
    pub fn find_one(&self, filter: &Filter) -> Option<Document> {
        self.state
            .lock()
            .matching(filter)
            .next()
            .map(|(id, doc)| document::with_id(id, doc))
    }

    /// All matches: filtered, then sorted, then paginated.
    pub fn find(&self, filter: &Filter, options: &FindOptions) -> Vec<Document> {
        let mut results: Vec<Document> = self
            .state
            .lock()
            .matching(filter)
            .map(|(id, doc)| document::with_id(id, doc))
            .collect();
        options.sort_results(&mut results);
        options.paginate(results)
    }

    /// Store a shallow copy of `doc` under a fresh identifier.
    pub fn insert_one(&self, doc: Document) -> InsertOneResult {
        let mut state = self.state.lock();
        state.counter += 1;
        let id = format!("{}_{}", self.name, state.counter);
        state.documents.insert(id.clone(), document::without_id(doc));
        InsertOneResult { inserted_id: id }
    }

    /// Merge `update`'s `$set` fields into the first match.
    pub fn update_one(&self, filter: &Filter, update: &Update) -> UpdateResult {
        let mut state = self.state.lock();
        let target = state
            .documents
            .iter_mut()
            .find(|(id, doc)| filter.matches(id, doc));

        match target {
            Some((_, doc)) => {
                update.apply(doc);
                UpdateResult {
                    matched_count: 1,
                    modified_count: 1,
                }
            }
            None => UpdateResult {
                matched_count: 0,
                modified_count: 0,
            },
        }
    }

    pub fn delete_one(&self, filter: &Filter) -> DeleteResult {
        let mut state = self.state.lock();
        let index = state
            .documents
            .iter()
            .position(|(id, doc)| filter.matches(id, doc));

        match index {
            Some(index) => {
                state.documents.shift_remove_index(index);
                DeleteResult { deleted_count: 1 }
            }
            None => DeleteResult { deleted_count: 0 },
        }
    }

    pub fn delete_many(&self, filter: &Filter) -> DeleteResult {
        let mut state = self.state.lock();
        let doomed: Vec<String> = state.matching(filter).map(|(id, _)| id.clone()).collect();
        for id in &doomed {
            state.documents.shift_remove(id);
        }
        DeleteResult {
            deleted_count: doomed.len() as u64,
        }
    }

    pub fn count_documents(&self, filter: &Filter) -> u64 {
        self.state.lock().matching(filter).count() as u64
    }

    /// Accepted and ignored; there is nothing to index in memory.
    pub fn create_index(&self, index: &IndexSpec) -> Ack {
        log::debug!(
            "Ignoring index {} on '{}' (unique: {})",
            index.name(),
            self.name,
            index.unique
        );
        Ack::ok()
    }

    pub fn aggregate(&self, pipeline: &Pipeline) -> Vec<GroupCount> {
        pipeline.run(
            self.state
                .lock()
                .documents
                .iter()
                .map(|(id, doc)| (id.as_str(), doc)),
        )
    }

    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
