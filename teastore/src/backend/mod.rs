// Async-compatible facade over the store.
//
// Route handlers are written against these traits the same way they would be
// written against a real driver connection. The in-memory implementation never
// suspends; every future is ready on first poll.

use crate::aggregate::{GroupCount, Pipeline};
use crate::document::Document;
use crate::query::options::{FindOptions, IndexSpec, Update};
use crate::query::Filter;
use crate::store::{Ack, Collection, DeleteResult, InsertOneResult, MemoryStore, UpdateResult};

/// A connection that hands out collection handles and answers liveness probes.
#[allow(async_fn_in_trait)]
pub trait Database {
    type Collection: DocumentCollection;

    fn collection(&self, name: &str) -> Self::Collection;

    async fn ping(&self) -> Ack;
}

/// The per-collection operation set.
#[allow(async_fn_in_trait)]
pub trait DocumentCollection {
    async fn find_one(&self, filter: &Filter) -> Option<Document>;

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Vec<Document>;

    async fn insert_one(&self, doc: Document) -> InsertOneResult;

    async fn update_one(&self, filter: &Filter, update: &Update) -> UpdateResult;

    async fn delete_one(&self, filter: &Filter) -> DeleteResult;

    async fn delete_many(&self, filter: &Filter) -> DeleteResult;

    async fn count_documents(&self, filter: &Filter) -> u64;

    async fn create_index(&self, index: &IndexSpec) -> Ack;

    async fn aggregate(&self, pipeline: &Pipeline) -> Vec<GroupCount>;
}

impl Database for MemoryStore {
    type Collection = Collection;

    fn collection(&self, name: &str) -> Collection {
        MemoryStore::collection(self, name)
    }

    async fn ping(&self) -> Ack {
        self.admin().ping()
    }
}

impl DocumentCollection for Collection {
    async fn find_one(&self, filter: &Filter) -> Option<Document> {
        Collection::find_one(self, filter)
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Vec<Document> {
        Collection::find(self, filter, options)
    }

    async fn insert_one(&self, doc: Document) -> InsertOneResult {
        Collection::insert_one(self, doc)
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> UpdateResult {
        Collection::update_one(self, filter, update)
    }

    async fn delete_one(&self, filter: &Filter) -> DeleteResult {
        Collection::delete_one(self, filter)
    }

    async fn delete_many(&self, filter: &Filter) -> DeleteResult {
        Collection::delete_many(self, filter)
    }

    async fn count_documents(&self, filter: &Filter) -> u64 {
        Collection::count_documents(self, filter)
    }

    async fn create_index(&self, index: &IndexSpec) -> Ack {
        Collection::create_index(self, index)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Vec<GroupCount> {
        Collection::aggregate(self, pipeline)
    }
}
