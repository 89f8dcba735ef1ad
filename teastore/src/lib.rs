pub mod document;
pub mod query;
pub mod aggregate;
pub mod store;
pub mod backend;
pub mod config;
pub mod snapshot;
pub mod error;

pub use aggregate::{GroupCount, Pipeline};
pub use backend::{Database, DocumentCollection};
pub use config::StoreConfig;
pub use document::Document;
pub use error::{Result, StoreError};
pub use query::options::{FindOptions, IndexSpec, SortOrder, SortSpec, Update};
pub use query::Filter;
pub use snapshot::Snapshot;
pub use store::{Ack, Collection, DeleteResult, InsertOneResult, MemoryStore, UpdateResult};
