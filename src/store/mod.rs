//! Data-store collaborator interface.
//!
//! The query layer never opens sockets or files; it hands a predicate (and,
//! for reads, a [`FindSpec`]) to whatever implements [`DataStore`]. The
//! in-memory [`MemoryStore`] backend serves tests and embedders that need a
//! store without infrastructure.

mod memory;

pub use memory::{MemoryCursor, MemoryStore, MemoryStoreError};

use bson::Document;
use serde::{Deserialize, Serialize};

/// Everything a read needs besides the connection: predicate, projection,
/// sort, paging window and an execution-time hint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindSpec {
    pub filter: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: i64,
    pub skip: i64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Acknowledgement of a single-document update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAck {
    pub matched: u64,
    pub modified: u64,
}

/// The operations the query layer delegates. `count` and `update_one` take
/// the merged predicate directly; `find` takes the full spec.
pub trait DataStore {
    type Cursor;
    type Error: std::error::Error + Send + Sync + 'static;

    fn count(&self, filter: Option<&Document>) -> Result<u64, Self::Error>;
    fn find(&self, spec: &FindSpec) -> Result<Self::Cursor, Self::Error>;
    fn update_one(&self, filter: &Document, update: &Document) -> Result<UpdateAck, Self::Error>;
}
