//! Document store collaborator: identifiers, documents, and the session traits
//! implemented by each back-end.

pub mod document;
pub mod handle;
pub mod memory;
pub mod postgres;

pub use document::{FieldPath, FieldSet};
pub use handle::{Collection, StoreHandle};
pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};

use crate::query::Query;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate id {0}")]
    Duplicate(DocumentId),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("corrupt document {id}: {message}")]
    Corrupt { id: String, message: String },
    #[error("store handle already released")]
    Released,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

/// Store-native document identifier (UUID, hyphenated in JSON and paths).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Fresh store-assigned id.
    pub fn new() -> Self {
        DocumentId(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for DocumentId {
    fn from(u: uuid::Uuid) -> Self {
        DocumentId(u)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(DocumentId)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Database and collection a resource lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Namespace {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// A stored document: its id plus the remaining fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub body: Map<String, Value>,
}

/// Shared base connection. One per process; requests borrow sessions from it.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Open an isolated session for one request.
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError>;

    /// Cheap liveness check used by the readiness route.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

/// One request's view of the store. Single-document operations are atomic.
/// The `bool` results report whether a document with the id existed.
#[async_trait]
pub trait StoreSession: Send {
    async fn find(&mut self, ns: &Namespace, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn find_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    async fn insert(&mut self, ns: &Namespace, doc: &Document) -> Result<(), StoreError>;

    async fn replace_id(&mut self, ns: &Namespace, doc: &Document) -> Result<bool, StoreError>;

    async fn set_fields(
        &mut self,
        ns: &Namespace,
        id: &DocumentId,
        fields: &FieldSet,
    ) -> Result<bool, StoreError>;

    async fn remove_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<bool, StoreError>;

    /// Called once before the session is dropped. Dropping alone also releases it.
    async fn close(&mut self) {}
}
