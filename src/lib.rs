//! doc-blueprint: declarative REST CRUD over a document store.
//!
//! Register a record type with [`register`], bind its routes onto an axum
//! router, and wrap the router with [`with_store`] so every request gets its
//! own store session.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod inflect;
pub mod query;
pub mod resource;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{AppConfig, ServerConfig, StoreConfig};
pub use error::{AppError, ConfigError, HookError};
pub use extractors::{provide_store, with_store};
pub use hooks::{Hook, HookDispatcher, HookSet};
pub use query::Query;
pub use resource::{Resource, ResourceDescriptor};
pub use routes::{common_routes, register, Blueprint, RouteMask};
pub use service::CrudService;
pub use state::AppState;
pub use store::{
    ensure_database_exists, DocumentId, DocumentStore, MemoryStore, Namespace, PgDocumentStore, SharedStore,
    StoreError, StoreHandle, StoreSession,
};
