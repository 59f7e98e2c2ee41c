//! Example consumer: a small blog service with articles and comments.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Configuration comes from the environment (or `.env`); see `AppConfig::from_env`.

use chrono::{DateTime, Utc};
use doc_blueprint::{
    common_routes, ensure_database_exists, register, with_store, AppConfig, AppState, DocumentId, HookError,
    HookSet, PgDocumentStore, Resource, RouteMask, SharedStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

/// `pre_update` stamps `updated_at` on the value being written, which only a
/// full replacement (PUT) stores: a PATCH writes just the fields in its body,
/// so PATCH clients that track edits send `updated_at` themselves. A PUT
/// replaces the whole record; send `created_at` back to keep it.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Article {
    #[serde(default)]
    id: Option<DocumentId>,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl Resource for Article {
    const HOOKS: HookSet = HookSet::PRE_CREATE
        .union(HookSet::PRE_UPDATE)
        .union(HookSet::POST_DELETE);

    fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    fn pre_create(&mut self) -> Result<(), HookError> {
        if self.title.trim().is_empty() {
            return Err(HookError::new("title must not be empty"));
        }
        let now = Utc::now();
        self.created_at = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    fn pre_update(&mut self) -> Result<(), HookError> {
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    fn post_delete(&self) -> Result<(), HookError> {
        tracing::info!(title = %self.title, "article deleted");
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Comment {
    #[serde(default)]
    id: Option<DocumentId>,
    article: DocumentId,
    author: String,
    text: String,
}

impl Resource for Comment {
    fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("doc_blueprint=info,example_consumer=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    ensure_database_exists(&config.store.database_url).await?;
    let pg = PgDocumentStore::connect(&config.store).await?;

    let articles = register::<Article>("blog", "article").body_limit(config.server.body_limit);
    // Comments are write-once: no replace or partial update.
    let comments = register::<Comment>("blog", "comment")
        .group("/api/comments")
        .body_limit(config.server.body_limit);
    pg.ensure_collection(articles.descriptor().namespace()).await?;
    pg.ensure_collection(comments.descriptor().namespace()).await?;

    let store: SharedStore = Arc::new(pg);
    let api = articles.bind_all(axum::Router::new());
    let api = comments.bind(api, RouteMask::CREATE | RouteMask::LIST | RouteMask::GET | RouteMask::DELETE);
    let app = with_store(api, store.clone()).merge(common_routes(AppState::new(store)));

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!("example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
