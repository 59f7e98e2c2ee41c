//! PostgreSQL document store: each database is a schema, each collection a JSONB table.
//! Sessions are pooled connections checked out for the length of one request.

use crate::config::StoreConfig;
use crate::query::Query;
use crate::sql::{self, QueryBuf};
use crate::store::document::apply_field_set;
use crate::store::{Document, DocumentId, DocumentStore, FieldSet, Namespace, StoreError, StoreSession};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool, Postgres, Row};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        PgDocumentStore { pool }
    }

    /// Open a pool sized and timed from config.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(PgDocumentStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema and table backing a namespace if missing.
    pub async fn ensure_collection(&self, ns: &Namespace) -> Result<(), StoreError> {
        sqlx::query(&sql::create_schema(&ns.database))
            .execute(&self.pool)
            .await?;
        sqlx::query(&sql::create_collection(ns))
            .execute(&self.pool)
            .await?;
        tracing::info!(ns = %ns, "collection ready");
        Ok(())
    }

    /// Drop a database (schema) and every collection in it.
    pub async fn drop_database(&self, database: &str) -> Result<(), StoreError> {
        sqlx::query(&sql::drop_schema(database))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Create the PostgreSQL database named in `database_url` if it does not exist.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        let quoted = format!("\"{}\"", db_name.replace('"', "\"\""));
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> (String, String) {
    let path_start = url.rfind('/').map(|i| i + 1).unwrap_or(url.len());
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    (format!("{}postgres", base), db_name.to_string())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

fn bind_all<'q>(
    q: &'q QueryBuf,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let doc: Value = row.try_get("doc")?;
    match doc {
        Value::Object(body) => Ok(Document { id: id.into(), body }),
        other => Err(StoreError::Corrupt {
            id: id.to_string(),
            message: format!("stored document is not an object: {}", other),
        }),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl StoreSession for PgSession {
    async fn find(&mut self, ns: &Namespace, query: &Query) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_find(ns, query);
        let rows = bind_all(&q).fetch_all(&mut *self.conn).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn find_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let q = sql::select_by_id(ns, id);
        let row = bind_all(&q).fetch_optional(&mut *self.conn).await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn insert(&mut self, ns: &Namespace, doc: &Document) -> Result<(), StoreError> {
        let q = sql::insert(ns, &doc.id, Value::Object(doc.body.clone()));
        bind_all(&q)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(doc.id)
                } else {
                    StoreError::Db(e)
                }
            })?;
        Ok(())
    }

    async fn replace_id(&mut self, ns: &Namespace, doc: &Document) -> Result<bool, StoreError> {
        let q = sql::update_doc(ns, &doc.id, Value::Object(doc.body.clone()));
        let result = bind_all(&q).execute(&mut *self.conn).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_fields(&mut self, ns: &Namespace, id: &DocumentId, fields: &FieldSet) -> Result<bool, StoreError> {
        let mut tx = self.conn.begin().await?;
        let q = sql::select_for_update(ns, id);
        let Some(row) = bind_all(&q).fetch_optional(&mut *tx).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        let mut current = row_to_document(&row)?;
        apply_field_set(&mut current.body, fields)?;
        let q = sql::update_doc(ns, id, Value::Object(current.body));
        bind_all(&q).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn remove_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<bool, StoreError> {
        let q = sql::delete(ns, id);
        let result = bind_all(&q).execute(&mut *self.conn).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_and_db_name() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/blog?sslmode=disable");
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "blog");
    }
}
