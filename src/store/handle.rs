//! Request-scoped store handle. Created by the store middleware, released exactly once.

use crate::query::Query;
use crate::store::{Document, DocumentId, FieldSet, Namespace, StoreError, StoreSession};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Session borrowed by one request. Clones share the same session; it is
/// closed by [`StoreHandle::release`] or, failing that, when the last clone drops.
#[derive(Clone)]
pub struct StoreHandle {
    session: Arc<Mutex<Option<Box<dyn StoreSession>>>>,
}

impl StoreHandle {
    pub fn new(session: Box<dyn StoreSession>) -> Self {
        StoreHandle {
            session: Arc::new(Mutex::new(Some(session))),
        }
    }

    /// View of one database/collection through this session.
    pub fn collection(&self, ns: &Namespace) -> Collection {
        Collection {
            handle: self.clone(),
            ns: ns.clone(),
        }
    }

    /// Close the session. Returns false if it was already released.
    pub async fn release(&self) -> bool {
        let session = self.session.lock().await.take();
        match session {
            Some(mut session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_released(&self) -> bool {
        self.session.lock().await.is_none()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}

/// A store handle bound to one namespace.
#[derive(Clone, Debug)]
pub struct Collection {
    handle: StoreHandle,
    ns: Namespace,
}

impl Collection {
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(ns = %self.ns, filters = query.filter.len(), skip = query.skip, limit = query.limit, "find");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.find(&self.ns, query).await
    }

    pub async fn find_id(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        tracing::debug!(ns = %self.ns, id = %id, "find_id");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.find_id(&self.ns, id).await
    }

    pub async fn insert(&self, doc: &Document) -> Result<(), StoreError> {
        tracing::debug!(ns = %self.ns, id = %doc.id, "insert");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.insert(&self.ns, doc).await
    }

    pub async fn replace_id(&self, doc: &Document) -> Result<bool, StoreError> {
        tracing::debug!(ns = %self.ns, id = %doc.id, "replace_id");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.replace_id(&self.ns, doc).await
    }

    pub async fn set_fields(&self, id: &DocumentId, fields: &FieldSet) -> Result<bool, StoreError> {
        tracing::debug!(ns = %self.ns, id = %id, fields = fields.len(), "set_fields");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.set_fields(&self.ns, id, fields).await
    }

    pub async fn remove_id(&self, id: &DocumentId) -> Result<bool, StoreError> {
        tracing::debug!(ns = %self.ns, id = %id, "remove_id");
        let mut guard = self.handle.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::Released)?;
        session.remove_id(&self.ns, id).await
    }
}
