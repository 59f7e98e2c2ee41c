//! Process-local document store. Collections keep insertion order, which is
//! the natural order used when a list request has no sort keys.

use crate::query::Query;
use crate::store::document::{apply_field_set, compare_by_keys, matches_all};
use crate::store::{Document, DocumentId, DocumentStore, FieldSet, Namespace, StoreError, StoreSession};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<Namespace, Vec<Document>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently checked out.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection (0 when it does not exist).
    pub fn count(&self, ns: &Namespace) -> usize {
        read(&self.collections).get(ns).map(Vec::len).unwrap_or(0)
    }

    /// Remove every collection of a database.
    pub fn drop_database(&self, database: &str) {
        write(&self.collections).retain(|ns, _| ns.database != database);
    }
}

// A panic while holding the lock cannot leave a collection half-written:
// every mutation below is a single push/assign/remove.
fn read(lock: &RwLock<Collections>) -> RwLockReadGuard<'_, Collections> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(lock: &RwLock<Collections>) -> RwLockWriteGuard<'_, Collections> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            collections: self.collections.clone(),
            open_sessions: self.open_sessions.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemorySession {
    collections: Arc<RwLock<Collections>>,
    open_sessions: Arc<AtomicUsize>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Body as seen by filters and sort keys: the id is put back under `id_field`
/// when the query addresses it.
fn query_view<'a>(doc: &'a Document, id_field: Option<&str>) -> Cow<'a, Map<String, Value>> {
    match id_field {
        Some(name) => {
            let mut body = doc.body.clone();
            body.insert(name.to_string(), Value::String(doc.id.to_string()));
            Cow::Owned(body)
        }
        None => Cow::Borrowed(&doc.body),
    }
}

fn position(docs: &[Document], id: &DocumentId) -> Option<usize> {
    docs.iter().position(|d| d.id == *id)
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn find(&mut self, ns: &Namespace, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = read(&self.collections);
        let Some(docs) = collections.get(ns) else {
            return Ok(Vec::new());
        };
        let id_field = if query.references_id() { query.id_field.as_deref() } else { None };
        let mut matched: Vec<(Cow<'_, Map<String, Value>>, &Document)> = docs
            .iter()
            .map(|d| (query_view(d, id_field), d))
            .filter(|(view, _)| matches_all(view, &query.filter))
            .collect();
        if !query.sort.is_empty() {
            // stable: ties keep insertion order
            matched.sort_by(|a, b| compare_by_keys(&a.0, &b.0, &query.sort));
        }
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = match query.limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn find_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let collections = read(&self.collections);
        Ok(collections
            .get(ns)
            .and_then(|docs| docs.iter().find(|d| d.id == *id))
            .cloned())
    }

    async fn insert(&mut self, ns: &Namespace, doc: &Document) -> Result<(), StoreError> {
        let mut collections = write(&self.collections);
        let docs = collections.entry(ns.clone()).or_default();
        if position(docs, &doc.id).is_some() {
            return Err(StoreError::Duplicate(doc.id));
        }
        docs.push(doc.clone());
        Ok(())
    }

    async fn replace_id(&mut self, ns: &Namespace, doc: &Document) -> Result<bool, StoreError> {
        let mut collections = write(&self.collections);
        let Some(docs) = collections.get_mut(ns) else {
            return Ok(false);
        };
        match position(docs, &doc.id) {
            Some(i) => {
                docs[i].body = doc.body.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_fields(&mut self, ns: &Namespace, id: &DocumentId, fields: &FieldSet) -> Result<bool, StoreError> {
        let mut collections = write(&self.collections);
        let Some(docs) = collections.get_mut(ns) else {
            return Ok(false);
        };
        let Some(i) = position(docs, id) else {
            return Ok(false);
        };
        let mut body = docs[i].body.clone();
        apply_field_set(&mut body, fields)?;
        docs[i].body = body;
        Ok(true)
    }

    async fn remove_id(&mut self, ns: &Namespace, id: &DocumentId) -> Result<bool, StoreError> {
        let mut collections = write(&self.collections);
        let Some(docs) = collections.get_mut(ns) else {
            return Ok(false);
        };
        match position(docs, id) {
            Some(i) => {
                docs.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_sort;
    use crate::store::FieldPath;
    use serde_json::json;

    fn ns() -> Namespace {
        Namespace::new("test", "things")
    }

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(body) => Document { id: DocumentId::new(), body },
            _ => panic!("not an object"),
        }
    }

    async fn seeded(store: &MemoryStore, n: i64) -> Vec<DocumentId> {
        let mut session = store.session().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..n {
            let d = doc(json!({"n": n - i, "even": i % 2 == 0}));
            ids.push(d.id);
            session.insert(&ns(), &d).await.unwrap();
        }
        ids
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let d = doc(json!({"a": 1}));
        session.insert(&ns(), &d).await.unwrap();
        let err = session.insert(&ns(), &d).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == d.id));
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let store = MemoryStore::new();
        seeded(&store, 5).await;
        let mut session = store.session().await.unwrap();
        let query = Query {
            sort: parse_sort("n").unwrap(),
            skip: 1,
            limit: 2,
            ..Query::default()
        };
        let found = session.find(&ns(), &query).await.unwrap();
        let ns_: Vec<Value> = found.iter().map(|d| d.body["n"].clone()).collect();
        assert_eq!(ns_, vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn id_field_filters_and_sorts_on_the_document_id() {
        let store = MemoryStore::new();
        let ids = seeded(&store, 3).await;
        let mut session = store.session().await.unwrap();

        let by_id = Query::from_params(vec![("id".to_string(), ids[1].to_string())])
            .unwrap()
            .with_id_field("id");
        let found = session.find(&ns(), &by_id).await.unwrap();
        assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), vec![ids[1]]);
        assert!(!found[0].body.contains_key("id"));

        let sorted = Query::from_params(vec![("_sort".to_string(), "-id".to_string())])
            .unwrap()
            .with_id_field("id");
        let found = session.find(&ns(), &sorted).await.unwrap();
        let mut expected = ids.clone();
        expected.sort_by_key(|id| std::cmp::Reverse(id.to_string()));
        assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn find_without_sort_keeps_insertion_order() {
        let store = MemoryStore::new();
        let ids = seeded(&store, 3).await;
        let mut session = store.session().await.unwrap();
        let found = session.find(&ns(), &Query::default()).await.unwrap();
        assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn find_on_missing_collection_is_empty() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        assert!(session.find(&ns(), &Query::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_fields_touches_only_named_fields() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let d = doc(json!({"a": 1, "b": {"c": 2}}));
        session.insert(&ns(), &d).await.unwrap();
        let fields = vec![(FieldPath::parse("b.d").unwrap(), json!(3))];
        assert!(session.set_fields(&ns(), &d.id, &fields).await.unwrap());
        let got = session.find_id(&ns(), &d.id).await.unwrap().unwrap();
        assert_eq!(Value::Object(got.body), json!({"a": 1, "b": {"c": 2, "d": 3}}));
        assert!(!session.set_fields(&ns(), &DocumentId::new(), &fields).await.unwrap());
    }

    #[tokio::test]
    async fn failed_patch_leaves_document_untouched() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let d = doc(json!({"a": 1}));
        session.insert(&ns(), &d).await.unwrap();
        let fields = vec![
            (FieldPath::parse("z").unwrap(), json!(9)),
            (FieldPath::parse("a.x").unwrap(), json!(3)),
        ];
        assert!(session.set_fields(&ns(), &d.id, &fields).await.is_err());
        let got = session.find_id(&ns(), &d.id).await.unwrap().unwrap();
        assert_eq!(got.body, d.body);
    }

    #[tokio::test]
    async fn replace_and_remove_report_existence() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let mut d = doc(json!({"a": 1}));
        assert!(!session.replace_id(&ns(), &d).await.unwrap());
        session.insert(&ns(), &d).await.unwrap();
        d.body = Map::new();
        assert!(session.replace_id(&ns(), &d).await.unwrap());
        assert!(session.remove_id(&ns(), &d.id).await.unwrap());
        assert!(!session.remove_id(&ns(), &d.id).await.unwrap());
        assert_eq!(store.count(&ns()), 0);
    }

    #[tokio::test]
    async fn sessions_are_counted() {
        let store = MemoryStore::new();
        let mut a = store.session().await.unwrap();
        let b = store.session().await.unwrap();
        assert_eq!(store.open_sessions(), 2);
        a.close().await;
        drop(a);
        drop(b);
        assert_eq!(store.open_sessions(), 0);
    }
}
