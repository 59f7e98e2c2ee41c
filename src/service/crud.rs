//! Generic CRUD execution against a request's store collection.
//! Converts between record instances and stored documents; no HTTP concerns.

use crate::error::AppError;
use crate::query::Query;
use crate::resource::Resource;
use crate::store::document::apply_field_set;
use crate::store::{Collection, Document, DocumentId, FieldPath, FieldSet, StoreError};
use serde_json::{Map, Value};

/// Record → document: the id field is lifted out of the body. The id must be set.
pub fn to_document<R: Resource>(record: &R) -> Result<Document, AppError> {
    let id = *record
        .id()
        .ok_or_else(|| AppError::Internal("record has no id".into()))?;
    let value = serde_json::to_value(record).map_err(|e| AppError::Internal(format!("encode record: {}", e)))?;
    let Value::Object(mut body) = value else {
        return Err(AppError::Internal("record does not serialize to a JSON object".into()));
    };
    body.remove(R::ID_FIELD);
    Ok(Document { id, body })
}

/// Document → record: the id is put back under `ID_FIELD`.
pub fn from_document<R: Resource>(doc: Document) -> Result<R, AppError> {
    let Document { id, mut body } = doc;
    body.insert(R::ID_FIELD.to_string(), Value::String(id.to_string()));
    serde_json::from_value(Value::Object(body)).map_err(|e| {
        AppError::Store(StoreError::Corrupt {
            id: id.to_string(),
            message: e.to_string(),
        })
    })
}

/// Decode a request body into a fresh record instance.
pub fn decode_record<R: Resource>(bytes: &[u8]) -> Result<R, AppError> {
    serde_json::from_slice(bytes).map_err(|e| AppError::BadRequest(format!("invalid body: {}", e)))
}

/// Decode a partial-update body into a field set. The id field is dropped so
/// an update can never change it.
pub fn decode_field_set<R: Resource>(bytes: &[u8]) -> Result<FieldSet, AppError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| AppError::BadRequest(format!("invalid body: {}", e)))?;
    let Value::Object(map) = value else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    field_set_from_map::<R>(map)
}

fn field_set_from_map<R: Resource>(map: Map<String, Value>) -> Result<FieldSet, AppError> {
    let mut fields = FieldSet::with_capacity(map.len());
    for (key, value) in map {
        let path = FieldPath::parse(&key).ok_or_else(|| AppError::BadRequest(format!("invalid field '{}'", key)))?;
        if path.first() == R::ID_FIELD {
            continue;
        }
        fields.push((path, value));
    }
    Ok(fields)
}

/// Apply `fields` to a copy of `current` and decode the result as `R`. A value
/// the record type cannot hold is rejected here, before the store write.
pub fn check_field_set<R: Resource>(current: &R, fields: &FieldSet) -> Result<(), AppError> {
    let Document { id, mut body } = to_document(current)?;
    apply_field_set(&mut body, fields)?;
    body.insert(R::ID_FIELD.to_string(), Value::String(id.to_string()));
    serde_json::from_value::<R>(Value::Object(body))
        .map(|_| ())
        .map_err(|e| AppError::BadRequest(format!("invalid patch: {}", e)))
}

/// Parse a path id. Empty means "no id" (404); anything unparsable is a client error (400).
pub fn parse_id(raw: &str) -> Result<DocumentId, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::NotFound("empty id".into()));
    }
    trimmed
        .parse()
        .map_err(|_| AppError::InvalidId(trimmed.to_string()))
}

pub struct CrudService;

impl CrudService {
    pub async fn list<R: Resource>(coll: &Collection, query: &Query) -> Result<Vec<R>, AppError> {
        let docs = coll.find(query).await?;
        docs.into_iter().map(from_document).collect()
    }

    pub async fn read<R: Resource>(coll: &Collection, id: &DocumentId) -> Result<Option<R>, AppError> {
        coll.find_id(id).await?.map(from_document).transpose()
    }

    /// Fetch by id or fail with 404.
    pub async fn read_existing<R: Resource>(coll: &Collection, id: &DocumentId) -> Result<R, AppError> {
        Self::read(coll, id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Insert a record, assigning a fresh id when it has none. Returns the id.
    pub async fn create<R: Resource>(coll: &Collection, record: &mut R) -> Result<DocumentId, AppError> {
        if record.id().is_none() {
            record.set_id(DocumentId::new());
        }
        let doc = to_document(record)?;
        coll.insert(&doc).await?;
        Ok(doc.id)
    }

    /// Replace the stored document with `record` under `id`.
    pub async fn replace<R: Resource>(coll: &Collection, id: &DocumentId, record: &R) -> Result<(), AppError> {
        let mut doc = to_document(record)?;
        doc.id = *id;
        if !coll.replace_id(&doc).await? {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn patch(coll: &Collection, id: &DocumentId, fields: &FieldSet) -> Result<(), AppError> {
        if !coll.set_fields(id, fields).await? {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn delete(coll: &Collection, id: &DocumentId) -> Result<(), AppError> {
        if !coll.remove_id(id).await? {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Todo {
        #[serde(rename = "_key", skip_serializing_if = "Option::is_none", default)]
        key: Option<DocumentId>,
        title: String,
        #[serde(default)]
        done: bool,
    }

    impl Resource for Todo {
        const ID_FIELD: &'static str = "_key";

        fn id(&self) -> Option<&DocumentId> {
            self.key.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.key = Some(id);
        }
    }

    #[test]
    fn document_conversion_moves_id_field() {
        let id = DocumentId::new();
        let todo = Todo { key: Some(id), title: "t".into(), done: true };
        let doc = to_document(&todo).unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(Value::Object(doc.body.clone()), json!({"title": "t", "done": true}));
        let back: Todo = from_document(doc).unwrap();
        assert_eq!(back, todo);
    }

    #[test]
    fn record_without_id_cannot_be_stored() {
        let todo = Todo { key: None, title: "t".into(), done: false };
        assert!(matches!(to_document(&todo), Err(AppError::Internal(_))));
    }

    #[test]
    fn field_set_drops_id_and_rejects_operators() {
        let fields = decode_field_set::<Todo>(br#"{"_key": "x", "title": "n", "meta.rank": 2}"#).unwrap();
        let names: Vec<String> = fields.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(names, vec!["meta.rank".to_string(), "title".to_string()]);
        assert!(matches!(decode_field_set::<Todo>(br#"{"$set": {}}"#), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_field_set::<Todo>(b"[1]"), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_field_set::<Todo>(b"{"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn field_set_is_checked_against_the_record_type() {
        let todo = Todo { key: Some(DocumentId::new()), title: "t".into(), done: false };
        let ok = decode_field_set::<Todo>(br#"{"done": true, "extra.note": "x"}"#).unwrap();
        assert!(check_field_set(&todo, &ok).is_ok());

        let wrong_type = decode_field_set::<Todo>(br#"{"done": "yes"}"#).unwrap();
        assert!(matches!(check_field_set(&todo, &wrong_type), Err(AppError::BadRequest(_))));

        let through_scalar = decode_field_set::<Todo>(br#"{"title.x": 1}"#).unwrap();
        assert!(matches!(
            check_field_set(&todo, &through_scalar),
            Err(AppError::Store(StoreError::InvalidPatch(_)))
        ));
    }

    #[test]
    fn body_decoding() {
        let todo: Todo = decode_record(br#"{"title": "a"}"#).unwrap();
        assert_eq!(todo.title, "a");
        assert!(!todo.done);
        assert!(matches!(decode_record::<Todo>(br#"{"done": 1}"#), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn id_parsing_distinguishes_empty_and_malformed() {
        assert!(matches!(parse_id(""), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("  "), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("xyz"), Err(AppError::InvalidId(_))));
        let id = DocumentId::new();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
