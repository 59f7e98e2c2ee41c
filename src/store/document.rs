//! Field paths and the document-level semantics shared by every back-end:
//! filter matching, sort ordering and field-set patches.

use crate::query::{FilterClause, SortKey, SortOrder};
use crate::store::StoreError;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^$.][^.]*$").expect("segment pattern is a valid regex"))
}

/// Dotted path to a (possibly nested) field, e.g. `author.name`.
/// Segments are non-empty and never start with `$`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(raw: &str) -> Option<FieldPath> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().all(|s| segment_pattern().is_match(s)) {
            Some(FieldPath(segments))
        } else {
            None
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// Value at this path, if every segment resolves.
    pub fn lookup<'a>(&self, body: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = body.get(first)?;
        for seg in rest {
            current = current.as_object()?.get(seg)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Ordered field-path → value assignments applied by a partial update.
pub type FieldSet = Vec<(FieldPath, Value)>;

/// Set `value` at `path`, creating intermediate objects. Fails when a parent is not an object.
pub fn apply_set(body: &mut Map<String, Value>, path: &FieldPath, value: Value) -> Result<(), StoreError> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(StoreError::InvalidPatch("empty field path".into()));
    };
    let mut current = body;
    for seg in parents {
        let entry = current
            .entry(seg.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::InvalidPatch(format!(
                    "cannot set {}: {} is not an object",
                    path, seg
                )))
            }
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

/// Apply every assignment of a field set, in order.
pub fn apply_field_set(body: &mut Map<String, Value>, fields: &FieldSet) -> Result<(), StoreError> {
    for (path, value) in fields {
        apply_set(body, path, value.clone())?;
    }
    Ok(())
}

/// Text form used for equality filters: strings as-is, numbers and booleans
/// in their JSON spelling, null never matches.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

/// A clause matches when the field's text equals one of the values, or the
/// field is an array with a string element equal to one of the values.
pub fn clause_matches(body: &Map<String, Value>, clause: &FilterClause) -> bool {
    let Some(field) = clause.field.lookup(body) else {
        return false;
    };
    if let Some(text) = scalar_text(field) {
        if clause.values.iter().any(|v| *v == text) {
            return true;
        }
    }
    match field {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|item| clause.values.iter().any(|v| v == item)),
        _ => false,
    }
}

pub fn matches_all(body: &Map<String, Value>, clauses: &[FilterClause]) -> bool {
    clauses.iter().all(|c| clause_matches(body, c))
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < string < number < boolean < array < object;
/// arrays and objects compare by length first, then element-wise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|(l, r)| compare_values(l, r))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        }),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        }),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Missing fields sort after every value (before them when descending).
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compare two documents by a list of sort keys; `Equal` means "keep natural order".
pub fn compare_by_keys(a: &Map<String, Value>, b: &Map<String, Value>, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = compare_field(key.field.lookup(a), key.field.lookup(b));
        let ord = match key.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn clause(path: &str, values: &[&str]) -> FilterClause {
        FilterClause {
            field: FieldPath::parse(path).unwrap(),
            values: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn field_path_validation() {
        assert!(FieldPath::parse("title").is_some());
        assert_eq!(FieldPath::parse("author.name").unwrap().segments().len(), 2);
        assert!(FieldPath::parse("").is_none());
        assert!(FieldPath::parse("a..b").is_none());
        assert!(FieldPath::parse("$where").is_none());
        assert!(FieldPath::parse("a.$gt").is_none());
        assert!(FieldPath::parse("price$").is_some());
    }

    #[test]
    fn lookup_nested() {
        let body = obj(json!({"author": {"name": "ann"}, "n": 1}));
        let path = FieldPath::parse("author.name").unwrap();
        assert_eq!(path.lookup(&body), Some(&json!("ann")));
        assert_eq!(FieldPath::parse("n.x").unwrap().lookup(&body), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut body = obj(json!({"title": "t"}));
        apply_set(&mut body, &FieldPath::parse("author.email").unwrap(), json!("a@b")).unwrap();
        assert_eq!(Value::Object(body), json!({"title": "t", "author": {"email": "a@b"}}));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut body = obj(json!({"title": "t"}));
        let err = apply_set(&mut body, &FieldPath::parse("title.x").unwrap(), json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPatch(_)));
    }

    #[test]
    fn equality_and_any_of() {
        let body = obj(json!({"title": "t", "views": 3, "draft": false, "tags": ["a", "b"]}));
        assert!(clause_matches(&body, &clause("title", &["t"])));
        assert!(clause_matches(&body, &clause("title", &["x", "t"])));
        assert!(!clause_matches(&body, &clause("title", &["x"])));
        assert!(clause_matches(&body, &clause("views", &["3"])));
        assert!(clause_matches(&body, &clause("draft", &["false"])));
        assert!(clause_matches(&body, &clause("tags", &["b"])));
        assert!(!clause_matches(&body, &clause("tags", &["c"])));
        assert!(!clause_matches(&body, &clause("missing", &["t"])));
    }

    #[test]
    fn value_ordering() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!("z"), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!([1]), &json!([0, 0])), Ordering::Less);
        assert_eq!(compare_field(Some(&json!(1)), None), Ordering::Less);
    }

    #[test]
    fn sort_keys_descending_puts_missing_first() {
        let a = obj(json!({"n": 1}));
        let b = obj(json!({}));
        let desc = [SortKey { field: FieldPath::parse("n").unwrap(), order: SortOrder::Descending }];
        assert_eq!(compare_by_keys(&a, &b, &desc), Ordering::Greater);
    }
}
