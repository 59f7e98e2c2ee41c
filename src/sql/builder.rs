//! Builds parameterized SQL for collections stored as JSONB tables.
//! A namespace maps to `"database"."collection"` with columns `seq`, `id`, `doc`.

use crate::query::{Query, SortOrder};
use crate::sql::PgBindValue;
use crate::store::{DocumentId, Namespace};

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name for a namespace.
pub fn qualified_table(ns: &Namespace) -> String {
    format!("{}.{}", quoted(&ns.database), quoted(&ns.collection))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub fn create_schema(database: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(database))
}

pub fn drop_schema(database: &str) -> String {
    format!("DROP SCHEMA IF EXISTS {} CASCADE", quoted(database))
}

/// `seq` records insertion order, used as the natural order and final tie-breaker.
pub fn create_collection(ns: &Namespace) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (seq BIGSERIAL NOT NULL, id UUID PRIMARY KEY, doc JSONB NOT NULL)",
        qualified_table(ns)
    )
}

/// SELECT with equality/any-of filters, sort keys, then OFFSET/LIMIT.
/// Each clause matches the field's text form or a string element of an array field.
pub fn select_find(ns: &Namespace, query: &Query) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for clause in &query.filter {
        if query.is_id(&clause.field) {
            let values = q.push_param(PgBindValue::TextArray(clause.values.clone()));
            where_parts.push(format!("id::text = ANY(${})", values));
            continue;
        }
        let path = q.push_param(PgBindValue::TextArray(clause.field.segments().to_vec()));
        let values = q.push_param(PgBindValue::TextArray(clause.values.clone()));
        where_parts.push(format!(
            "(doc #>> ${p} = ANY(${v}) OR (jsonb_typeof(doc #> ${p}) = 'array' AND (doc #> ${p}) ?| ${v}))",
            p = path,
            v = values
        ));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    for key in &query.sort {
        let dir = match key.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        if query.is_id(&key.field) {
            order_parts.push(format!("id::text {}", dir));
            continue;
        }
        let path = q.push_param(PgBindValue::TextArray(key.field.segments().to_vec()));
        order_parts.push(format!("doc #> ${} {}", path, dir));
    }
    order_parts.push("seq".to_string());
    let order_clause = format!(" ORDER BY {}", order_parts.join(", "));

    let limit_clause = if query.limit > 0 {
        let n = q.push_param(PgBindValue::I64(to_i64(query.limit)));
        format!(" LIMIT ${}", n)
    } else {
        String::new()
    };
    let offset_clause = if query.skip > 0 {
        let n = q.push_param(PgBindValue::I64(to_i64(query.skip)));
        format!(" OFFSET ${}", n)
    } else {
        String::new()
    };

    q.sql = format!(
        "SELECT id, doc FROM {}{}{}{}{}",
        qualified_table(ns),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT by id.
pub fn select_by_id(ns: &Namespace, id: &DocumentId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::Uuid(*id.as_uuid()));
    q.sql = format!("SELECT id, doc FROM {} WHERE id = ${}", qualified_table(ns), n);
    q
}

/// SELECT by id holding a row lock until the surrounding transaction ends.
pub fn select_for_update(ns: &Namespace, id: &DocumentId) -> QueryBuf {
    let mut q = select_by_id(ns, id);
    q.sql.push_str(" FOR UPDATE");
    q
}

pub fn insert(ns: &Namespace, id: &DocumentId, doc: serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_n = q.push_param(PgBindValue::Uuid(*id.as_uuid()));
    let doc_n = q.push_param(PgBindValue::Json(doc));
    q.sql = format!(
        "INSERT INTO {} (id, doc) VALUES (${}, ${})",
        qualified_table(ns),
        id_n,
        doc_n
    );
    q
}

/// Replace the whole document body of one row.
pub fn update_doc(ns: &Namespace, id: &DocumentId, doc: serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let doc_n = q.push_param(PgBindValue::Json(doc));
    let id_n = q.push_param(PgBindValue::Uuid(*id.as_uuid()));
    q.sql = format!("UPDATE {} SET doc = ${} WHERE id = ${}", qualified_table(ns), doc_n, id_n);
    q
}

/// DELETE by id.
pub fn delete(ns: &Namespace, id: &DocumentId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::Uuid(*id.as_uuid()));
    q.sql = format!("DELETE FROM {} WHERE id = ${}", qualified_table(ns), n);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    fn ns() -> Namespace {
        Namespace::new("blog", "article")
    }

    fn query(pairs: &[(&str, &str)]) -> Query {
        Query::from_params(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    #[test]
    fn plain_find_uses_natural_order() {
        let q = select_find(&ns(), &Query::default());
        assert_eq!(q.sql, r#"SELECT id, doc FROM "blog"."article" ORDER BY seq"#);
        assert!(q.params.is_empty());
    }

    #[test]
    fn filters_sort_and_window_are_parameterized() {
        let q = select_find(
            &ns(),
            &query(&[("tag", "a"), ("tag", "b"), ("_sort", "-title"), ("_limit", "2"), ("_offset", "1")]),
        );
        assert_eq!(
            q.sql,
            "SELECT id, doc FROM \"blog\".\"article\" \
             WHERE (doc #>> $1 = ANY($2) OR (jsonb_typeof(doc #> $1) = 'array' AND (doc #> $1) ?| $2)) \
             ORDER BY doc #> $3 DESC, seq LIMIT $4 OFFSET $5"
        );
        assert_eq!(q.params[0], PgBindValue::TextArray(vec!["tag".into()]));
        assert_eq!(q.params[1], PgBindValue::TextArray(vec!["a".into(), "b".into()]));
        assert_eq!(q.params[2], PgBindValue::TextArray(vec!["title".into()]));
        assert_eq!(q.params[3], PgBindValue::I64(2));
        assert_eq!(q.params[4], PgBindValue::I64(1));
    }

    #[test]
    fn id_field_addresses_the_id_column() {
        let q = select_find(&ns(), &query(&[("id", "x"), ("_sort", "-id")]).with_id_field("id"));
        assert_eq!(
            q.sql,
            r#"SELECT id, doc FROM "blog"."article" WHERE id::text = ANY($1) ORDER BY id::text DESC, seq"#
        );
        assert_eq!(q.params, vec![PgBindValue::TextArray(vec!["x".into()])]);
    }

    #[test]
    fn nested_paths_bind_segments() {
        let q = select_find(&ns(), &query(&[("author.name", "ann")]));
        assert_eq!(q.params[0], PgBindValue::TextArray(vec!["author".into(), "name".into()]));
    }

    #[test]
    fn identifiers_are_quoted() {
        let odd = Namespace::new("my\"db", "c");
        assert_eq!(qualified_table(&odd), r#""my""db"."c""#);
        assert_eq!(
            create_collection(&ns()),
            r#"CREATE TABLE IF NOT EXISTS "blog"."article" (seq BIGSERIAL NOT NULL, id UUID PRIMARY KEY, doc JSONB NOT NULL)"#
        );
    }

    #[test]
    fn by_id_statements() {
        let id = DocumentId::new();
        assert_eq!(select_for_update(&ns(), &id).sql, r#"SELECT id, doc FROM "blog"."article" WHERE id = $1 FOR UPDATE"#);
        assert_eq!(delete(&ns(), &id).sql, r#"DELETE FROM "blog"."article" WHERE id = $1"#);
        let upd = update_doc(&ns(), &id, serde_json::json!({}));
        assert_eq!(upd.sql, r#"UPDATE "blog"."article" SET doc = $1 WHERE id = $2"#);
        assert_eq!(upd.params[1], PgBindValue::Uuid(*id.as_uuid()));
    }
}
