//! Query-string translation for list requests: equality filters, pagination window and sort keys.

use crate::error::AppError;
use crate::store::FieldPath;

pub const LIMIT_PARAM: &str = "_limit";
pub const OFFSET_PARAM: &str = "_offset";
pub const SORT_PARAM: &str = "_sort";

/// Parameters that control the query instead of filtering on a field.
pub const RESERVED_PARAMS: [&str; 3] = [LIMIT_PARAM, OFFSET_PARAM, SORT_PARAM];

/// Field equals any of `values` (see `store::document::clause_matches`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterClause {
    pub field: FieldPath,
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: FieldPath,
    pub order: SortOrder,
}

/// Filter, pagination window and sort directive for one list request.
/// `limit == 0` means unbounded; empty `sort` means natural (insertion) order.
/// Clauses and keys naming `id_field` address the document id, which is
/// stored apart from the body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Vec<FilterClause>,
    pub skip: u64,
    pub limit: u64,
    pub sort: Vec<SortKey>,
    pub id_field: Option<String>,
}

fn invalid(name: &str, message: impl Into<String>) -> AppError {
    AppError::InvalidParameter {
        name: name.to_string(),
        message: message.into(),
    }
}

fn parse_count(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(name, format!("expected a non-negative integer, got '{}'", raw)))
}

/// Parse `_sort`: comma-separated field paths, `-` prefix for descending, optional `+` for ascending.
pub fn parse_sort(raw: &str) -> Result<Vec<SortKey>, AppError> {
    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (order, name) = if let Some(rest) = part.strip_prefix('-') {
            (SortOrder::Descending, rest)
        } else if let Some(rest) = part.strip_prefix('+') {
            (SortOrder::Ascending, rest)
        } else {
            (SortOrder::Ascending, part)
        };
        let field = FieldPath::parse(name).ok_or_else(|| invalid(SORT_PARAM, format!("invalid sort key '{}'", part)))?;
        keys.push(SortKey { field, order });
    }
    Ok(keys)
}

impl Query {
    /// Build a query from decoded query-string pairs. Repeated filter keys
    /// become "any of"; for reserved names the first occurrence wins.
    pub fn from_params<I>(params: I) -> Result<Query, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Query::default();
        let mut limit: Option<String> = None;
        let mut offset: Option<String> = None;
        let mut sort: Option<String> = None;

        for (key, value) in params {
            match key.as_str() {
                LIMIT_PARAM => {
                    limit.get_or_insert(value);
                }
                OFFSET_PARAM => {
                    offset.get_or_insert(value);
                }
                SORT_PARAM => {
                    sort.get_or_insert(value);
                }
                _ => {
                    let field = FieldPath::parse(&key).ok_or_else(|| invalid(&key, "invalid filter field"))?;
                    match query.filter.iter_mut().find(|c| c.field == field) {
                        Some(clause) => clause.values.push(value),
                        None => query.filter.push(FilterClause {
                            field,
                            values: vec![value],
                        }),
                    }
                }
            }
        }

        if let Some(raw) = limit {
            query.limit = parse_count(LIMIT_PARAM, &raw)?;
        }
        if let Some(raw) = offset {
            query.skip = parse_count(OFFSET_PARAM, &raw)?;
        }
        if let Some(raw) = sort {
            query.sort = parse_sort(&raw)?;
        }
        Ok(query)
    }

    pub fn with_id_field(mut self, name: impl Into<String>) -> Query {
        self.id_field = Some(name.into());
        self
    }

    /// True when `path` is the top-level id field.
    pub fn is_id(&self, path: &FieldPath) -> bool {
        match (&self.id_field, path.segments()) {
            (Some(name), [single]) => single == name,
            _ => false,
        }
    }

    /// True when any clause or sort key addresses the id.
    pub fn references_id(&self) -> bool {
        self.filter.iter().any(|c| self.is_id(&c.field)) || self.sort.iter().any(|k| self.is_id(&k.field))
    }
}
