//! Values bound into document-store queries.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Each variant reports its
/// own type so one `Vec<PgBindValue>` can carry mixed parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    I64(i64),
    Uuid(uuid::Uuid),
    Json(Value),
    TextArray(Vec<String>),
}

impl PgBindValue {
    fn pg_type(&self) -> PgTypeInfo {
        match self {
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <Value as Type<Postgres>>::type_info(),
            PgBindValue::TextArray(_) => <Vec<String> as Type<Postgres>>::type_info(),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf),
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf),
            PgBindValue::TextArray(items) => <Vec<String> as Encode<Postgres>>::encode_by_ref(items, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.pg_type())
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_report_their_own_type() {
        assert_eq!(PgBindValue::I64(1).pg_type(), <i64 as Type<Postgres>>::type_info());
        assert_eq!(
            PgBindValue::TextArray(vec!["a".into()]).pg_type(),
            <Vec<String> as Type<Postgres>>::type_info()
        );
        assert_eq!(PgBindValue::Json(Value::Null).pg_type(), <Value as Type<Postgres>>::type_info());
    }
}
