// src/domain/entity.rs
//
// Entity contracts shared by the persistence context and repositories.

use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::Debug;
use uuid::Uuid;

use super::audit::Tracked;

/// Primary key types an entity can be keyed by.
pub trait EntityId: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Owned SQL value bound wherever the key is compared.
    fn to_sql_value(&self) -> Value;
}

impl EntityId for Uuid {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl EntityId for i64 {
    fn to_sql_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl EntityId for String {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

/// A persisted record mapped onto a single table.
///
/// `COLUMNS` lists every non-key column and `values` must return one value
/// per column in the same order. Tracked entities include `created` and
/// `updated` among their columns (see [`super::Audit::COLUMNS`]).
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: EntityId;

    const TABLE: &'static str;
    const KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &Self::Id;

    fn values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Audit capability. Entities without audit columns keep the default.
    fn tracked(&self) -> Option<&dyn Tracked> {
        None
    }

    fn tracked_mut(&mut self) -> Option<&mut dyn Tracked> {
        None
    }

    fn has_column(name: &str) -> bool {
        name == Self::KEY || Self::COLUMNS.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_key_binds_as_text() {
        let id = Uuid::nil();
        assert_eq!(
            id.to_sql_value(),
            Value::Text("00000000-0000-0000-0000-000000000000".to_string())
        );
    }

    #[test]
    fn test_integer_and_string_keys() {
        assert_eq!(7i64.to_sql_value(), Value::Integer(7));
        assert_eq!("k".to_string().to_sql_value(), Value::Text("k".to_string()));
    }
}
