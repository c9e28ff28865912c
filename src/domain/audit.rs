// src/domain/audit.rs
//
// Audit timestamps maintained by the persistence context.
//
// INVARIANTS:
// - `created` is stamped once, when the entity is first inserted
// - `updated` is stamped on every later modification, never before `created`
// - Caller code cannot set either value; only `DbContext` stamps them

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Optional capability of entities whose table carries audit columns.
pub trait Tracked {
    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
}

impl Audit {
    pub const COLUMNS: [&'static str; 2] = ["created", "updated"];

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    /// First insert: `created` is now and any `updated` the caller carried is dropped.
    pub(crate) fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created = Some(now);
        self.updated = None;
    }

    pub(crate) fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated = Some(match self.created {
            Some(created) if created > now => created,
            _ => now,
        });
    }

    /// Values for the `created`, `updated` columns, in that order.
    pub fn values(&self) -> [Value; 2] {
        [to_value(self.created), to_value(self.updated)]
    }

    /// Read the audit columns from a row selected by column name.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            created: parse_timestamp(row.get("created")?)?,
            updated: parse_timestamp(row.get("updated")?)?,
        })
    }
}

fn to_value(timestamp: Option<DateTime<Utc>>) -> Value {
    match timestamp {
        Some(dt) => Value::Text(dt.to_rfc3339()),
        None => Value::Null,
    }
}

fn parse_timestamp(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    })
    .transpose()
}
