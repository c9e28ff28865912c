// src/db/change_tracker.rs
//
// Staged, not yet flushed, entity changes of one unit of work.
//
// Entries are kept in staging order and keyed by (table, primary key):
// - Added then modified stays Added, carrying the newer values
// - Added then deleted is detached, nothing reaches the store
// - Any other re-stage replaces the earlier entry in place

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Transaction};
use std::any::Any;

use crate::db::query::quote;
use crate::domain::{Entity, EntityId};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

/// Type-erased staged entry, so one tracker can hold every entity type.
pub(crate) trait StagedEntry: Send {
    fn table(&self) -> &'static str;

    fn key(&self) -> Value;

    fn state(&self) -> EntityState;

    fn set_state(&mut self, state: EntityState);

    /// Stamp audit timestamps according to the entry state.
    fn stamp(&mut self, now: DateTime<Utc>);

    /// Apply the entry inside `tx`, returning affected rows.
    fn write(&self, tx: &Transaction<'_>) -> AppResult<usize>;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct EntityEntry<E: Entity> {
    state: EntityState,
    entity: E,
}

impl<E: Entity> EntityEntry<E> {
    fn new(state: EntityState, entity: E) -> Self {
        Self { state, entity }
    }

    fn insert(&self, tx: &Transaction<'_>) -> AppResult<usize> {
        let mut columns = vec![quote(E::KEY)];
        columns.extend(E::COLUMNS.iter().map(|c| quote(c)));
        let placeholders = vec!["?"; columns.len()].join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(E::TABLE),
            columns.join(", "),
            placeholders
        );

        let mut params = vec![self.key()];
        params.extend(self.entity.values());

        Ok(tx.execute(&sql, params_from_iter(params))?)
    }

    fn update(&self, tx: &Transaction<'_>) -> AppResult<usize> {
        let assignments: Vec<String> = E::COLUMNS
            .iter()
            .map(|c| format!("{} = ?", quote(c)))
            .collect();

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(E::TABLE),
            assignments.join(", "),
            quote(E::KEY)
        );

        let mut params = self.entity.values();
        params.push(self.key());

        let affected = tx.execute(&sql, params_from_iter(params))?;
        self.expect_row(affected)
    }

    fn delete(&self, tx: &Transaction<'_>) -> AppResult<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(E::TABLE),
            quote(E::KEY)
        );

        let affected = tx.execute(&sql, params_from_iter([self.key()]))?;
        self.expect_row(affected)
    }

    fn expect_row(&self, affected: usize) -> AppResult<usize> {
        if affected == 0 {
            return Err(AppError::ConcurrencyConflict {
                table: E::TABLE,
                id: format!("{:?}", self.entity.id()),
            });
        }
        Ok(affected)
    }
}

impl<E: Entity> StagedEntry for EntityEntry<E> {
    fn table(&self) -> &'static str {
        E::TABLE
    }

    fn key(&self) -> Value {
        self.entity.id().to_sql_value()
    }

    fn state(&self) -> EntityState {
        self.state
    }

    fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        let Some(tracked) = self.entity.tracked_mut() else {
            return;
        };
        match self.state {
            EntityState::Added => tracked.audit_mut().stamp_created(now),
            EntityState::Modified => tracked.audit_mut().stamp_updated(now),
            EntityState::Deleted | EntityState::Unchanged => {}
        }
    }

    fn write(&self, tx: &Transaction<'_>) -> AppResult<usize> {
        match self.state {
            EntityState::Added => self.insert(tx),
            EntityState::Modified => self.update(tx),
            EntityState::Deleted => self.delete(tx),
            EntityState::Unchanged => Ok(0),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct ChangeTracker {
    entries: Vec<Box<dyn StagedEntry>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage<E: Entity>(&mut self, state: EntityState, entity: E) {
        self.merge(Box::new(EntityEntry::new(state, entity)));
    }

    fn merge(&mut self, mut entry: Box<dyn StagedEntry>) {
        let table = entry.table();
        let key = entry.key();
        let position = self
            .entries
            .iter()
            .position(|staged| staged.table() == table && staged.key() == key);

        let Some(index) = position else {
            self.entries.push(entry);
            return;
        };

        match (self.entries[index].state(), entry.state()) {
            (EntityState::Added, EntityState::Deleted) => {
                self.entries.remove(index);
            }
            (EntityState::Added, _) => {
                entry.set_state(EntityState::Added);
                self.entries[index] = entry;
            }
            _ => {
                self.entries[index] = entry;
            }
        }
    }

    /// Staged entities of one type, in staging order.
    pub fn entries<E: Entity>(&self) -> Vec<(EntityState, E)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.as_any().downcast_ref::<EntityEntry<E>>())
            .map(|entry| (entry.state, entry.entity.clone()))
            .collect()
    }

    /// True when at least one entry would write to the store.
    pub fn has_changes(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.state() != EntityState::Unchanged)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn take(&mut self) -> Vec<Box<dyn StagedEntry>> {
        std::mem::take(&mut self.entries)
    }

    /// Put entries back ahead of anything staged since they were taken.
    /// Newer entries for the same key merge over the restored ones.
    pub(crate) fn restore(&mut self, entries: Vec<Box<dyn StagedEntry>>) {
        let newer = std::mem::replace(&mut self.entries, entries);
        for entry in newer {
            self.merge(entry);
        }
    }
}
