// src/db/context.rs
//
// Persistence context: one unit of work over the connection pool.
//
// PRINCIPLES:
// - Writes are staged in the change tracker and flushed only by save
// - Audit timestamps are stamped on save, before the physical write
// - One SQLite transaction per save; failures roll back and propagate
// - One context per unit of work; never shared by concurrent callers

use chrono::Utc;
use rusqlite::params_from_iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::db::change_tracker::{ChangeTracker, EntityState, StagedEntry};
use crate::db::connection::{get_connection, ConnectionPool};
use crate::db::query::{quote, Query};
use crate::domain::{Entity, EntityId};
use crate::error::{AppError, AppResult};

pub struct DbContext {
    pool: Arc<ConnectionPool>,
    tracker: Mutex<ChangeTracker>,
}

impl DbContext {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            tracker: Mutex::new(ChangeTracker::new()),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    // ========================================================================
    // STAGING
    // ========================================================================

    /// Stage `entity` for insertion.
    pub fn add<E: Entity>(&self, entity: E) {
        self.attach(EntityState::Added, entity);
    }

    /// Stage `entity` as a modification of the stored row with the same key.
    pub fn update<E: Entity>(&self, entity: E) {
        self.attach(EntityState::Modified, entity);
    }

    /// Stage removal of the stored row with the entity's key.
    pub fn remove<E: Entity>(&self, entity: E) {
        self.attach(EntityState::Deleted, entity);
    }

    pub fn attach<E: Entity>(&self, state: EntityState, entity: E) {
        log::trace!("staging {:?} on {}", state, E::TABLE);
        self.tracker().stage(state, entity);
    }

    /// Staged entities of type `E` with their change kind.
    pub fn entries<E: Entity>(&self) -> Vec<(EntityState, E)> {
        self.tracker().entries::<E>()
    }

    pub fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }

    pub fn pending_count(&self) -> usize {
        self.tracker().len()
    }

    /// Forget every staged entry, e.g. after `save_changes(false, ..)`.
    pub fn accept_all_changes(&self) {
        self.tracker().clear();
    }

    // ========================================================================
    // READS (store only, staged changes are not visible)
    // ========================================================================

    pub async fn query<E: Entity>(&self, query: Query<E>) -> AppResult<Vec<E>> {
        let (sql, params) = query.to_select_sql()?;

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), E::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn first<E: Entity>(&self, query: Query<E>) -> AppResult<Option<E>> {
        Ok(self.query(query.first_only()).await?.into_iter().next())
    }

    pub async fn count<E: Entity>(&self) -> AppResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(E::TABLE));

        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    pub async fn exists<E: Entity>(&self, id: &E::Id) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            quote(E::TABLE),
            quote(E::KEY)
        );
        let key = id.to_sql_value();

        self.with_connection(move |conn| {
            let exists: bool = conn.query_row(&sql, [key], |row| row.get(0))?;
            Ok(exists)
        })
        .await
    }

    // ========================================================================
    // UNIT OF WORK
    // ========================================================================

    /// Flush every staged change in one transaction.
    ///
    /// Before the write, tracked entities staged as added get `created`
    /// stamped and those staged as modified get `updated` stamped; nothing
    /// else is touched. Returns the number of affected rows.
    ///
    /// With `accept_all_changes` the tracker is cleared on success, otherwise
    /// the (stamped) entries stay staged until [`Self::accept_all_changes`].
    /// On failure or cancellation the transaction is rolled back, the entries
    /// are put back and the error is returned as is.
    pub async fn save_changes(
        &self,
        accept_all_changes: bool,
        cancellation: &CancellationToken,
    ) -> AppResult<usize> {
        let mut entries = self.tracker().take();
        if entries.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        for entry in entries.iter_mut() {
            entry.stamp(now);
        }

        log::debug!("saving {} staged change(s)", entries.len());

        let pool = Arc::clone(&self.pool);
        let cancellation = cancellation.clone();
        // the entries must come back even if a write panics
        let (entries, result) = tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                write_entries(&pool, &entries, &cancellation)
            }))
            .unwrap_or_else(|_| Err(AppError::Other("write panicked during save".to_string())));
            (entries, result)
        })
        .await?;

        match result {
            Ok(affected) => {
                if !accept_all_changes {
                    self.tracker().restore(entries);
                }
                log::debug!("unit of work committed, {} row(s) affected", affected);
                Ok(affected)
            }
            Err(err) => {
                self.tracker().restore(entries);
                Err(err)
            }
        }
    }

    pub async fn save(&self) -> AppResult<usize> {
        self.save_changes(true, &CancellationToken::new()).await
    }

    fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn with_connection<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> AppResult<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let conn = get_connection(&pool)?;
            f(&*conn)
        })
        .await?
    }
}

fn write_entries(
    pool: &ConnectionPool,
    entries: &[Box<dyn StagedEntry>],
    cancellation: &CancellationToken,
) -> AppResult<usize> {
    if cancellation.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let mut conn = get_connection(pool)?;
    let tx = conn.transaction()?;

    let mut affected = 0;
    for entry in entries {
        affected += entry.write(&tx)?;
    }

    // dropping `tx` without commit rolls back
    if cancellation.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    tx.commit()?;
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{test_pool, Note};
    use crate::domain::AppUser;

    fn user(name: &str) -> AppUser {
        AppUser::new(name.to_string(), format!("{}@example.com", name))
    }

    #[tokio::test]
    async fn test_save_with_nothing_staged_is_a_no_op() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);

        assert_eq!(ctx.save().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_added_tracked_entity_gets_created_only() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        let u = user("ana");

        let before = Utc::now();
        ctx.add(u.clone());
        assert_eq!(ctx.save().await.unwrap(), 1);
        assert!(!ctx.has_changes());

        let stored = ctx.first(Query::<AppUser>::new().with_key(&u.id)).await.unwrap().unwrap();
        let created = stored.audit().created().expect("created stamped");
        assert!(created >= before);
        assert!(stored.audit().updated().is_none());
        assert_eq!(stored.user_name, "ana");
    }

    #[tokio::test]
    async fn test_modified_tracked_entity_gets_updated_and_keeps_created() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        let u = user("ana");
        ctx.add(u.clone());
        ctx.save().await.unwrap();

        let mut stored = ctx.first(Query::<AppUser>::new().with_key(&u.id)).await.unwrap().unwrap();
        let created = stored.audit().created();
        stored.email_confirmed = true;

        let before = Utc::now();
        ctx.update(stored);
        assert_eq!(ctx.save().await.unwrap(), 1);

        let reloaded = ctx.first(Query::<AppUser>::new().with_key(&u.id)).await.unwrap().unwrap();
        assert!(reloaded.email_confirmed);
        assert_eq!(reloaded.audit().created(), created);
        assert!(reloaded.audit().updated().unwrap() >= before);
    }

    #[tokio::test]
    async fn test_untracked_entity_passes_through_unmodified() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        let note = Note::new(1, "X");

        ctx.add(note.clone());
        ctx.save().await.unwrap();

        let stored = ctx.query(Query::<Note>::new()).await.unwrap();
        assert_eq!(stored, vec![note]);
    }

    #[tokio::test]
    async fn test_save_without_accepting_keeps_stamped_entries() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        ctx.add(user("ana"));

        ctx.save_changes(false, &CancellationToken::new()).await.unwrap();

        let entries = ctx.entries::<AppUser>();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, EntityState::Added);
        assert!(entries[0].1.audit().created().is_some());

        ctx.accept_all_changes();
        assert_eq!(ctx.pending_count(), 0);
        assert_eq!(ctx.count::<AppUser>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back_whole_unit_and_restores_entries() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        let first = user("ana");
        let mut duplicate = user("bea");
        duplicate.change_email("ANA@example.com".to_string());

        ctx.add(first);
        ctx.add(duplicate);

        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "got {:?}", err);
        assert_eq!(ctx.count::<AppUser>().await.unwrap(), 0);
        assert_eq!(ctx.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_save_writes_nothing() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        ctx.add(Note::new(1, "X"));

        let token = CancellationToken::new();
        token.cancel();

        let err = ctx.save_changes(true, &token).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(ctx.count::<Note>().await.unwrap(), 0);
        assert_eq!(ctx.pending_count(), 1);
    }

    /// Note-shaped entity whose column values cannot be produced.
    #[derive(Clone)]
    struct Broken(i64);

    impl Entity for Broken {
        type Id = i64;

        const TABLE: &'static str = "notes";
        const COLUMNS: &'static [&'static str] = &["name", "body"];

        fn id(&self) -> &i64 {
            &self.0
        }

        fn values(&self) -> Vec<rusqlite::types::Value> {
            panic!("no values for {}", self.0)
        }

        fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
            Ok(Broken(row.get("id")?))
        }
    }

    #[tokio::test]
    async fn test_panicking_write_rolls_back_and_keeps_entries() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        ctx.add(Note::new(1, "X"));
        ctx.add(Broken(2));

        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, AppError::Other(_)));
        assert_eq!(ctx.pending_count(), 2);
        assert_eq!(ctx.count::<Note>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_of_vanished_row_is_a_concurrency_conflict() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);

        ctx.update(Note::new(99, "ghost"));

        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrencyConflict { table: "notes", .. }));
    }

    #[tokio::test]
    async fn test_exists_and_count() {
        let (_dir, pool) = test_pool();
        let ctx = DbContext::new(pool);
        ctx.add(Note::new(1, "X"));
        ctx.add(Note::new(2, "Y"));

        assert_eq!(ctx.count::<Note>().await.unwrap(), 0);
        ctx.save().await.unwrap();

        assert_eq!(ctx.count::<Note>().await.unwrap(), 2);
        assert!(ctx.exists::<Note>(&1).await.unwrap());
        assert!(!ctx.exists::<Note>(&3).await.unwrap());
    }
}
