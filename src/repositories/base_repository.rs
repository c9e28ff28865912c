// src/repositories/base_repository.rs
//
// Generic CRUD facade over one entity type.
//
// RULES:
// - Reads go straight to the store through the context
// - Writes are only staged; nothing reaches the store before save
// - put/delete load the stored row first so a missing id fails early

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::db::{DbContext, EntityState, Query, QueryInject};
use crate::domain::Entity;
use crate::error::{AppError, AppResult};

const INVALID_PUT: &str =
    "Invalid PUT operation, no entity exists in the database with the specified ID.";
const INVALID_DELETE: &str =
    "Invalid DELETE operation, no entity exists in the database with the specified ID.";

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn contains(&self, id: &E::Id) -> AppResult<bool>;

    async fn count(&self) -> AppResult<usize>;

    /// First entity with `id` among the rows the shaping function keeps.
    async fn get(&self, id: &E::Id, query: Option<&QueryInject<E>>) -> AppResult<Option<E>>;

    async fn get_all(&self, query: Option<&QueryInject<E>>) -> AppResult<Vec<E>>;

    async fn post(&self, entity: E) -> AppResult<()>;

    /// Fails with `AppError::InvalidOperation` when no stored entity has the id.
    async fn put(&self, entity: E) -> AppResult<()>;

    /// Returns the entity as stored before removal.
    async fn delete(&self, id: &E::Id) -> AppResult<E>;

    async fn save(&self) -> AppResult<usize>;
}

pub struct BaseRepository<E: Entity> {
    context: Arc<DbContext>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> BaseRepository<E> {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    fn modified_query(query: Option<&QueryInject<E>>) -> Query<E> {
        Query::new().apply(query)
    }
}

impl<E: Entity> Clone for BaseRepository<E> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.context))
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for BaseRepository<E> {
    async fn contains(&self, id: &E::Id) -> AppResult<bool> {
        self.context.exists::<E>(id).await
    }

    async fn count(&self) -> AppResult<usize> {
        self.context.count::<E>().await
    }

    async fn get(&self, id: &E::Id, query: Option<&QueryInject<E>>) -> AppResult<Option<E>> {
        let query = Self::modified_query(query).with_key(id);
        self.context.first(query).await
    }

    async fn get_all(&self, query: Option<&QueryInject<E>>) -> AppResult<Vec<E>> {
        self.context.query(Self::modified_query(query)).await
    }

    async fn post(&self, entity: E) -> AppResult<()> {
        self.context.add(entity);
        Ok(())
    }

    async fn put(&self, entity: E) -> AppResult<()> {
        let existing = self
            .get(entity.id(), None)
            .await?
            .ok_or_else(|| AppError::invalid_operation(INVALID_PUT))?;

        // Audit values belong to the stored row, not to the caller.
        let mut incoming = entity;
        if let (Some(stored), Some(target)) = (existing.tracked(), incoming.tracked_mut()) {
            *target.audit_mut() = *stored.audit();
        }

        if incoming.values() == existing.values() {
            self.context.attach(EntityState::Unchanged, incoming);
        } else {
            self.context.update(incoming);
        }
        Ok(())
    }

    async fn delete(&self, id: &E::Id) -> AppResult<E> {
        let existing = self
            .get(id, None)
            .await?
            .ok_or_else(|| AppError::invalid_operation(INVALID_DELETE))?;

        self.context.remove(existing.clone());
        Ok(existing)
    }

    async fn save(&self) -> AppResult<usize> {
        self.context.save().await
    }
}
