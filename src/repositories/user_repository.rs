// src/repositories/user_repository.rs

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{DbContext, Query, QueryInject};
use crate::domain::{validate_user, AppUser};
use crate::error::AppResult;
use crate::repositories::base_repository::{BaseRepository, Repository};

/// Repository for identity users, with lookups the identity flows need.
pub struct UserRepository {
    base: BaseRepository<AppUser>,
}

impl UserRepository {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self {
            base: BaseRepository::new(context),
        }
    }

    /// Case-insensitive lookup on the normalized email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<AppUser>> {
        let normalized = AppUser::normalize_email(email);
        let by_email: &QueryInject<AppUser> = &move |q: Query<AppUser>| {
            q.where_eq("normalized_email", normalized.clone()).limit(1)
        };

        Ok(self.base.get_all(Some(by_email)).await?.into_iter().next())
    }

    pub async fn list_unconfirmed(&self) -> AppResult<Vec<AppUser>> {
        let unconfirmed: &QueryInject<AppUser> =
            &|q: Query<AppUser>| q.where_eq("email_confirmed", false).order_by("user_name");

        self.base.get_all(Some(unconfirmed)).await
    }
}

#[async_trait]
impl Repository<AppUser> for UserRepository {
    async fn contains(&self, id: &Uuid) -> AppResult<bool> {
        self.base.contains(id).await
    }

    async fn count(&self) -> AppResult<usize> {
        self.base.count().await
    }

    async fn get(&self, id: &Uuid, query: Option<&QueryInject<AppUser>>) -> AppResult<Option<AppUser>> {
        self.base.get(id, query).await
    }

    async fn get_all(&self, query: Option<&QueryInject<AppUser>>) -> AppResult<Vec<AppUser>> {
        self.base.get_all(query).await
    }

    async fn post(&self, user: AppUser) -> AppResult<()> {
        validate_user(&user)?;
        self.base.post(user).await
    }

    async fn put(&self, user: AppUser) -> AppResult<()> {
        validate_user(&user)?;
        self.base.put(user).await
    }

    async fn delete(&self, id: &Uuid) -> AppResult<AppUser> {
        self.base.delete(id).await
    }

    async fn save(&self) -> AppResult<usize> {
        self.base.save().await
    }
}
