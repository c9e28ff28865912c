// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Repositories are DUMB facades over the persistence context
// - NO business logic
// - Concrete repositories only validate the entity before staging it
// - Writes are staged; only save flushes them

pub mod base_repository;
pub mod user_repository;


pub use base_repository::{BaseRepository, Repository};
pub use user_repository::UserRepository;

pub use crate::db::{Comparison, Query, QueryInject, SortOrder};
