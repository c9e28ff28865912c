// src/lib.rs
// AppCore - repository, unit of work and notification slice of a web backend
//
// Architecture:
// - Domain: entity contracts and the optional audit capability
// - Persistence: a unit-of-work context that stamps audit timestamps on save
// - Repositories: generic CRUD facades with per-call query shaping
// - Notifications: password reset emails through SendGrid
//
// Consumed as a library by the HTTP layer; it owns no server or CLI.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod integrations;
pub mod repositories;
pub mod services;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{validate_user, AppUser, Audit, DomainError, DomainResult, Entity, EntityId, Tracked};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Configuration
// ============================================================================

pub use config::{ApplicationOptions, DatabaseOptions, SendGridOptions};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{
    create_connection_pool, initialize_database, ConnectionPool, DbContext, EntityState, Query,
    QueryInject,
};

// ============================================================================
// PUBLIC API - Repositories
// ============================================================================

pub use repositories::{BaseRepository, Repository, UserRepository};

// ============================================================================
// PUBLIC API - Notifications
// ============================================================================

pub use integrations::SendGridClient;
pub use services::{EmailService, PasswordResetService, SendGridEmailService};

/// Cancellation signal accepted by [`DbContext::save_changes`].
pub use tokio_util::sync::CancellationToken;
