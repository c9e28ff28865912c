// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod email_service;
pub mod password_reset_service;

pub use email_service::{EmailService, SendGridEmailService};

pub use password_reset_service::PasswordResetService;
