// src/services/password_reset_service.rs
use reqwest::StatusCode;
use std::sync::Arc;

use crate::config::ApplicationOptions;
use crate::error::AppResult;
use crate::repositories::UserRepository;
use crate::services::email_service::EmailService;

/// Delivers password reset links. Token issuance belongs to the identity
/// provider; this service only finds the user and sends the email.
pub struct PasswordResetService {
    users: Arc<UserRepository>,
    email: Arc<dyn EmailService>,
    application: ApplicationOptions,
}

impl PasswordResetService {
    pub fn new(
        users: Arc<UserRepository>,
        email: Arc<dyn EmailService>,
        application: ApplicationOptions,
    ) -> Self {
        Self {
            users,
            email,
            application,
        }
    }

    pub fn subject(&self) -> String {
        format!("{} Password Reset", self.application.application_name)
    }

    /// `Ok(None)` when no user has `email`; nothing is sent in that case.
    pub async fn send_reset_link(
        &self,
        email: &str,
        reset_token: &str,
    ) -> AppResult<Option<StatusCode>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            log::debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let body = self
            .email
            .create_reset_email_body(reset_token, &user.id.to_string());
        let status = self
            .email
            .send_email(&user.email, &self.subject(), &body)
            .await?;

        Ok(Some(status))
    }
}
