//! Identity user invariants:
//!
//! 1. User name cannot be empty
//! 2. Email must contain a single `@` with text on both sides
//! 3. `normalized_email` always mirrors `email`

pub mod entity;

pub use entity::AppUser;

use crate::domain::{DomainError, DomainResult};

/// Validates AppUser invariants
pub fn validate_user(user: &AppUser) -> DomainResult<()> {
    if user.user_name.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "User name cannot be empty".to_string(),
        ));
    }

    let mut parts = user.email.trim().split('@');
    let valid_email = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
    );
    if !valid_email {
        return Err(DomainError::InvariantViolation(format!(
            "Invalid email address: {}",
            user.email
        )));
    }

    if user.normalized_email != AppUser::normalize_email(&user.email) {
        return Err(DomainError::InvariantViolation(
            "Normalized email is out of sync".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_passes() {
        let user = AppUser::new("ana".to_string(), "ana@example.com".to_string());
        assert!(validate_user(&user).is_ok());
        assert_eq!(user.normalized_email, "ANA@EXAMPLE.COM");
    }

    #[test]
    fn test_empty_user_name_rejected() {
        let user = AppUser::new("  ".to_string(), "ana@example.com".to_string());
        assert!(matches!(
            validate_user(&user),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_malformed_email_rejected() {
        for email in ["ana", "@example.com", "ana@", "a@b@c"] {
            let user = AppUser::new("ana".to_string(), email.to_string());
            assert!(validate_user(&user).is_err(), "{} should be rejected", email);
        }
    }

    #[test]
    fn test_change_email_resets_confirmation() {
        let mut user = AppUser::new("ana".to_string(), "ana@example.com".to_string());
        user.email_confirmed = true;
        user.change_email(" Ana@New.org ".to_string());
        assert!(!user.email_confirmed);
        assert_eq!(user.normalized_email, "ANA@NEW.ORG");
        assert!(validate_user(&user).is_ok());
    }
}
