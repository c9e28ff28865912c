use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::audit::{Audit, Tracked};
use crate::domain::entity::Entity;

/// Identity user record (`users` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    /// Internal immutable identifier
    pub id: Uuid,

    /// Login name
    pub user_name: String,

    /// Email as entered by the user
    pub email: String,

    /// Lookup form of `email`, see [`AppUser::normalize_email`]
    pub normalized_email: String,

    pub email_confirmed: bool,

    audit: Audit,
}

impl AppUser {
    /// Create a new, not yet persisted user
    pub fn new(user_name: String, email: String) -> Self {
        let normalized_email = Self::normalize_email(&email);
        Self {
            id: Uuid::new_v4(),
            user_name,
            email,
            normalized_email,
            email_confirmed: false,
            audit: Audit::default(),
        }
    }

    /// Change the email; confirmation has to be redone
    pub fn change_email(&mut self, email: String) {
        self.normalized_email = Self::normalize_email(&email);
        self.email = email;
        self.email_confirmed = false;
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_uppercase()
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }
}

impl Tracked for AppUser {
    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

impl Entity for AppUser {
    type Id = Uuid;

    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "user_name",
        "email",
        "normalized_email",
        "email_confirmed",
        "created",
        "updated",
    ];

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![
            Value::Text(self.user_name.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.normalized_email.clone()),
            Value::Integer(self.email_confirmed as i64),
        ];
        values.extend(self.audit.values());
        values
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id = Uuid::parse_str(&row.get::<_, String>("id")?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        Ok(AppUser {
            id,
            user_name: row.get("user_name")?,
            email: row.get("email")?,
            normalized_email: row.get("normalized_email")?,
            email_confirmed: row.get("email_confirmed")?,
            audit: Audit::from_row(row)?,
        })
    }

    fn tracked(&self) -> Option<&dyn Tracked> {
        Some(self)
    }

    fn tracked_mut(&mut self) -> Option<&mut dyn Tracked> {
        Some(self)
    }
}

impl std::fmt::Display for AppUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.user_name, self.email)
    }
}
