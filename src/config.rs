// src/config.rs
//
// Runtime options read from the environment.
//
// Loading policy lives with the host application; these structs only
// name the settings and provide `from_env` for the common case.

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

pub const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 15;

/// Application identity used in outgoing emails
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationOptions {
    pub application_name: String,
    /// Public root URL, without trailing slash
    pub application_root: String,
}

impl ApplicationOptions {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            application_name: required("APP_NAME")?,
            application_root: required("APP_ROOT")?
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// SendGrid transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct SendGridOptions {
    pub api_key: String,
    pub from_address: String,
    #[serde(default = "default_sendgrid_base_url")]
    pub base_url: String,
}

impl SendGridOptions {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            api_key: required("SENDGRID_API_KEY")?,
            from_address: required("SENDGRID_FROM_ADDRESS")?,
            base_url: env::var("SENDGRID_BASE_URL").unwrap_or_else(|_| default_sendgrid_base_url()),
        })
    }
}

/// SQLite database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseOptions {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// `DATABASE_PATH` falls back to `{APP_DATA}/appcore/appcore.db`
    pub fn from_env() -> AppResult<Self> {
        let path = match env::var("DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_database_path()?,
        };

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse::<u32>().map_err(|e| {
                AppError::Config(format!("DATABASE_MAX_CONNECTIONS: {}", e))
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            path,
            max_connections,
        })
    }
}

/// Get the default database file path
///
/// Path structure: {APP_DATA}/appcore/appcore.db
pub fn default_database_path() -> AppResult<PathBuf> {
    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Could not determine app data directory".to_string()))?;

    Ok(app_data_dir.join("appcore").join("appcore.db"))
}

fn required(key: &str) -> AppResult<String> {
    env::var(key).map_err(|e| AppError::Config(format!("{}: {}", key, e)))
}

fn default_sendgrid_base_url() -> String {
    DEFAULT_SENDGRID_BASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}
