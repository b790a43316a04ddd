//! Configuration module for the notices service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Which content store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Persistent SQLite store
    Sqlite,
    /// In-process store, lost on restart
    Memory,
}

impl StoreKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Some(StoreKind::Sqlite),
            "memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Content store backend
    pub store: StoreKind,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Administrator email; the admin console is disabled when unset
    pub admin_email: Option<String>,
    /// Administrator password
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let store_raw = env::var("NOTICES_STORE").unwrap_or_else(|_| "sqlite".to_string());
        let store = StoreKind::from_str(&store_raw).ok_or_else(|| {
            AppError::Config(format!(
                "Invalid NOTICES_STORE '{}': expected 'sqlite' or 'memory'",
                store_raw
            ))
        })?;

        let db_path = env::var("NOTICES_DB_PATH")
            .unwrap_or_else(|_| "./data/notices.sqlite".to_string())
            .into();

        let bind_raw =
            env::var("NOTICES_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| {
            AppError::Config(format!("Invalid NOTICES_BIND_ADDR format: {}", bind_raw))
        })?;

        let log_level = env::var("NOTICES_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin_email = env::var("NOTICES_ADMIN_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let admin_password = env::var("NOTICES_ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            store,
            db_path,
            bind_addr,
            log_level,
            admin_email,
            admin_password,
        })
    }

    /// Admin credentials, if both halves are configured.
    pub fn admin_credentials(&self) -> Option<(String, String)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.clone(), password.clone())),
            _ => None,
        }
    }
}
