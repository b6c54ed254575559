//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use docchat_core::completion::{DEFAULT_MODEL, DEFAULT_TURN_BUDGET};
use docchat_core::resolver::DRIVE_DOWNLOAD_BASE;
use docchat_core::ChatMode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub database_path: PathBuf,
    pub temp_dir: PathBuf,
    pub claude_api_key: Option<String>,
    pub claude_model: String,
    pub claude_api_base_url: String,
    pub drive_download_base_url: String,
    pub chat_mode: ChatMode,
    pub chat_budget: Duration,
    /// Hides `details` in error bodies.
    pub production: bool,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS", "0.0.0.0:3001");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let production = var("APP_ENV", "development").eq_ignore_ascii_case("production");
        let cors_origin = var("CORS_ORIGIN", "http://localhost:5173");

        // --- Storage Locations ---
        let database_path = PathBuf::from(var("DATABASE_PATH", "./database.json"));
        let temp_dir = PathBuf::from(var("TEMP_DIR", "./temp"));

        // --- AI Provider (the key is optional here; chat reports it per request) ---
        let claude_api_key = lookup("CLAUDE_API_KEY").filter(|key| !key.trim().is_empty());
        let claude_model = var("CLAUDE_MODEL", DEFAULT_MODEL);
        let claude_api_base_url = var("CLAUDE_API_BASE_URL", "https://api.anthropic.com/v1");
        let drive_download_base_url = var("DRIVE_DOWNLOAD_BASE_URL", DRIVE_DOWNLOAD_BASE);

        // --- Chat Behaviour ---
        let chat_mode = var("CHAT_MODE", "inline")
            .parse::<ChatMode>()
            .map_err(|e| ConfigError::InvalidValue("CHAT_MODE".to_string(), e))?;

        let chat_budget = match lookup("CHAT_BUDGET_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidValue("CHAT_BUDGET_SECS".to_string(), e.to_string()))?,
            None => DEFAULT_TURN_BUDGET,
        };

        Ok(Self {
            bind_address,
            log_level,
            database_path,
            temp_dir,
            claude_api_key,
            claude_model,
            claude_api_base_url,
            drive_download_base_url,
            chat_mode,
            chat_budget,
            production,
            cors_origin,
        })
    }
}
