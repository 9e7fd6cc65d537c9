//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

use crate::server::ServerSettings;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_HOST` (optional): bind address, defaults to 0.0.0.0
/// - `SERVER_PORT` (optional): TCP port, defaults to 5000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `READ_TIMEOUT_SECS` (optional): bound on reading a request, defaults to 5
/// - `STORE_TIMEOUT_SECS` (optional): bound on one store operation, defaults to 5
/// - `CURRENCY_SYMBOL` (optional): prefix for amounts in history reports, defaults to ₹
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_host")]
    pub server_host: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub store_timeout_secs: u64,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Address the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            store_timeout: self.store_timeout(),
            currency_symbol: self.currency_symbol.clone(),
        }
    }
}
