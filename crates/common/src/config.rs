//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// Upper bound on pooled connections handed out to units of work
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection before failing
    pub acquire_timeout_secs: u64,

    /// Runtime configuration
    pub rust_log: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                env::var("DATABASE_MAX_CONNECTIONS").ok(),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            acquire_timeout_secs: parse_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECS").ok(),
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,

            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "talentbase=info".to_string()),
        };

        if config.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        Ok(config)
    }

    /// Configuration pointing at an explicit database, with defaults for the rest
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            rust_log: "talentbase=info".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a number, got {value:?}")),
    }
}
