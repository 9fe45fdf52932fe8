//! PostgreSQL persistence for ingested analytics records.
//!
//! - [`create_pool`] builds the connection pool from an explicit [`DbConfig`].
//! - [`schema::ensure_schema`] idempotently creates tables and indexes.
//! - [`repositories`] hold the parameterized bulk inserts and account
//!   maintenance queries.

use std::time::Duration;

use apilytics_core::config::{env_or, require_env, ConfigError};
use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod schema;

pub use schema::ensure_schema;

pub type DbPool = sqlx::PgPool;

/// Database connection settings, passed into [`create_pool`] once at startup.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    /// Upper bound on open connections (default: `10`).
    pub max_connections: u32,
    /// Idle connections are closed after this long (default: `5s`), so a
    /// flush worker pausing between batches does not pin a connection.
    pub idle_timeout: Duration,
    /// How long a flush waits for a free connection (default: `30s`).
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            idle_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Load from environment variables.
    ///
    /// | Env Var                | Default  |
    /// |------------------------|----------|
    /// | `DATABASE_URL`         | required |
    /// | `DB_MAX_CONNECTIONS`   | `10`     |
    /// | `DB_IDLE_TIMEOUT_SECS` | `5`      |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(require_env("DATABASE_URL")?);
        Ok(Self {
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            idle_timeout: Duration::from_secs(env_or(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )?),
            acquire_timeout: Duration::from_secs(env_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            ..defaults
        })
    }
}

/// Create a connection pool.
///
/// The pool keeps no minimum of warm connections: each flush acquires one,
/// and connections left idle past `idle_timeout` are closed.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .idle_timeout(Some(config.idle_timeout))
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
