//! Environment-driven configuration.
//!
//! A handful of `std::env` reads — this scale of configuration doesn't
//! warrant a config crate.

use std::env;
use std::time::Duration;

/// Everything `cli`'s `main` needs to wire a [`crate::db::postgres::PgStore`]
/// and run the scheduler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// When `false`, the W9-reminder job is left out
    /// of the default task table.
    pub enable_w9_reminders: bool,
    pub scheduler_poll_interval: Duration,
}

impl EngineConfig {
    /// Read configuration from the process environment.
    ///
    /// `DATABASE_URL` is required; every other variable has a sane default
    /// so a bare `extrashifty-engine` invocation against a local Postgres
    /// works without a `.env` file.
    pub fn from_env() -> Result<Self, EngineConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| EngineConfigError::Missing("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let enable_w9_reminders = env::var("ENABLE_W9_REMINDERS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let scheduler_poll_interval = env::var("SCHEDULER_POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            database_url,
            database_max_connections,
            enable_w9_reminders,
            scheduler_poll_interval,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}
