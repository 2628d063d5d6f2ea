//! ExtraShifty engine daemon.
//!
//! Wires a real `PgStore` to Postgres, constructs the scheduler's job table
//! via [`engine::scheduler::default_tasks`], and runs it forever. No HTTP
//! surface is served here — this is the process a deployment points a
//! liveness probe at and that a separate API layer would run alongside.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use engine::clock::{Clock, SystemClock};
use engine::config::EngineConfig;
use engine::db::postgres::PgStore;
use engine::db::Store;
use engine::notify::{NotificationSink, Notice};
use engine::processor::{PaymentProcessor, SandboxProcessor};
use engine::scheduler;

/// Logs every notice via `tracing` rather than delivering it anywhere —
/// push/email/in-app delivery is an external collaborator, this is the seam it would plug into.
struct LoggingSink;

#[async_trait::async_trait]
impl NotificationSink for LoggingSink {
    async fn notify(&self, notice: Notice) {
        tracing::info!(?notice, "notice");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("loading engine configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to database")?;
    let store = PgStore::new(pool);
    store.migrate().await.context("running database migrations")?;

    let store: Arc<dyn Store> = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notify: Arc<dyn NotificationSink> = Arc::new(LoggingSink);
    // The choice of card processor is out of scope; the
    // sandbox fake stands in until a real rail is wired up behind the
    // same `PaymentProcessor` port.
    let processor: Arc<dyn PaymentProcessor> = Arc::new(SandboxProcessor::new());

    let tasks = scheduler::default_tasks(store, clock, notify, processor, &config);
    tracing::info!(task_count = tasks.len(), "starting scheduler");
    let handles = scheduler::spawn_all(tasks);

    for handle in handles {
        handle.await.context("scheduler task panicked")?;
    }
    Ok(())
}
