//! Background scheduler.
//!
//! A single-process task runner: each [`ScheduledTask`] carries a name, an
//! interval, a `run_on_startup` flag, and a handler. Tasks run concurrently
//! — one `tokio::spawn`ed loop per task — but a single task never overlaps
//! itself: each loop awaits its own handler to completion before sleeping
//! for the next tick. Handler failures are logged and never stop the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Weekday};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::db::Store;
use crate::error::EngineResult;
use crate::notify::NotificationSink;
use crate::processor::PaymentProcessor;
use crate::{escrow, payouts, penalties, settlement, verification};

type TaskFuture = Pin<Box<dyn Future<Output = EngineResult<()>> + Send>>;
type TaskHandler = Box<dyn Fn() -> TaskFuture + Send + Sync>;

/// One entry in the job table: `{name, interval_seconds, run_on_startup,
/// handler}`.
pub struct ScheduledTask {
    pub name: &'static str,
    pub interval: Duration,
    pub run_on_startup: bool,
    handler: TaskHandler,
}

impl ScheduledTask {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, run_on_startup: bool, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<()>> + Send + 'static,
    {
        Self {
            name,
            interval,
            run_on_startup,
            handler: Box::new(move || Box::pin(handler())),
        }
    }

    async fn run_once(&self) {
        tracing::info!(task = self.name, "running scheduled task");
        match (self.handler)().await {
            Ok(()) => tracing::info!(task = self.name, "completed scheduled task"),
            Err(error) => tracing::error!(task = self.name, %error, "scheduled task failed"),
        }
    }

    async fn run_forever(self: Arc<Self>) {
        if self.run_on_startup {
            self.run_once().await;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately; consume it
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}

/// Spawn one `tokio::spawn`ed loop per task. Dropping every returned handle
/// does not stop the tasks; call `.abort()` on each to stop the scheduler.
pub fn spawn_all(tasks: Vec<ScheduledTask>) -> Vec<JoinHandle<()>> {
    tasks
        .into_iter()
        .map(|task| {
            let task = Arc::new(task);
            tokio::spawn(async move { task.run_forever().await })
        })
        .collect()
}

/// Build the full job table. `enable_w9_reminders` comes from
/// [`EngineConfig`] — when unset the job is left out entirely rather than
/// wired up to do nothing, since W9 generation itself is out of scope.
pub fn default_tasks(
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notify: Arc<dyn NotificationSink>,
    processor: Arc<dyn PaymentProcessor>,
    config: &EngineConfig,
) -> Vec<ScheduledTask> {
    let mut tasks = Vec::new();

    {
        let store = store.clone();
        let clock = clock.clone();
        tasks.push(ScheduledTask::new(
            "weekly_payout",
            Duration::from_secs(3_600),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                async move {
                    if clock.now().weekday() != Weekday::Fri {
                        return Ok(());
                    }
                    payouts::process_weekly_payouts(&*store, &*clock).await?;
                    Ok(())
                }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        tasks.push(ScheduledTask::new(
            "auto_approve_shifts",
            Duration::from_secs(15 * 60),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                async move {
                    verification::check_auto_approve_shifts(&*store, &*clock).await?;
                    Ok(())
                }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        let notify = notify.clone();
        let processor = processor.clone();
        tasks.push(ScheduledTask::new(
            "auto_topup_check",
            Duration::from_secs(5 * 60),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                let notify = notify.clone();
                let processor = processor.clone();
                async move { run_auto_topup_check(&*store, &*clock, &*notify, &*processor).await }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        tasks.push(ScheduledTask::new(
            "expire_funds_holds",
            Duration::from_secs(30 * 60),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                async move {
                    settlement::expire_funds_holds(&*store, &*clock).await?;
                    Ok(())
                }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        let notify = notify.clone();
        tasks.push(ScheduledTask::new(
            "dispute_deadline_check",
            Duration::from_secs(24 * 3_600),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                let notify = notify.clone();
                async move {
                    escrow::auto_resolve_overdue_disputes(&*store, &*clock, &*notify).await?;
                    Ok(())
                }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        let notify = notify.clone();
        tasks.push(ScheduledTask::new(
            "reserve_upcoming_shift_days",
            Duration::from_secs(3_600),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                let notify = notify.clone();
                async move { run_due_scheduled_reserves(&*store, &*clock, &*notify).await }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        let notify = notify.clone();
        tasks.push(ScheduledTask::new(
            "check_wallet_suspensions",
            Duration::from_secs(3_600),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                let notify = notify.clone();
                async move {
                    penalties::lift_expired_suspensions(&*store, &*clock, &*notify).await?;
                    penalties::write_off_stale_negative_balances(&*store, &*clock, &*notify).await?;
                    Ok(())
                }
            },
        ));
    }

    {
        let store = store.clone();
        let clock = clock.clone();
        let notify = notify.clone();
        tasks.push(ScheduledTask::new(
            "check_noshows",
            Duration::from_secs(3_600),
            false,
            move || {
                let store = store.clone();
                let clock = clock.clone();
                let notify = notify.clone();
                async move { run_noshow_sweep(&*store, &*clock, &*notify).await }
            },
        ));
    }

    if config.enable_w9_reminders {
        tasks.push(ScheduledTask::new(
            "w9_reminders",
            Duration::from_secs(7 * 24 * 3_600),
            false,
            move || async move {
                // Tax-form generation and delivery are out of scope; this job exists only so the table matches
                // and logs that the sweep ran.
                tracing::debug!("w9_reminders sweep ran (reminder delivery out of scope)");
                Ok(())
            },
        ));
    }

    tasks
}

async fn run_auto_topup_check(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
    processor: &dyn PaymentProcessor,
) -> EngineResult<()> {
    let wallets = {
        let mut tx = store.begin().await?;
        let wallets = tx.list_wallets_needing_auto_topup().await?;
        tx.commit().await?;
        wallets
    };

    for wallet in wallets {
        let (Some(amount), Some(payment_method)) =
            (wallet.auto_topup.amount, wallet.auto_topup.payment_method.clone())
        else {
            continue;
        };
        let idem_key = crate::ids::generate(&format!("auto_topup_{}", wallet.id));
        match crate::ledger::topup(store, processor, notify, clock, wallet.user_id, amount, &payment_method, &idem_key)
            .await
        {
            Ok(_) | Err(crate::error::EngineError::PaymentProcessorFailed(_)) => {}
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

async fn run_due_scheduled_reserves(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
) -> EngineResult<()> {
    let due_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let due = tx.list_due_scheduled_reserves(clock.now()).await?;
        tx.commit().await?;
        due.into_iter().map(|r| r.id).collect()
    };
    for reserve_id in due_ids {
        settlement::execute_scheduled_reserve(store, clock, notify, reserve_id).await?;
    }
    Ok(())
}

/// Enumerate no-show candidates (filled shifts 30 minutes past start with no
/// clock-in and no prior penalty) and run the sanction path on each.
async fn run_noshow_sweep(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
) -> EngineResult<()> {
    let candidate_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let candidates = tx.list_noshow_candidates(clock.now()).await?;
        tx.commit().await?;
        candidates.into_iter().map(|s| s.id).collect()
    };
    for shift_id in candidate_ids {
        penalties::process_noshow(store, clock, notify, shift_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::memory::MemoryStore;
    use crate::models::{Role, User, Wallet};
    use crate::money::Money;
    use crate::notify::RecordingSink;
    use crate::processor::SandboxProcessor;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn weekly_payout_is_a_no_op_off_friday() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        // 2026-07-28 is a Tuesday.
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()));
        let notify: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
        let processor: Arc<dyn PaymentProcessor> = Arc::new(SandboxProcessor::new());
        let config = EngineConfig {
            database_url: "postgres://unused".into(),
            database_max_connections: 1,
            enable_w9_reminders: false,
            scheduler_poll_interval: Duration::from_secs(30),
        };
        let tasks = default_tasks(store, clock, notify, processor, &config);
        assert!(!tasks.iter().any(|t| t.name == "w9_reminders"));
        assert!(tasks.iter().any(|t| t.name == "weekly_payout"));
    }

    #[tokio::test]
    async fn w9_reminders_included_only_when_enabled() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()));
        let notify: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
        let processor: Arc<dyn PaymentProcessor> = Arc::new(SandboxProcessor::new());
        let config = EngineConfig {
            database_url: "postgres://unused".into(),
            database_max_connections: 1,
            enable_w9_reminders: true,
            scheduler_poll_interval: Duration::from_secs(30),
        };
        let tasks = default_tasks(store, clock, notify, processor, &config);
        assert!(tasks.iter().any(|t| t.name == "w9_reminders"));
    }

    #[tokio::test]
    async fn run_forever_executes_run_on_startup_tasks_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let task = Arc::new(ScheduledTask::new(
            "probe",
            Duration::from_secs(3_600),
            true,
            move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        ));
        task.run_once().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
