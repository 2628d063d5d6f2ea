use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use extrashifty_engine::clock::{Clock, TestClock};
use extrashifty_engine::config::EngineConfig;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::db::Store;
use extrashifty_engine::notify::{NotificationSink, RecordingSink};
use extrashifty_engine::processor::{PaymentProcessor, SandboxProcessor};
use extrashifty_engine::scheduler::{default_tasks, spawn_all, ScheduledTask};

fn test_config() -> EngineConfig {
    EngineConfig {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        enable_w9_reminders: false,
        scheduler_poll_interval: Duration::from_secs(30),
    }
}

#[tokio::test]
async fn default_tasks_covers_the_full_job_table_with_expected_cadences() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()));
    let notify: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
    let processor: Arc<dyn PaymentProcessor> = Arc::new(SandboxProcessor::new());
    let tasks = default_tasks(store, clock, notify, processor, &test_config());

    let names: Vec<&str> = tasks.iter().map(|t| t.name).collect();
    for expected in [
        "weekly_payout",
        "auto_approve_shifts",
        "auto_topup_check",
        "expire_funds_holds",
        "dispute_deadline_check",
        "reserve_upcoming_shift_days",
        "check_wallet_suspensions",
        "check_noshows",
    ] {
        assert!(names.contains(&expected), "missing job {expected}");
    }
    assert!(!names.contains(&"w9_reminders"));

    let by_name = |name: &str| tasks.iter().find(|t| t.name == name).unwrap();
    assert_eq!(by_name("auto_approve_shifts").interval, Duration::from_secs(15 * 60));
    assert_eq!(by_name("auto_topup_check").interval, Duration::from_secs(5 * 60));
    assert_eq!(by_name("expire_funds_holds").interval, Duration::from_secs(30 * 60));
    assert_eq!(by_name("dispute_deadline_check").interval, Duration::from_secs(24 * 3_600));
    assert_eq!(by_name("check_wallet_suspensions").interval, Duration::from_secs(3_600));
    assert_eq!(by_name("check_noshows").interval, Duration::from_secs(3_600));
    assert!(tasks.iter().all(|t| !t.run_on_startup));
}

#[tokio::test]
async fn spawned_task_executes_repeatedly_on_its_interval() {
    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    let task = ScheduledTask::new("probe", Duration::from_millis(20), true, move || {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let handles = spawn_all(vec![task]);
    tokio::time::sleep(Duration::from_millis(90)).await;
    for handle in &handles {
        handle.abort();
    }

    // run_on_startup fires once immediately, then the 20ms ticker should
    // have fired a few more times within 90ms.
    assert!(count.load(Ordering::SeqCst) >= 2, "count was {}", count.load(Ordering::SeqCst));
}
