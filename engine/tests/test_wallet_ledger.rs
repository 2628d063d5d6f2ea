use chrono::{TimeZone, Utc};

use extrashifty_engine::clock::TestClock;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::error::EngineError;
use extrashifty_engine::ledger;
use extrashifty_engine::models::{Role, User, WalletStatus};
use extrashifty_engine::money::Money;
use extrashifty_engine::notify::RecordingSink;
use extrashifty_engine::processor::SandboxProcessor;

async fn seeded(store: &MemoryStore, id: i64) {
    store
        .seed_user(User { id, role: Role::Staff, active: true, deleted: false, probation_until: None })
        .await;
}

#[tokio::test]
async fn topup_credits_wallet_and_records_transaction() {
    let store = MemoryStore::new();
    seeded(&store, 1).await;
    let wallet = ledger::get_or_create(&store, 1).await.unwrap();
    assert_eq!(wallet.balance, Money::ZERO);

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let processor = SandboxProcessor::new();
    let notify = RecordingSink::new();
    let tx = ledger::topup(&store, &processor, &notify, &clock, 1, Money::from_cents(5_000), "pm_1", "topup_1")
        .await
        .unwrap();
    assert_eq!(tx.amount, Money::from_cents(5_000));

    let wallet = ledger::get_or_create(&store, 1).await.unwrap();
    assert_eq!(wallet.balance, Money::from_cents(5_000));

    // Replaying the same idempotency key returns the original transaction
    // without crediting a second time.
    let replay = ledger::topup(&store, &processor, &notify, &clock, 1, Money::from_cents(5_000), "pm_1", "topup_1")
        .await
        .unwrap();
    assert_eq!(replay.id, tx.id);
    let wallet = ledger::get_or_create(&store, 1).await.unwrap();
    assert_eq!(wallet.balance, Money::from_cents(5_000));
}

#[tokio::test]
async fn declined_topup_moves_wallet_into_grace_period() {
    let store = MemoryStore::new();
    seeded(&store, 2).await;
    ledger::get_or_create(&store, 2).await.unwrap();

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let processor = SandboxProcessor::new();
    let notify = RecordingSink::new();
    let err = ledger::topup(&store, &processor, &notify, &clock, 2, Money::from_cents(2_000), "fail_card", "topup_2")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PaymentProcessorFailed(_)));

    let wallet = ledger::get_or_create(&store, 2).await.unwrap();
    assert_eq!(wallet.status, WalletStatus::GracePeriod);
    assert!(wallet.grace_period_ends_at.is_some());
    assert_eq!(notify.sent().len(), 1);
}

#[tokio::test]
async fn auto_topup_config_requires_all_fields_when_enabled() {
    let store = MemoryStore::new();
    seeded(&store, 3).await;
    ledger::get_or_create(&store, 3).await.unwrap();

    let err = ledger::configure_auto_topup(&store, 3, true, Some(Money::from_cents(1_000)), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let wallet = ledger::configure_auto_topup(
        &store,
        3,
        true,
        Some(Money::from_cents(1_000)),
        Some(Money::from_cents(5_000)),
        Some("pm_default".to_string()),
    )
    .await
    .unwrap();
    assert!(wallet.auto_topup.enabled);
}

#[tokio::test]
async fn reactivate_requires_available_above_minimum() {
    let store = MemoryStore::new();
    seeded(&store, 4).await;
    let wallet = ledger::get_or_create(&store, 4).await.unwrap();

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let processor = SandboxProcessor::new();
    let notify = RecordingSink::new();
    let _ = ledger::topup(&store, &processor, &notify, &clock, 4, Money::from_cents(1_000), "fail_card", "bad_topup")
        .await;

    let err = ledger::reactivate(&store, wallet.id, Some(Money::from_cents(500))).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
