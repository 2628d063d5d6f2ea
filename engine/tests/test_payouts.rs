use chrono::{TimeZone, Utc};

use extrashifty_engine::clock::TestClock;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::db::Store;
use extrashifty_engine::models::{Payout, PayoutStatus, PayoutType, Role, User, Wallet};
use extrashifty_engine::money::Money;
use extrashifty_engine::payouts::{
    get_payout_history, get_payout_schedule, process_weekly_payouts, request_instant_payout,
};

async fn seeded(role: Role, balance_cents: i64) -> MemoryStore {
    let store = MemoryStore::new();
    store.seed_user(User { id: 1, role, active: true, deleted: false, probation_until: None }).await;
    let mut wallet = Wallet::new(0, 1);
    wallet.balance = Money::from_cents(balance_cents);
    store.seed_wallet(wallet).await;
    store
}

#[tokio::test]
async fn replaying_an_instant_payout_idempotency_key_returns_the_same_payout() {
    let store = seeded(Role::Staff, 10_000).await;
    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

    let first = request_instant_payout(&store, &clock, 1, Some(Money::from_cents(2_000)), "ip_replay".into())
        .await
        .unwrap();
    let second = request_instant_payout(&store, &clock, 1, Some(Money::from_cents(2_000)), "ip_replay".into())
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let mut tx = store.begin().await.unwrap();
    let wallet = tx.lock_wallet(1).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    // Only debited once despite the replay.
    assert_eq!(wallet.balance, Money::from_cents(8_000));
}

#[tokio::test]
async fn weekly_payouts_only_consider_staff_and_agency_wallets() {
    let store = seeded(Role::Company, 10_000).await;
    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
    let payouts = process_weekly_payouts(&store, &clock).await.unwrap();
    assert!(payouts.is_empty());

    let mut tx = store.begin().await.unwrap();
    let wallet = tx.lock_wallet(1).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(wallet.balance, Money::from_cents(10_000));
}

#[tokio::test]
async fn payout_schedule_and_history_partition_by_terminal_status() {
    let store = seeded(Role::Staff, 0).await;

    let mut tx = store.begin().await.unwrap();
    let pending = tx
        .insert_payout(Payout {
            id: 0,
            wallet_id: 1,
            amount: Money::from_cents(1_000),
            fee: Money::ZERO,
            net_amount: Money::from_cents(1_000),
            r#type: PayoutType::Instant,
            status: PayoutStatus::Pending,
            scheduled_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().date_naive(),
            external_id: None,
            paid_at: None,
        })
        .await
        .unwrap();
    let paid = tx
        .insert_payout(Payout {
            id: 0,
            wallet_id: 1,
            amount: Money::from_cents(2_000),
            fee: Money::ZERO,
            net_amount: Money::from_cents(2_000),
            r#type: PayoutType::Weekly,
            status: PayoutStatus::Paid,
            scheduled_date: Utc.with_ymd_and_hms(2025, 12, 25, 0, 0, 0).unwrap().date_naive(),
            external_id: Some("ext_123".into()),
            paid_at: Some(Utc.with_ymd_and_hms(2025, 12, 26, 0, 0, 0).unwrap()),
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let schedule = get_payout_schedule(&store, 1).await.unwrap();
    assert_eq!(schedule.iter().map(|p| p.id).collect::<Vec<_>>(), vec![pending.id]);

    let history = get_payout_history(&store, 1).await.unwrap();
    assert_eq!(history.iter().map(|p| p.id).collect::<Vec<_>>(), vec![paid.id]);
}
