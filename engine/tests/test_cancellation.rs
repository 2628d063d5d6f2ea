use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use extrashifty_engine::clock::TestClock;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::models::{
    Application, ApplicationStatus, Role, Shift, ShiftStatus, User, Wallet,
};
use extrashifty_engine::money::Money;
use extrashifty_engine::settlement::{process_cancellation, reserve_shift_funds, CancelledBy};

async fn setup() -> (MemoryStore, TestClock) {
    let store = MemoryStore::new();
    store
        .seed_user(User { id: 1, role: Role::Company, active: true, deleted: false, probation_until: None })
        .await;
    store
        .seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None })
        .await;

    let mut company_wallet = Wallet::new(0, 1);
    company_wallet.balance = Money::from_cents(12_000);
    store.seed_wallet(Wallet { id: 1, ..company_wallet }).await;
    store.seed_wallet(Wallet::new(2, 2)).await;

    store
        .seed_shift(Shift {
            id: 200,
            company_id: 1,
            posted_by_agency_id: None,
            client_company_id: None,
            is_agency_managed: false,
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            start_time: NaiveTime::parse_from_str("18:00", "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str("23:00", "%H:%M").unwrap(),
            hourly_rate: Money::from_cents(2_000),
            spots_total: 1,
            spots_filled: 1,
            status: ShiftStatus::Filled,
            clock_in_at: None,
            clock_out_at: None,
            actual_hours_worked: None,
        })
        .await;
    store
        .seed_application(Application { id: 1, shift_id: 200, applicant_id: 2, status: ApplicationStatus::Accepted })
        .await;

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 7, 20, 0, 0, 0).unwrap());
    (store, clock)
}

#[tokio::test]
async fn company_cancellation_at_or_beyond_48h_is_full_refund_no_fee() {
    let (store, clock) = setup().await;
    reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
    // Shift starts 2026-08-01T18:00Z; clock at 2026-07-20 is well past 48h out.
    let txs = process_cancellation(&store, &clock, 200, CancelledBy::Company, None, None)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1); // release only, no fee transaction

    let mut tx = store.begin().await.unwrap();
    use extrashifty_engine::db::Store;
    let company = tx.lock_wallet(1).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(company.balance, Money::from_cents(12_000));
    assert_eq!(company.reserved, Money::ZERO);
}

#[tokio::test]
async fn company_cancellation_between_24h_and_48h_withholds_half_from_no_one() {
    let (store, clock) = setup().await;
    reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
    clock.set(Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap()); // ~30h before start
    process_cancellation(&store, &clock, 200, CancelledBy::Company, None, None)
        .await
        .unwrap();

    use extrashifty_engine::db::Store;
    let mut tx = store.begin().await.unwrap();
    let company = tx.lock_wallet(1).await.unwrap().unwrap();
    let worker = tx.lock_wallet(2).await.unwrap().unwrap();
    tx.commit().await.unwrap();

    // Hold was $100; 50% ($50) is released back to the company, the other
    // 50% is withheld by the platform — the worker never did the shift and
    // gets nothing.
    assert_eq!(worker.balance, Money::ZERO);
    assert_eq!(company.balance, Money::from_cents(7_000));
}

#[tokio::test]
async fn worker_cancellation_never_charges_a_fee_regardless_of_timing() {
    let (store, clock) = setup().await;
    reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
    clock.set(Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap()); // 1h before start
    let txs = process_cancellation(&store, &clock, 200, CancelledBy::Worker, None, None)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);

    use extrashifty_engine::db::Store;
    let mut tx = store.begin().await.unwrap();
    let company = tx.lock_wallet(1).await.unwrap().unwrap();
    let worker = tx.lock_wallet(2).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(company.balance, Money::from_cents(12_000));
    assert_eq!(worker.balance, Money::ZERO);
}

#[tokio::test]
async fn replaying_the_same_idempotency_key_is_a_no_op_second_time() {
    let (store, clock) = setup().await;
    reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
    let key = Some("cancel_once".to_string());
    let first = process_cancellation(&store, &clock, 200, CancelledBy::Worker, None, key.clone())
        .await
        .unwrap();
    assert!(!first.is_empty());

    let second = process_cancellation(&store, &clock, 200, CancelledBy::Worker, None, key)
        .await
        .unwrap();
    assert!(second.is_empty());
}
