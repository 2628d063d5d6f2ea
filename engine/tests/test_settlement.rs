use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use extrashifty_engine::clock::TestClock;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::db::Store;
use extrashifty_engine::error::EngineError;
use extrashifty_engine::models::{
    Application, ApplicationStatus, Role, Shift, ShiftStatus, User, Wallet,
};
use extrashifty_engine::money::Money;
use extrashifty_engine::settlement::reserve_shift_funds;

fn five_hour_shift(id: i64, company_id: i64) -> Shift {
    Shift {
        id,
        company_id,
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
    }
}

#[tokio::test]
async fn reserve_fails_when_wallet_cannot_cover_daily_cost_plus_minimum() {
    let store = MemoryStore::new();
    store
        .seed_user(User { id: 1, role: Role::Company, active: true, deleted: false, probation_until: None })
        .await;
    store
        .seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None })
        .await;
    store.seed_wallet(Wallet::new(1, 1)).await; // zero balance
    store.seed_wallet(Wallet::new(2, 2)).await;
    store.seed_shift(five_hour_shift(10, 1)).await;
    store
        .seed_application(Application { id: 1, shift_id: 10, applicant_id: 2, status: ApplicationStatus::Accepted })
        .await;

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap());
    let err = reserve_shift_funds(&store, &clock, 10, None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
}

#[tokio::test]
async fn mode_b_agency_shift_settles_net_of_commission_on_one_wallet() {
    let store = MemoryStore::new();
    store
        .seed_user(User { id: 1, role: Role::Company, active: true, deleted: false, probation_until: None })
        .await; // client company, not the payer
    store
        .seed_user(User { id: 3, role: Role::Agency, active: true, deleted: false, probation_until: None })
        .await;
    store
        .seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None })
        .await;

    let mut agency_wallet = Wallet::new(0, 3);
    agency_wallet.balance = Money::from_cents(20_000);
    store.seed_wallet(Wallet { id: 3, ..agency_wallet }).await;
    store.seed_wallet(Wallet::new(2, 2)).await;

    let mut shift = five_hour_shift(11, 1);
    shift.is_agency_managed = true;
    shift.posted_by_agency_id = Some(3);
    shift.client_company_id = Some(1);
    assert!(shift.is_mode_b());
    store.seed_shift(shift).await;
    store
        .seed_application(Application { id: 1, shift_id: 11, applicant_id: 2, status: ApplicationStatus::Accepted })
        .await;

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap());
    let hold = reserve_shift_funds(&store, &clock, 11, None, None).await.unwrap();
    assert_eq!(hold.wallet_id, 3);

    let txs = extrashifty_engine::settlement::settle_shift(&store, &clock, 11, Some(5.0), None)
        .await
        .unwrap();
    assert!(!txs.is_empty());

    let mut tx = store.begin().await.unwrap();
    let agency_wallet = tx.lock_wallet(3).await.unwrap().unwrap();
    let worker_wallet = tx.lock_wallet(2).await.unwrap().unwrap();
    tx.commit().await.unwrap();

    // Gross = $100, 15% commission = $15, so the agency keeps $20,000 - $15.
    assert_eq!(agency_wallet.balance, Money::from_cents(19_985));
    assert_eq!(agency_wallet.reserved, Money::ZERO);
    // The worker is paid out-of-band by the agency; this engine never
    // touches their wallet on a Mode-B settlement.
    assert_eq!(worker_wallet.balance, Money::ZERO);
}
