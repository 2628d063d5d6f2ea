use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use extrashifty_engine::clock::TestClock;
use extrashifty_engine::db::memory::MemoryStore;
use extrashifty_engine::db::Store;
use extrashifty_engine::error::EngineError;
use extrashifty_engine::models::{
    Application, ApplicationStatus, AppealType, FundsHold, FundsHoldStatus, PenaltyStatus, Role,
    Shift, ShiftStatus, Strike, User, UserSuspension, Wallet,
};
use extrashifty_engine::money::Money;
use extrashifty_engine::notify::RecordingSink;
use extrashifty_engine::penalties::{
    lift_expired_suspensions, process_noshow, submit_appeal, withdraw_appeal,
};

async fn agency_shift_setup() -> (MemoryStore, TestClock) {
    let store = MemoryStore::new();
    store.seed_user(User { id: 1, role: Role::Company, active: true, deleted: false, probation_until: None }).await;
    store.seed_user(User { id: 3, role: Role::Agency, active: true, deleted: false, probation_until: None }).await;
    store.seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None }).await;

    let mut agency_wallet = Wallet::new(0, 3);
    agency_wallet.balance = Money::from_cents(20_000);
    agency_wallet.reserved = Money::from_cents(10_000);
    store.seed_wallet(Wallet { id: 3, ..agency_wallet }).await;
    store.seed_wallet(Wallet::new(2, 2)).await;

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 19, 0, 0).unwrap());
    let shift = Shift {
        id: 600,
        company_id: 1,
        posted_by_agency_id: Some(3),
        client_company_id: Some(1),
        is_agency_managed: true,
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
    };
    assert!(shift.is_mode_b());
    store.seed_shift(shift).await;
    store
        .seed_application(Application { id: 1, shift_id: 600, applicant_id: 2, status: ApplicationStatus::Accepted })
        .await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_funds_hold(FundsHold {
        id: 0,
        wallet_id: 3,
        shift_id: 600,
        amount: Money::from_cents(10_000),
        status: FundsHoldStatus::Active,
        description: None,
        expires_at: None,
        released_at: None,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    (store, clock)
}

#[tokio::test]
async fn agency_managed_noshow_penalizes_agency_wallet_not_the_worker() {
    let (store, clock) = agency_shift_setup().await;
    let notify = RecordingSink::new();
    let outcome = process_noshow(&store, &clock, &notify, 600).await.unwrap();

    assert!(outcome.strike.is_none()); // no first-class Strike for the worker
    let penalty = outcome.penalty.unwrap();
    assert_eq!(penalty.user_id, 3);
    assert_eq!(penalty.status, PenaltyStatus::Collected);

    let mut tx = store.begin().await.unwrap();
    let worker = tx.lock_wallet(2).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(worker.balance, Money::ZERO);
}

#[tokio::test]
async fn process_noshow_before_grace_period_is_rejected() {
    let (store, clock) = agency_shift_setup().await;
    clock.set(Utc.with_ymd_and_hms(2026, 8, 1, 18, 10, 0).unwrap()); // 10 min in, grace is 30
    let notify = RecordingSink::new();
    let err = process_noshow(&store, &clock, &notify, 600).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn withdraw_appeal_requires_the_appellant() {
    let store = MemoryStore::new();
    store.seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None }).await;
    store.seed_wallet(Wallet::new(2, 2)).await;
    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());

    let mut tx = store.begin().await.unwrap();
    let suspension = tx
        .insert_suspension(UserSuspension {
            id: 0,
            user_id: 2,
            reason: "test".into(),
            suspended_at: clock.now(),
            suspended_until: Some(clock.now() + Duration::days(30)),
            is_active: true,
            lifted_by: None,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let appeal = submit_appeal(&store, &clock, 2, AppealType::Suspension, suspension.id, "let me back".into(), vec![], None)
        .await
        .unwrap();

    let err = withdraw_appeal(&store, appeal.id, 999).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let withdrawn = withdraw_appeal(&store, appeal.id, 2).await.unwrap();
    assert_eq!(withdrawn.status, extrashifty_engine::models::AppealStatus::Withdrawn);
}

#[tokio::test]
async fn lift_expired_suspensions_reactivates_only_time_bound_ones_past_due() {
    let store = MemoryStore::new();
    store.seed_user(User { id: 2, role: Role::Staff, active: false, deleted: false, probation_until: None }).await;
    store.seed_user(User { id: 4, role: Role::Staff, active: false, deleted: false, probation_until: None }).await;
    store.seed_wallet(Wallet::new(2, 2)).await;
    store.seed_wallet(Wallet::new(4, 4)).await;

    let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    let mut tx = store.begin().await.unwrap();
    // User 2: a 30-day suspension from 35 days ago, already past due.
    tx.insert_suspension(UserSuspension {
        id: 0,
        user_id: 2,
        reason: "strikes".into(),
        suspended_at: clock.now() - Duration::days(35),
        suspended_until: Some(clock.now() - Duration::days(5)),
        is_active: true,
        lifted_by: None,
    })
    .await
    .unwrap();
    // User 4: an indefinite suspension (written off for inactivity) — never
    // shows up in the expired list, only `review_appeal` lifts this one.
    tx.insert_suspension(UserSuspension {
        id: 0,
        user_id: 4,
        reason: "inactivity write-off".into(),
        suspended_at: clock.now() - Duration::days(200),
        suspended_until: None,
        is_active: true,
        lifted_by: None,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let notify = RecordingSink::new();
    let lifted = lift_expired_suspensions(&store, &clock, &notify).await.unwrap();
    assert_eq!(lifted.len(), 1);
    assert_eq!(lifted[0].user_id, 2);

    let mut tx = store.begin().await.unwrap();
    let user2 = tx.get_user(2).await.unwrap().unwrap();
    let user4 = tx.get_user(4).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert!(user2.active);
    assert!(!user4.active);
    assert_eq!(notify.sent().len(), 1);
}
