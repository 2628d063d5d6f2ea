//! Verification & approval.
//!
//! Clock-in/out recording, manager approve/reject, and the 24h auto-approve
//! sweep the scheduler runs hourly. `manager_reject_shift` hands off to
//! [`crate::escrow::create_dispute`] rather than duplicating its
//! preconditions; `manager_approve_shift` hands off to
//! [`crate::settlement::settle_shift`] the same way.

use chrono::Duration;

use crate::clock::Clock;
use crate::db::Store;
use crate::error::{EngineError, EngineResult};
use crate::escrow::create_dispute;
use crate::models::{Dispute, Role, Shift, ShiftStatus, Transaction};
use crate::settlement::settle_shift;

const AUTO_APPROVE_AFTER_HOURS: i64 = 24;

/// Record a worker's clock-in. Only the sole accepted applicant may do so.
pub async fn clock_in(store: &dyn Store, clock: &dyn Clock, shift_id: i64, worker_id: i64) -> EngineResult<Shift> {
    let mut tx = store.begin().await?;
    let mut shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    let application = tx
        .get_sole_accepted_application(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
    if application.applicant_id != worker_id {
        return Err(EngineError::Forbidden(
            "only the accepted applicant may clock in".into(),
        ));
    }
    if shift.clock_in_at.is_some() {
        return Err(EngineError::Conflict(format!("shift {shift_id} already clocked in")));
    }

    let now = clock.now();
    shift.clock_in_at = Some(now);
    shift.status = ShiftStatus::InProgress;
    tx.save_shift(&shift).await?;
    tx.commit().await?;
    Ok(shift)
}

/// Record a worker's clock-out and derive `actual_hours_worked`.
pub async fn clock_out(store: &dyn Store, clock: &dyn Clock, shift_id: i64, worker_id: i64) -> EngineResult<Shift> {
    let mut tx = store.begin().await?;
    let mut shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    let application = tx
        .get_sole_accepted_application(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
    if application.applicant_id != worker_id {
        return Err(EngineError::Forbidden(
            "only the accepted applicant may clock out".into(),
        ));
    }
    let clock_in_at = shift
        .clock_in_at
        .ok_or_else(|| EngineError::Conflict(format!("shift {shift_id} has not clocked in")))?;
    if shift.clock_out_at.is_some() {
        return Err(EngineError::Conflict(format!("shift {shift_id} already clocked out")));
    }

    let now = clock.now();
    if now < clock_in_at {
        return Err(EngineError::Validation("clock-out precedes clock-in".into()));
    }
    shift.clock_out_at = Some(now);
    shift.actual_hours_worked = Some((now - clock_in_at).num_seconds() as f64 / 3600.0);
    shift.status = ShiftStatus::Completed;
    tx.save_shift(&shift).await?;
    tx.commit().await?;
    Ok(shift)
}

/// Admin/manager correction of `actual_hours_worked` on a shift that has
/// not yet settled.
/// Re-validates the caller's role the way `manager_approve_shift` does.
pub async fn adjust_hours(
    store: &dyn Store,
    shift_id: i64,
    manager_id: i64,
    hours: f64,
) -> EngineResult<Shift> {
    if hours < 0.0 {
        return Err(EngineError::Validation("hours must be non-negative".into()));
    }
    let mut tx = store.begin().await?;
    let manager = tx
        .get_user(manager_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("user {manager_id}")))?;
    if !matches!(manager.role, Role::Company | Role::Agency | Role::Admin) {
        return Err(EngineError::Forbidden(
            "only a company owner, agency, or admin may adjust hours".into(),
        ));
    }
    let mut shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    if shift.status == ShiftStatus::Completed && tx.get_active_hold_for_shift(shift_id).await?.is_none() {
        return Err(EngineError::Conflict(format!(
            "shift {shift_id} has already settled, hours can no longer be adjusted"
        )));
    }
    shift.actual_hours_worked = Some(hours);
    tx.save_shift(&shift).await?;
    tx.commit().await?;
    Ok(shift)
}

/// A company-owner or admin approves a completed shift's hours, triggering
/// settlement.
pub async fn manager_approve_shift(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    manager_id: i64,
    actual_hours: Option<f64>,
) -> EngineResult<Vec<Transaction>> {
    {
        let mut tx = store.begin().await?;
        let manager = tx
            .get_user(manager_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {manager_id}")))?;
        if !matches!(manager.role, Role::Company | Role::Agency | Role::Admin) {
            return Err(EngineError::Forbidden(
                "only a company owner, agency, or admin may approve a shift".into(),
            ));
        }
        tx.commit().await?;
    }
    let idem_key = crate::ids::derive(&format!("manual_approve_{shift_id}"), "settle");
    settle_shift(store, clock, shift_id, actual_hours, Some(idem_key)).await
}

/// A company-owner or admin rejects a completed shift, opening a dispute.
pub async fn manager_reject_shift(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    manager_id: i64,
    reason: String,
) -> EngineResult<Dispute> {
    {
        let mut tx = store.begin().await?;
        let manager = tx
            .get_user(manager_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {manager_id}")))?;
        if !matches!(manager.role, Role::Company | Role::Agency | Role::Admin) {
            return Err(EngineError::Forbidden(
                "only a company owner, agency, or admin may reject a shift".into(),
            ));
        }
        tx.commit().await?;
    }
    create_dispute(store, clock, shift_id, manager_id, reason, None).await
}

/// Hourly sweep: settle every shift `completed ∧ clock_out_at <= now
/// - 24h ∧ no open dispute`, with `approved_by = None`.
pub async fn check_auto_approve_shifts(store: &dyn Store, clock: &dyn Clock) -> EngineResult<Vec<Vec<Transaction>>> {
    let now = clock.now();
    let candidate_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let shifts = tx.list_completed_awaiting_auto_approve(now).await?;
        tx.commit().await?;
        shifts
            .into_iter()
            .filter(|s| {
                s.clock_out_at
                    .map(|t| now - t >= Duration::hours(AUTO_APPROVE_AFTER_HOURS))
                    .unwrap_or(false)
            })
            .map(|s| s.id)
            .collect()
    };

    let mut settled = Vec::with_capacity(candidate_ids.len());
    for shift_id in candidate_ids {
        let idem_key = crate::ids::derive(&format!("auto_approve_{shift_id}"), "settle");
        match settle_shift(store, clock, shift_id, None, Some(idem_key)).await {
            Ok(txs) => settled.push(txs),
            Err(EngineError::Conflict(_)) => continue,
            Err(other) => return Err(other),
        }
    }
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::memory::MemoryStore;
    use crate::models::{Application, ApplicationStatus, Role as R, User, Wallet};
    use crate::money::Money;
    use crate::settlement::reserve_shift_funds;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    async fn setup() -> (MemoryStore, TestClock) {
        let store = MemoryStore::new();
        store.seed_user(User { id: 1, role: R::Company, active: true, deleted: false, probation_until: None }).await;
        store.seed_user(User { id: 2, role: R::Staff, active: true, deleted: false, probation_until: None }).await;

        let mut company_wallet = Wallet::new(0, 1);
        company_wallet.balance = Money::from_cents(20_000);
        store.seed_wallet(Wallet { id: 1, ..company_wallet }).await;
        store.seed_wallet(Wallet::new(2, 2)).await;

        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap());
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

        (store, clock)
    }

    #[tokio::test]
    async fn clock_in_then_out_records_hours() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
        clock_in(&store, &clock, 200, 2).await.unwrap();
        clock.advance(chrono::Duration::hours(5));
        let shift = clock_out(&store, &clock, 200, 2).await.unwrap();
        assert_eq!(shift.actual_hours_worked, Some(5.0));
        assert_eq!(shift.status, ShiftStatus::Completed);
    }

    #[tokio::test]
    async fn only_accepted_applicant_may_clock_in() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
        let err = clock_in(&store, &clock, 200, 99).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn auto_approve_settles_after_24h_with_no_open_dispute() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
        clock_in(&store, &clock, 200, 2).await.unwrap();
        clock.advance(chrono::Duration::hours(5));
        clock_out(&store, &clock, 200, 2).await.unwrap();

        clock.advance(chrono::Duration::hours(24));
        let settled = check_auto_approve_shifts(&store, &clock).await.unwrap();
        assert_eq!(settled.len(), 1);

        let mut tx = store.begin().await.unwrap();
        let worker = tx.lock_wallet(2).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(worker.balance, Money::from_cents(8_500));
    }

    #[tokio::test]
    async fn manager_reject_opens_dispute_instead_of_settling() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 200, None, None).await.unwrap();
        clock_in(&store, &clock, 200, 2).await.unwrap();
        clock.advance(chrono::Duration::hours(5));
        clock_out(&store, &clock, 200, 2).await.unwrap();

        let dispute = manager_reject_shift(&store, &clock, 200, 1, "hours look wrong".into())
            .await
            .unwrap();
        assert_eq!(dispute.raised_by_user_id, 1);
        assert_eq!(dispute.against_user_id, 2);
    }
}
