//! Penalty, strike & suspension engine.
//!
//! No-show detection routes through agency mode exactly like settlement and
//! cancellation: an agency-managed shift's penalty lands on the
//! agency wallet and is counted via the same "agency-supplied" transaction
//! tag `process_cancellation` already uses for late-cancellation
//! compensation, rather than a first-class `AgencyStrike` entity.

use chrono::{Datelike, Duration};

use crate::clock::Clock;
use crate::db::{DbError, Store, StoreTx};
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::models::{
    Appeal, AppealStatus, AppealType, EmergencyType, EmergencyWaiver, NegativeBalance, Penalty,
    PenaltyStatus, Strike, Transaction, TransactionType, UserSuspension,
};
use crate::money::Money;
use crate::notify::{NotificationSink, Notice};
use crate::settlement::{process_cancellation, CancelledBy};

/// Active non-warning strikes within their 90-day window that trigger a
/// suspension.
const SUSPENSION_STRIKE_THRESHOLD: usize = 3;
const SUSPENSION_DAYS: i64 = 30;
const STRIKE_WINDOW_DAYS: i64 = 90;
const PENALTY_RATE_PCT: f64 = 50.0;
const NO_SHOW_GRACE_MINUTES: i64 = 30;
const NEGATIVE_BALANCE_WRITE_OFF_DAYS: i64 = 180;
const FRIVOLOUS_APPEAL_FEE_CENTS: i64 = 2_500;
const AGENCY_STRIKE_WARNING_THRESHOLD: usize = 2;
const AGENCY_STRIKE_SUSPENSION_THRESHOLD: usize = 5;

/// What `process_noshow` actually did — not every branch adds both a
/// strike and a penalty (first offense is warning-only; agency-managed
/// shifts add neither to the worker).
#[derive(Debug, Clone)]
pub struct NoShowOutcome {
    pub strike: Option<Strike>,
    pub penalty: Option<Penalty>,
    pub cancellation: Vec<Transaction>,
}

/// Deduct `amount` from `user_id`'s wallet balance (capped at what's
/// available), carrying any remainder forward as negative balance. Shared
/// by `collect_penalty` and the frivolous-appeal fee.
async fn offset_wallet_then_negative_balance(
    tx: &mut dyn StoreTx,
    clock: &dyn Clock,
    user_id: i64,
    amount: Money,
    tx_type: TransactionType,
    idem_key: String,
    related_shift_id: Option<i64>,
) -> EngineResult<Money> {
    let now = clock.now();
    let wallet = tx
        .get_wallet_by_user(user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet for user {user_id}")))?;
    let mut wallet = tx
        .lock_wallet(wallet.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))?;

    let from_wallet = amount.min(wallet.available());
    if from_wallet.is_positive() {
        wallet.balance -= from_wallet;
        tx.save_wallet(&wallet).await?;
        tx.insert_transaction(
            Transaction::new(wallet.id, tx_type, from_wallet, Money::ZERO, idem_key, related_shift_id, now)
                .complete(now),
        )
        .await?;
    }

    let remainder = amount - from_wallet;
    if remainder.is_positive() {
        let mut nb = tx
            .get_negative_balance(user_id)
            .await?
            .unwrap_or(NegativeBalance { id: 0, user_id, amount: Money::ZERO, last_activity_at: now });
        nb.amount += remainder;
        nb.last_activity_at = now;
        tx.save_negative_balance(&nb).await?;
    }

    Ok(from_wallet)
}

/// Deduct a penalty from its owner's wallet, carrying any shortfall into
/// `NegativeBalance`, and mark the `Penalty` row `collected`.
pub async fn collect_penalty(
    store: &dyn Store,
    clock: &dyn Clock,
    penalty_id: i64,
) -> EngineResult<Penalty> {
    let mut tx = store.begin().await?;
    let mut penalty = tx
        .get_penalty(penalty_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("penalty {penalty_id}")))?;

    let collected = offset_wallet_then_negative_balance(
        &mut *tx,
        clock,
        penalty.user_id,
        penalty.amount,
        TransactionType::Penalty,
        ids::derive(&format!("penalty_{penalty_id}"), "collect"),
        Some(penalty.shift_id),
    )
    .await?;

    penalty.collected_amount = Some(collected);
    penalty.status = PenaltyStatus::Collected;
    tx.save_penalty(&penalty).await?;
    tx.commit().await?;
    Ok(penalty)
}

/// Count active non-warning strikes within their 90-day window and, once a
/// third lands, suspend the user for 30 days.
pub async fn evaluate_suspension(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
    user_id: i64,
) -> EngineResult<Option<UserSuspension>> {
    let mut tx = store.begin().await?;
    let now = clock.now();
    let active_count = tx
        .list_strikes_for_user(user_id)
        .await?
        .iter()
        .filter(|s| s.counts_toward_suspension(now))
        .count();

    if active_count < SUSPENSION_STRIKE_THRESHOLD {
        tx.commit().await?;
        return Ok(None);
    }
    if tx.get_active_suspension(user_id).await?.is_some() {
        tx.commit().await?;
        return Ok(None);
    }

    let suspension = tx
        .insert_suspension(UserSuspension {
            id: 0,
            user_id,
            reason: format!("{active_count} active strikes within {STRIKE_WINDOW_DAYS} days"),
            suspended_at: now,
            suspended_until: Some(now + Duration::days(SUSPENSION_DAYS)),
            is_active: true,
            lifted_by: None,
        })
        .await?;
    tx.set_user_active(user_id, false).await?;
    tx.commit().await?;
    notify
        .notify(Notice::UserSuspended { user_id, suspension_id: suspension.id })
        .await;
    Ok(Some(suspension))
}

/// Hourly job: lift every time-bound suspension whose `suspended_until`
/// has passed, reactivating the user.
/// Indefinite suspensions (written off for inactivity) are untouched —
/// those only lift through [`review_appeal`].
pub async fn lift_expired_suspensions(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
) -> EngineResult<Vec<UserSuspension>> {
    let now = clock.now();
    let expired_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let expired = tx.list_expired_suspensions(now).await?;
        tx.commit().await?;
        expired.into_iter().map(|s| s.id).collect()
    };

    let mut lifted = Vec::with_capacity(expired_ids.len());
    for suspension_id in expired_ids {
        let mut tx = store.begin().await?;
        // Re-list inside this transaction in case another job already
        // lifted it between the scan above and this lock.
        let suspension = tx
            .list_expired_suspensions(now)
            .await?
            .into_iter()
            .find(|s| s.id == suspension_id);
        let Some(mut suspension) = suspension else {
            tx.commit().await?;
            continue;
        };
        suspension.is_active = false;
        tx.save_suspension(&suspension).await?;
        tx.set_user_active(suspension.user_id, true).await?;
        tx.commit().await?;
        notify
            .notify(Notice::SuspensionLifted { user_id: suspension.user_id, suspension_id })
            .await;
        lifted.push(suspension);
    }
    Ok(lifted)
}

/// Apply the agency-managed no-show path: the penalty lands on the agency
/// wallet, the worker is untouched, and the "strike" is a tagged
/// transaction rather than a `Strike` row.
async fn process_agency_noshow(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    agency_user_id: i64,
    shift_cost: Money,
) -> EngineResult<Penalty> {
    let penalty_amount = shift_cost.percent_round(PENALTY_RATE_PCT);

    let mut tx = store.begin().await?;
    let penalty = tx
        .insert_penalty(Penalty {
            id: 0,
            user_id: agency_user_id,
            shift_id,
            amount: penalty_amount,
            reason: "no-show (agency-managed shift)".to_string(),
            status: PenaltyStatus::Pending,
            collected_amount: None,
            waived_by: None,
        })
        .await?;

    let now = clock.now();
    let wallet = tx
        .get_wallet_by_user(agency_user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet for user {agency_user_id}")))?;
    tx.insert_transaction(
        Transaction::new(
            wallet.id,
            TransactionType::CancellationFee,
            Money::ZERO,
            Money::ZERO,
            ids::derive(&format!("noshow_{shift_id}"), "agency_strike"),
            Some(shift_id),
            now,
        )
        .with_description("agency-supplied no-show strike")
        .complete(now),
    )
    .await?;
    let strike_count = tx
        .list_transactions_for_wallet(wallet.id)
        .await?
        .iter()
        .filter(|t| t.is_agency_supplied_marker())
        .count();
    tx.commit().await?;

    let penalty = collect_penalty(store, clock, penalty.id).await?;

    if strike_count == AGENCY_STRIKE_WARNING_THRESHOLD {
        tracing::warn!(agency_user_id, strike_count, "agency reached no-show warning threshold");
    } else if strike_count >= AGENCY_STRIKE_SUSPENSION_THRESHOLD {
        let mut tx = store.begin().await?;
        if tx.get_active_suspension(agency_user_id).await?.is_none() {
            let suspension = tx
                .insert_suspension(UserSuspension {
                    id: 0,
                    user_id: agency_user_id,
                    reason: format!("{strike_count} agency-supplied no-show strikes"),
                    suspended_at: now,
                    suspended_until: Some(now + Duration::days(SUSPENSION_DAYS)),
                    is_active: true,
                    lifted_by: None,
                })
                .await?;
            tx.set_user_active(agency_user_id, false).await?;
            tx.commit().await?;
            tracing::error!(agency_user_id, suspension_id = suspension.id, "agency suspended for no-show reliability");
        } else {
            tx.commit().await?;
        }
    }

    Ok(penalty)
}

/// No-show detection and sanction: no-show path end to end — agency
/// routing, first-offense leniency, the same-day strike cap, and the
/// mandatory full refund/cancellation regardless of branch.
pub async fn process_noshow(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
    shift_id: i64,
) -> EngineResult<NoShowOutcome> {
    let (shift, worker_id) = {
        let mut tx = store.begin().await?;
        let shift = tx
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
        let application = tx
            .get_sole_accepted_application(shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
        tx.commit().await?;
        (shift, application.applicant_id)
    };

    let now = clock.now();
    if now < shift.start_at() + Duration::minutes(NO_SHOW_GRACE_MINUTES) {
        return Err(EngineError::Validation(format!(
            "shift {shift_id} has not yet passed its no-show grace period"
        )));
    }

    let shift_cost = shift.daily_cost();
    let (strike, penalty) = if shift.is_agency_managed {
        let agency_id = shift.payer_company_id();
        let penalty = process_agency_noshow(store, clock, shift_id, agency_id, shift_cost).await?;
        (None, Some(penalty))
    } else {
        let mut tx = store.begin().await?;
        let first_offense = !tx.has_any_prior_strike(worker_id).await?;

        if first_offense {
            let strike = tx
                .insert_strike(Strike {
                    id: 0,
                    user_id: worker_id,
                    shift_id: Some(shift_id),
                    reason: "first no-show (warning only)".to_string(),
                    created_at: now,
                    expires_at: now + Duration::days(STRIKE_WINDOW_DAYS),
                    is_active: true,
                    is_warning_only: true,
                })
                .await?;
            tx.commit().await?;
            notify.notify(Notice::StrikeIssued { user_id: worker_id, strike_id: strike.id }).await;
            (Some(strike), None)
        } else {
            let same_day_cap = tx
                .list_strikes_for_user(worker_id)
                .await?
                .iter()
                .any(|s| s.is_active && !s.is_warning_only && s.is_same_day(now));

            let strike = if same_day_cap {
                None
            } else {
                let strike = tx
                    .insert_strike(Strike {
                        id: 0,
                        user_id: worker_id,
                        shift_id: Some(shift_id),
                        reason: "no-show".to_string(),
                        created_at: now,
                        expires_at: now + Duration::days(STRIKE_WINDOW_DAYS),
                        is_active: true,
                        is_warning_only: false,
                    })
                    .await?;
                Some(strike)
            };
            tx.commit().await?;
            if let Some(s) = &strike {
                notify.notify(Notice::StrikeIssued { user_id: worker_id, strike_id: s.id }).await;
                evaluate_suspension(store, clock, notify, worker_id).await?;
            }

            let penalty_amount = shift_cost.percent_round(PENALTY_RATE_PCT);
            let mut tx = store.begin().await?;
            let penalty = tx
                .insert_penalty(Penalty {
                    id: 0,
                    user_id: worker_id,
                    shift_id,
                    amount: penalty_amount,
                    reason: "no-show".to_string(),
                    status: PenaltyStatus::Pending,
                    collected_amount: None,
                    waived_by: None,
                })
                .await?;
            tx.commit().await?;
            let penalty = collect_penalty(store, clock, penalty.id).await?;
            (strike, Some(penalty))
        }
    };

    let idem_key = ids::derive(&format!("noshow_{shift_id}"), "cancel");
    let cancellation = process_cancellation(store, clock, shift_id, CancelledBy::Platform, Some(now), Some(idem_key)).await?;

    Ok(NoShowOutcome { strike, penalty, cancellation })
}

/// Offset `earnings` against a user's carried negative balance before it
/// flows into a payout: `(offset, remaining)` with `remaining` the amount
/// that actually reaches the payout.
pub async fn offset_negative_balance(
    store: &dyn Store,
    clock: &dyn Clock,
    user_id: i64,
    earnings: Money,
) -> EngineResult<(Money, Money)> {
    let mut tx = store.begin().await?;
    let Some(mut nb) = tx.get_negative_balance(user_id).await? else {
        tx.commit().await?;
        return Ok((Money::ZERO, earnings));
    };
    if !nb.amount.is_positive() {
        tx.commit().await?;
        return Ok((Money::ZERO, earnings));
    }

    let offset = nb.amount.min(earnings);
    nb.amount -= offset;
    nb.last_activity_at = clock.now();
    tx.save_negative_balance(&nb).await?;
    tx.commit().await?;
    Ok((offset, earnings - offset))
}

/// Daily job: write off negative balances untouched for 180 days, writing
/// off their associated pending penalties and suspending the user
/// indefinitely.
pub async fn write_off_stale_negative_balances(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
) -> EngineResult<Vec<NegativeBalance>> {
    let now = clock.now();
    let cutoff = now - Duration::days(NEGATIVE_BALANCE_WRITE_OFF_DAYS);
    let stale_user_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let stale = tx.list_stale_negative_balances(cutoff).await?;
        tx.commit().await?;
        stale.into_iter().map(|nb| nb.user_id).collect()
    };

    let mut written_off = Vec::with_capacity(stale_user_ids.len());
    for user_id in stale_user_ids {
        let mut tx = store.begin().await?;
        let Some(mut nb) = tx.get_negative_balance(user_id).await? else {
            tx.commit().await?;
            continue;
        };
        if !nb.amount.is_positive() {
            tx.commit().await?;
            continue;
        }
        nb.amount = Money::ZERO;
        nb.last_activity_at = now;
        tx.save_negative_balance(&nb).await?;

        for mut penalty in tx.list_pending_penalties_for_user(user_id).await? {
            penalty.status = PenaltyStatus::WrittenOff;
            tx.save_penalty(&penalty).await?;
        }

        let suspension = if tx.get_active_suspension(user_id).await?.is_none() {
            let suspension = tx
                .insert_suspension(UserSuspension {
                    id: 0,
                    user_id,
                    reason: "negative balance written off after 180 days of inactivity".to_string(),
                    suspended_at: now,
                    suspended_until: None,
                    is_active: true,
                    lifted_by: None,
                })
                .await?;
            tx.set_user_active(user_id, false).await?;
            Some(suspension)
        } else {
            None
        };
        tx.commit().await?;
        if let Some(suspension) = suspension {
            notify.notify(Notice::UserSuspended { user_id, suspension_id: suspension.id }).await;
        }
        written_off.push(nb);
    }
    Ok(written_off)
}

/// Submit an appeal against a penalty, strike, or suspension. Windows are
/// enforced where the related record carries its own timestamp (strikes,
/// suspensions); a `Penalty` carries none, so its appeal window is
/// considered open as long as the penalty itself still exists.
pub async fn submit_appeal(
    store: &dyn Store,
    clock: &dyn Clock,
    user_id: i64,
    appeal_type: AppealType,
    related_id: i64,
    reason: String,
    evidence_urls: Vec<String>,
    emergency_type: Option<EmergencyType>,
) -> EngineResult<Appeal> {
    let mut tx = store.begin().await?;
    let now = clock.now();

    if tx.has_pending_appeal(user_id, appeal_type, related_id).await? {
        return Err(EngineError::DuplicateAppeal);
    }

    match appeal_type {
        AppealType::Penalty => {
            let penalty = tx
                .get_penalty(related_id)
                .await?
                .ok_or_else(|| EngineError::InvalidAppeal(format!("penalty {related_id} not found")))?;
            if penalty.user_id != user_id {
                return Err(EngineError::Forbidden("penalty belongs to a different user".into()));
            }
        }
        AppealType::Strike => {
            let strike = tx
                .list_strikes_for_user(user_id)
                .await?
                .into_iter()
                .find(|s| s.id == related_id)
                .ok_or_else(|| EngineError::InvalidAppeal(format!("strike {related_id} not found")))?;
            if now > strike.created_at + appeal_type.window() {
                return Err(EngineError::AppealWindowClosed);
            }
        }
        AppealType::Suspension => {
            let suspension = tx
                .get_active_suspension(user_id)
                .await?
                .filter(|s| s.id == related_id)
                .ok_or_else(|| EngineError::InvalidAppeal(format!("active suspension {related_id} not found")))?;
            if now > suspension.suspended_at + appeal_type.window() {
                return Err(EngineError::AppealWindowClosed);
            }
        }
    }

    let appeal = tx
        .insert_appeal(Appeal {
            id: 0,
            user_id,
            appeal_type,
            related_id,
            reason,
            evidence_urls,
            emergency_type,
            status: AppealStatus::Pending,
            appeal_deadline: now + appeal_type.window(),
            frivolous_fee_charged: false,
            emergency_waiver_used: false,
        })
        .await?;
    tx.commit().await?;
    Ok(appeal)
}

/// Withdraw a still-pending appeal — only the appellant may do so.
pub async fn withdraw_appeal(store: &dyn Store, appeal_id: i64, user_id: i64) -> EngineResult<Appeal> {
    let mut tx = store.begin().await?;
    let mut appeal = tx
        .get_appeal(appeal_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("appeal {appeal_id}")))?;
    if appeal.user_id != user_id {
        return Err(EngineError::Forbidden("only the appellant may withdraw this appeal".into()));
    }
    if appeal.status != AppealStatus::Pending {
        return Err(EngineError::Conflict(format!("appeal {appeal_id} is no longer pending")));
    }
    appeal.status = AppealStatus::Withdrawn;
    tx.save_appeal(&appeal).await?;
    tx.commit().await?;
    Ok(appeal)
}

/// Adjudicate a pending appeal. `frivolous` is the
/// reviewer's judgment on denial only — approved appeals never charge a
/// fee.
pub async fn review_appeal(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
    appeal_id: i64,
    approve: bool,
    frivolous: bool,
    reviewer_id: i64,
) -> EngineResult<Appeal> {
    let mut tx = store.begin().await?;
    let mut appeal = tx
        .get_appeal(appeal_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("appeal {appeal_id}")))?;
    if appeal.status != AppealStatus::Pending {
        return Err(EngineError::Conflict(format!("appeal {appeal_id} already reviewed")));
    }

    let now = clock.now();
    if approve {
        match appeal.appeal_type {
            AppealType::Penalty => {
                let mut penalty = tx
                    .get_penalty(appeal.related_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("penalty {}", appeal.related_id)))?;
                if let Some(collected) = penalty.collected_amount.filter(|c| c.is_positive()) {
                    let wallet = tx
                        .get_wallet_by_user(penalty.user_id)
                        .await?
                        .ok_or_else(|| EngineError::NotFound(format!("wallet for user {}", penalty.user_id)))?;
                    let mut wallet = tx
                        .lock_wallet(wallet.id)
                        .await?
                        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))?;
                    wallet.balance += collected;
                    tx.save_wallet(&wallet).await?;
                    tx.insert_transaction(
                        Transaction::new(
                            wallet.id,
                            TransactionType::Refund,
                            collected,
                            Money::ZERO,
                            ids::derive(&format!("appeal_{appeal_id}"), "refund"),
                            Some(penalty.shift_id),
                            now,
                        )
                        .complete(now),
                    )
                    .await?;
                }
                penalty.status = PenaltyStatus::Waived;
                penalty.waived_by = Some(reviewer_id);
                tx.save_penalty(&penalty).await?;
            }
            AppealType::Strike => {
                if let Some(mut strike) = tx
                    .list_strikes_for_user(appeal.user_id)
                    .await?
                    .into_iter()
                    .find(|s| s.id == appeal.related_id)
                {
                    strike.is_active = false;
                    tx.save_strike(&strike).await?;
                }
            }
            AppealType::Suspension => {
                if let Some(mut suspension) = tx.get_active_suspension(appeal.user_id).await? {
                    suspension.is_active = false;
                    suspension.lifted_by = Some(reviewer_id);
                    tx.save_suspension(&suspension).await?;
                }
                tx.set_user_active(appeal.user_id, true).await?;
                for mut strike in tx.list_strikes_for_user(appeal.user_id).await? {
                    if strike.is_active {
                        strike.is_active = false;
                        tx.save_strike(&strike).await?;
                    }
                }
                tx.set_user_probation(appeal.user_id, Some(now + Duration::days(SUSPENSION_DAYS)))
                    .await?;
            }
        }

        if let Some(emergency_type) = appeal.emergency_type {
            match tx
                .insert_emergency_waiver(EmergencyWaiver {
                    id: 0,
                    user_id: appeal.user_id,
                    year: now.year(),
                    appeal_id,
                    emergency_type,
                })
                .await
            {
                Ok(_) => appeal.emergency_waiver_used = true,
                Err(DbError::UniqueViolation(_)) => {}
                Err(other) => return Err(other.into()),
            }
        }
        appeal.status = AppealStatus::Approved;
    } else {
        if frivolous {
            offset_wallet_then_negative_balance(
                &mut *tx,
                clock,
                appeal.user_id,
                Money::from_cents(FRIVOLOUS_APPEAL_FEE_CENTS),
                TransactionType::Penalty,
                ids::derive(&format!("appeal_{appeal_id}"), "frivolous_fee"),
                None,
            )
            .await?;
            appeal.frivolous_fee_charged = true;
        }
        appeal.status = AppealStatus::Denied;
    }

    tx.save_appeal(&appeal).await?;
    tx.commit().await?;
    notify
        .notify(Notice::AppealResolved { user_id: appeal.user_id, appeal_id, approved: approve })
        .await;
    Ok(appeal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::memory::MemoryStore;
    use crate::models::{Application, ApplicationStatus, Role, Shift, ShiftStatus, User, Wallet};
    use crate::notify::RecordingSink;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    async fn setup() -> (MemoryStore, TestClock) {
        let store = MemoryStore::new();
        store.seed_user(User { id: 1, role: Role::Company, active: true, deleted: false, probation_until: None }).await;
        store.seed_user(User { id: 2, role: Role::Staff, active: true, deleted: false, probation_until: None }).await;

        let mut company_wallet = Wallet::new(0, 1);
        company_wallet.balance = Money::from_cents(20_000);
        company_wallet.reserved = Money::from_cents(10_000);
        store.seed_wallet(Wallet { id: 1, ..company_wallet }).await;
        store.seed_wallet(Wallet::new(2, 2)).await;

        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 19, 0, 0).unwrap());
        store
            .seed_shift(Shift {
                id: 500,
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
            .seed_application(Application { id: 1, shift_id: 500, applicant_id: 2, status: ApplicationStatus::Accepted })
            .await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_funds_hold(crate::models::FundsHold {
                id: 0,
                wallet_id: 1,
                shift_id: 500,
                amount: Money::from_cents(10_000),
                status: crate::models::FundsHoldStatus::Active,
                description: None,
                expires_at: None,
                released_at: None,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        (store, clock)
    }

    #[tokio::test]
    async fn first_noshow_is_warning_only_with_full_refund() {
        let (store, clock) = setup().await;
        let notify = RecordingSink::new();
        let outcome = process_noshow(&store, &clock, &notify, 500).await.unwrap();

        let strike = outcome.strike.unwrap();
        assert!(strike.is_warning_only);
        assert!(outcome.penalty.is_none());

        let mut tx = store.begin().await.unwrap();
        let company = tx.lock_wallet(1).await.unwrap().unwrap();
        let shift = tx.get_shift(500).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(company.balance, Money::from_cents(20_000));
        assert_eq!(company.reserved, Money::ZERO);
        assert_eq!(shift.status, ShiftStatus::Cancelled);
    }

    #[tokio::test]
    async fn second_noshow_same_day_caps_strikes_but_keeps_penalty() {
        let (store, clock) = setup().await;
        let notify = RecordingSink::new();
        // Prime with a prior non-warning strike today.
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_strike(Strike {
                id: 0,
                user_id: 2,
                shift_id: None,
                reason: "no-show".into(),
                created_at: clock.now(),
                expires_at: clock.now() + Duration::days(90),
                is_active: true,
                is_warning_only: false,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let outcome = process_noshow(&store, &clock, &notify, 500).await.unwrap();
        assert!(outcome.strike.is_none());
        let penalty = outcome.penalty.unwrap();
        assert_eq!(penalty.amount, Money::from_cents(5_000));
        assert_eq!(penalty.status, PenaltyStatus::Collected);
    }

    #[tokio::test]
    async fn third_active_strike_triggers_suspension() {
        let (store, clock) = setup().await;
        let notify = RecordingSink::new();
        for i in 0..2 {
            let mut tx = store.begin().await.unwrap();
            tx.insert_strike(Strike {
                id: 0,
                user_id: 2,
                shift_id: None,
                reason: "no-show".into(),
                created_at: clock.now() - Duration::days(i + 1),
                expires_at: clock.now() + Duration::days(90),
                is_active: true,
                is_warning_only: false,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        process_noshow(&store, &clock, &notify, 500).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let suspension = tx.get_active_suspension(2).await.unwrap();
        let user = tx.get_user(2).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert!(suspension.is_some());
        assert!(!user.active);
    }

    #[tokio::test]
    async fn negative_balance_offsets_earnings_then_carries_remainder() {
        let store = MemoryStore::new();
        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_negative_balance(&NegativeBalance { id: 0, user_id: 9, amount: Money::from_cents(3_000), last_activity_at: clock.now() })
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let (offset, remaining) = offset_negative_balance(&store, &clock, 9, Money::from_cents(2_000)).await.unwrap();
        assert_eq!(offset, Money::from_cents(2_000));
        assert_eq!(remaining, Money::ZERO);

        let mut tx = store.begin().await.unwrap();
        let nb = tx.get_negative_balance(9).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(nb.amount, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn appeal_approval_refunds_collected_penalty() {
        let (store, clock) = setup().await;
        let notify = RecordingSink::new();
        // Force a collectible (non-first-offense) penalty.
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_strike(Strike {
                id: 0,
                user_id: 2,
                shift_id: None,
                reason: "seed".into(),
                created_at: clock.now() - Duration::days(5),
                expires_at: clock.now() + Duration::days(85),
                is_active: true,
                is_warning_only: false,
            })
            .await
            .unwrap();
            tx.save_wallet(&Wallet { balance: Money::from_cents(10_000), reserved: Money::ZERO, ..Wallet::new(2, 2) })
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }
        let outcome = process_noshow(&store, &clock, &notify, 500).await.unwrap();
        let penalty = outcome.penalty.unwrap();
        assert_eq!(penalty.collected_amount, Some(Money::from_cents(5_000)));

        let appeal = submit_appeal(&store, &clock, 2, AppealType::Penalty, penalty.id, "emergency".into(), vec![], None)
            .await
            .unwrap();
        let reviewed = review_appeal(&store, &clock, &notify, appeal.id, true, false, 1).await.unwrap();
        assert_eq!(reviewed.status, AppealStatus::Approved);

        let mut tx = store.begin().await.unwrap();
        let worker = tx.lock_wallet(2).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(worker.balance, Money::from_cents(10_000));
    }
}
