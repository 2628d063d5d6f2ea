//! Escrow & dispute engine.
//!
//! Escrow is not a separate ledger entity — it is the shift's existing
//! `FundsHold` re-flagged with the `ESCROW:` description prefix the moment
//! a dispute opens (see [`FundsHold::is_escrow`]). Wallet `reserved` never
//! moves at dispute creation: the hold that already carries the shift's
//! reservation keeps carrying it, just under a different label, until
//! `resolve_dispute` or `auto_resolve_overdue_disputes` releases it.

use crate::clock::{add_business_days, Clock};
use crate::db::{lock_wallets_in_order, Store, StoreTx};
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::models::{
    Dispute, DisputeStatus, FundsHoldStatus, Shift, ShiftStatus, Transaction, TransactionType,
};
use crate::money::Money;
use crate::notify::{NotificationSink, Notice};

/// How a dispute was adjudicated.
#[derive(Debug, Clone, Copy)]
pub enum Resolution {
    ForRaiser,
    AgainstRaiser,
    /// `split_pct ∈ [0, 100]` is always the **worker's** share, regardless
    /// of who raised the dispute.
    Split(f64),
}

async fn worker_applicant_id(tx: &mut dyn StoreTx, shift_id: i64) -> EngineResult<i64> {
    let application = tx
        .get_sole_accepted_application(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
    Ok(application.applicant_id)
}

/// Open a dispute on a completed shift, converting its existing hold into
/// an escrow hold.
///
/// Preconditions: shift is `completed`; the dispute is raised within
/// 7 days of completion; no dispute is already open for the shift.
pub async fn create_dispute(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    raised_by: i64,
    reason: String,
    disputed_amount: Option<Money>,
) -> EngineResult<Dispute> {
    let mut tx = store.begin().await?;
    let shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;

    if shift.status != ShiftStatus::Completed {
        return Err(EngineError::Validation(format!(
            "shift {shift_id} is not completed"
        )));
    }

    let now = clock.now();
    let completed_at = shift.clock_out_at.unwrap_or_else(|| shift.end_at());
    if now - completed_at > chrono::Duration::days(7) {
        return Err(EngineError::Validation(format!(
            "shift {shift_id} completed more than 7 days ago, dispute window closed"
        )));
    }

    if tx.get_open_dispute_for_shift(shift_id).await?.is_some() {
        return Err(EngineError::DuplicateDispute(shift_id));
    }

    let worker_id = worker_applicant_id(&mut *tx, shift_id).await?;
    let against_user_id = if raised_by == worker_id {
        shift.payer_company_id()
    } else {
        worker_id
    };

    let mut hold = tx
        .get_active_hold_for_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::Conflict(format!("no active hold for shift {shift_id}")))?;

    let disputed_amount = disputed_amount.unwrap_or(shift.daily_cost());
    if disputed_amount > hold.amount {
        return Err(EngineError::Validation(format!(
            "disputed amount {disputed_amount} exceeds held amount {}",
            hold.amount
        )));
    }

    hold.description = Some(format!(
        "{}shift {shift_id} dispute",
        crate::models::FundsHold::ESCROW_PREFIX
    ));
    tx.save_funds_hold(&hold).await?;

    let resolution_deadline = add_business_days(now, 3);
    let dispute = tx
        .insert_dispute(Dispute {
            id: 0,
            shift_id,
            raised_by_user_id: raised_by,
            against_user_id,
            amount_disputed: disputed_amount,
            reason,
            evidence: Vec::new(),
            status: DisputeStatus::Open,
            resolution_deadline,
            resolved_at: None,
        })
        .await?;

    tx.commit().await?;
    Ok(dispute)
}

/// Append evidence to a still-open dispute. Only a party to the dispute may
/// add evidence.
pub async fn add_evidence(
    store: &dyn Store,
    dispute_id: i64,
    caller_id: i64,
    evidence: Vec<String>,
) -> EngineResult<Dispute> {
    let mut tx = store.begin().await?;
    let mut dispute = tx
        .get_dispute(dispute_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("dispute {dispute_id}")))?;

    if caller_id != dispute.raised_by_user_id && caller_id != dispute.against_user_id {
        return Err(EngineError::Forbidden(
            "only dispute parties may add evidence".into(),
        ));
    }
    if !dispute.is_unresolved() {
        return Err(EngineError::Conflict(format!(
            "dispute {dispute_id} is already resolved"
        )));
    }

    dispute.evidence.extend(evidence);
    tx.save_dispute(&dispute).await?;
    tx.commit().await?;
    Ok(dispute)
}

/// Whether the resolution counts as `for` or `against` the raiser: the
/// raiser "wins" when their share of the disputed amount is at least half
/// (a tied `split` resolves for the raiser, deterministically).
fn resolved_status(raiser_share: Money, disputed: Money) -> DisputeStatus {
    if disputed.is_zero() || raiser_share.cents() * 2 >= disputed.cents() {
        DisputeStatus::ResolvedForRaiser
    } else {
        DisputeStatus::ResolvedAgainstRaiser
    }
}

/// Release an escrowed hold in full: `worker_share` of `amount_disputed`
/// credits the worker (or stays put, on a Mode-B shift where the worker
/// wallet and payer wallet are one), the remainder plus any undisputed
/// portion of the hold returns to the payer.
async fn release_escrow(
    tx: &mut dyn StoreTx,
    clock: &dyn Clock,
    shift: &Shift,
    dispute: &mut Dispute,
    worker_share: Money,
    resolved_status: DisputeStatus,
    base_key: &str,
) -> EngineResult<Vec<Transaction>> {
    let mut hold = tx
        .get_active_hold_for_shift(shift.id)
        .await?
        .ok_or_else(|| EngineError::Conflict(format!("no active hold for shift {}", shift.id)))?;
    if !hold.is_escrow() {
        return Err(EngineError::Conflict(format!(
            "shift {} hold is not in escrow",
            shift.id
        )));
    }

    let now = clock.now();
    let undisputed = hold.amount.checked_sub(dispute.amount_disputed).unwrap_or(Money::ZERO);
    let company_share = undisputed + (dispute.amount_disputed - worker_share);

    let worker_id = worker_applicant_id(tx, shift.id).await?;
    let mut created = Vec::new();

    if worker_id == shift.payer_company_id() {
        // Mode-B: a single wallet plays both roles, the transfer nets to
        // zero. Only the hold release itself is recorded.
        let mut wallet = tx
            .lock_wallet(hold.wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", hold.wallet_id)))?;
        wallet.reserved = wallet.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);
        tx.save_wallet(&wallet).await?;
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    wallet.id,
                    TransactionType::Release,
                    hold.amount,
                    Money::ZERO,
                    ids::derive(base_key, "release"),
                    Some(shift.id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
    } else {
        let worker_wallet = tx
            .get_wallet_by_user(worker_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet for user {worker_id}")))?;
        let (mut first, mut second) =
            lock_wallets_in_order(tx, hold.wallet_id, worker_wallet.id).await?;
        let (payer, worker) = if first.id == hold.wallet_id {
            (&mut first, &mut second)
        } else {
            (&mut second, &mut first)
        };

        payer.reserved = payer.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);
        if worker_share.is_positive() {
            payer.balance -= worker_share;
            worker.balance += worker_share;
        }
        tx.save_wallet(payer).await?;
        tx.save_wallet(worker).await?;

        created.push(
            tx.insert_transaction(
                Transaction::new(
                    payer.id,
                    TransactionType::Release,
                    company_share,
                    Money::ZERO,
                    ids::derive(base_key, "release"),
                    Some(shift.id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
        if worker_share.is_positive() {
            created.push(
                tx.insert_transaction(
                    Transaction::new(
                        worker.id,
                        TransactionType::Settlement,
                        worker_share,
                        Money::ZERO,
                        ids::derive(base_key, "worker_share"),
                        Some(shift.id),
                        now,
                    )
                    .complete(now),
                )
                .await?,
            );
        }
    }

    hold.status = FundsHoldStatus::Settled;
    hold.released_at = Some(now);
    tx.save_funds_hold(&hold).await?;

    dispute.status = resolved_status;
    dispute.resolved_at = Some(now);
    tx.save_dispute(dispute).await?;

    Ok(created)
}

/// Resolve an open or under-review dispute, releasing its escrow hold in
/// full.
pub async fn resolve_dispute(
    store: &dyn Store,
    clock: &dyn Clock,
    dispute_id: i64,
    resolution: Resolution,
    _admin_notes: String,
) -> EngineResult<Vec<Transaction>> {
    let mut tx = store.begin().await?;
    let mut dispute = tx
        .get_dispute(dispute_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("dispute {dispute_id}")))?;
    if !dispute.is_unresolved() {
        return Err(EngineError::Conflict(format!(
            "dispute {dispute_id} already resolved"
        )));
    }
    let shift = tx
        .get_shift(dispute.shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {}", dispute.shift_id)))?;

    let worker_id = worker_applicant_id(&mut *tx, shift.id).await?;
    let raiser_is_worker = dispute.raised_by_user_id == worker_id;

    let worker_share = match resolution {
        Resolution::ForRaiser => {
            if raiser_is_worker {
                dispute.amount_disputed
            } else {
                Money::ZERO
            }
        }
        Resolution::AgainstRaiser => {
            if raiser_is_worker {
                Money::ZERO
            } else {
                dispute.amount_disputed
            }
        }
        Resolution::Split(pct) => dispute.amount_disputed.percent_round(pct.clamp(0.0, 100.0)),
    };
    let raiser_share = if raiser_is_worker {
        worker_share
    } else {
        dispute.amount_disputed - worker_share
    };
    let status = resolved_status(raiser_share, dispute.amount_disputed);

    let base_key = ids::generate("dispute_resolve");
    let created = release_escrow(&mut *tx, clock, &shift, &mut dispute, worker_share, status, &base_key).await?;
    tx.commit().await?;
    Ok(created)
}

/// Resolve every `open`/`under_review` dispute whose `resolution_deadline`
/// has passed in favour of the worker, run hourly by the scheduler.
pub async fn auto_resolve_overdue_disputes(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
) -> EngineResult<Vec<Dispute>> {
    let now = clock.now();
    let overdue_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let disputes = tx.list_overdue_disputes(now).await?;
        tx.commit().await?;
        disputes.into_iter().map(|d| d.id).collect()
    };

    let mut resolved = Vec::with_capacity(overdue_ids.len());
    for dispute_id in overdue_ids {
        let mut tx = store.begin().await?;
        let mut dispute = match tx.get_dispute(dispute_id).await? {
            Some(d) if d.is_unresolved() => d,
            _ => {
                tx.commit().await?;
                continue;
            }
        };
        let shift = tx
            .get_shift(dispute.shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("shift {}", dispute.shift_id)))?;
        let worker_id = worker_applicant_id(&mut *tx, shift.id).await?;
        let raiser_is_worker = dispute.raised_by_user_id == worker_id;
        let status = if raiser_is_worker {
            DisputeStatus::ResolvedForRaiser
        } else {
            DisputeStatus::ResolvedAgainstRaiser
        };

        let base_key = ids::derive(&format!("auto_resolve_{dispute_id}"), "release");
        let worker_share = dispute.amount_disputed;
        release_escrow(&mut *tx, clock, &shift, &mut dispute, worker_share, status, &base_key).await?;
        tx.commit().await?;
        notify.notify(Notice::DisputeAutoResolved { dispute_id }).await;
        resolved.push(dispute);
    }
    Ok(resolved)
}
