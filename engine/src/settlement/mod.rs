//! Reservation & settlement core.
//!
//! The three money-moving paths here — reserve, settle, cancel — never
//! touch `Wallet.balance`/`reserved` without appending a matching
//! `Transaction` in the same atomic unit, and every cross-wallet step goes
//! through [`crate::db::lock_wallets_in_order`] per fixed lock order.

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::db::{lock_wallets_in_order, Store, StoreTx};
use crate::error::{EngineError, EngineResult, InsufficientFundsDetail};
use crate::ids;
use crate::models::{
    FundsHold, FundsHoldStatus, ScheduledReserve, ScheduledReserveStatus, Shift, ShiftStatus,
    Transaction, TransactionType, Wallet,
};
use crate::money::Money;
use crate::notify::{NotificationSink, Notice};

/// Who initiated a cancellation — drives the refund/compensation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledBy {
    Worker,
    Company,
    Platform,
}

async fn payer_wallet_for_shift(
    tx: &mut dyn StoreTx,
    shift: &Shift,
    wallet_override: Option<i64>,
) -> EngineResult<Wallet> {
    let wallet = if shift.is_mode_b() {
        tx.get_wallet_by_user(shift.payer_company_id()).await?
    } else if let Some(wallet_id) = wallet_override {
        return tx
            .lock_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {wallet_id}")));
    } else {
        tx.get_wallet_by_user(shift.payer_company_id()).await?
    };
    let wallet = wallet.ok_or_else(|| {
        EngineError::NotFound(format!("wallet for payer {}", shift.payer_company_id()))
    })?;
    tx.lock_wallet(wallet.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))
}

/// Reserve funds against a shift's first day. Routes the payer wallet
/// through agency mode; fails fast with a structured
/// [`InsufficientFundsDetail`] if the wallet can't cover `daily_cost +
/// minimum_balance`.
pub async fn reserve_shift_funds(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    wallet_override: Option<i64>,
    idem_key: Option<String>,
) -> EngineResult<FundsHold> {
    let mut tx = store.begin().await?;
    let shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;

    let idem_key = idem_key.unwrap_or_else(|| ids::generate("reserve"));
    if let Some(existing_tx) = tx.find_transaction_by_idem_key(&idem_key).await? {
        if let Some(hold) = tx.get_active_hold_for_shift(shift_id).await? {
            tx.commit().await?;
            return Ok(hold);
        }
        tx.commit().await?;
        return Err(EngineError::Conflict(format!(
            "idempotency key {} already used by transaction {}",
            idem_key, existing_tx.id
        )));
    }

    let mut wallet = payer_wallet_for_shift(&mut *tx, &shift, wallet_override).await?;
    if wallet.is_suspended() {
        return Err(EngineError::WalletSuspended(wallet.id));
    }

    if tx.get_active_hold(wallet.id, shift_id).await?.is_some() {
        return Err(EngineError::Conflict(format!(
            "shift {shift_id} already has an active hold"
        )));
    }

    let daily_cost = shift.daily_cost();
    let required = daily_cost + wallet.minimum_balance;
    let available = wallet.available();
    if available < required {
        return Err(EngineError::InsufficientFunds(InsufficientFundsDetail {
            required,
            available,
            shortfall: required - available,
            minimum_balance: Some(wallet.minimum_balance),
        }));
    }

    let now = clock.now();
    let hold = tx
        .insert_funds_hold(FundsHold {
            id: 0,
            wallet_id: wallet.id,
            shift_id,
            amount: daily_cost,
            status: FundsHoldStatus::Active,
            description: None,
            expires_at: Some(shift.end_at() + chrono::Duration::hours(24)),
            released_at: None,
        })
        .await?;

    wallet.reserved += daily_cost;
    tx.save_wallet(&wallet).await?;

    tx.insert_transaction(
        Transaction::new(
            wallet.id,
            TransactionType::Reserve,
            daily_cost,
            Money::ZERO,
            idem_key,
            Some(shift_id),
            now,
        )
        .complete(now),
    )
    .await?;

    tx.commit().await?;
    Ok(hold)
}

/// Create one `ScheduledReserve` row per non-first day of a multi-day
/// shift, each `execute_at = day_start - 48h`.
pub async fn schedule_subsequent_reserves(
    store: &dyn Store,
    shift_id: i64,
    days: Vec<NaiveDate>,
) -> EngineResult<Vec<ScheduledReserve>> {
    let mut tx = store.begin().await?;
    let shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    let wallet = payer_wallet_for_shift(&mut *tx, &shift, None).await?;

    let mut created = Vec::with_capacity(days.len());
    for day in days {
        let execute_at = day.and_time(shift.start_time).and_utc() - chrono::Duration::hours(48);
        let reserve = tx
            .insert_scheduled_reserve(ScheduledReserve {
                id: 0,
                shift_id,
                wallet_id: wallet.id,
                shift_date: day,
                amount: shift.daily_cost(),
                execute_at,
                status: ScheduledReserveStatus::Pending,
                failure_reason: None,
            })
            .await?;
        created.push(reserve);
    }
    tx.commit().await?;
    Ok(created)
}

/// Execute one due `ScheduledReserve`, repeating the reserve path. On
/// `InsufficientFunds` the row transitions to `failed` rather than
/// propagating — the caller (the scheduler) moves on to the next row.
pub async fn execute_scheduled_reserve(
    store: &dyn Store,
    clock: &dyn Clock,
    notify: &dyn NotificationSink,
    reserve_id: i64,
) -> EngineResult<ScheduledReserve> {
    let (shift_id, wallet_id) = {
        let mut tx = store.begin().await?;
        let reserve = tx
            .get_scheduled_reserve(reserve_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("scheduled reserve {reserve_id}")))?;
        tx.commit().await?;
        (reserve.shift_id, reserve.wallet_id)
    };

    let idem_key = ids::derive(&format!("scheduled_reserve_{reserve_id}"), "reserve");
    match reserve_shift_funds(store, clock, shift_id, Some(wallet_id), Some(idem_key)).await {
        Ok(_) => {
            let mut tx = store.begin().await?;
            let mut reserve = tx
                .get_scheduled_reserve(reserve_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("scheduled reserve {reserve_id}")))?;
            reserve.status = ScheduledReserveStatus::Completed;
            tx.save_scheduled_reserve(&reserve).await?;
            tx.commit().await?;
            Ok(reserve)
        }
        Err(EngineError::InsufficientFunds(detail)) => {
            let mut tx = store.begin().await?;
            let mut reserve = tx
                .get_scheduled_reserve(reserve_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("scheduled reserve {reserve_id}")))?;
            reserve.status = ScheduledReserveStatus::Failed;
            reserve.failure_reason = Some(detail.to_string());
            tx.save_scheduled_reserve(&reserve).await?;
            tx.commit().await?;
            notify.notify(Notice::AutoTopupFailed { user_id: wallet_id }).await;
            Ok(reserve)
        }
        Err(other) => Err(other),
    }
}

/// Settle a shift: close its `FundsHold`, split `hours_used x hourly_rate`
/// between platform commission and the recipient wallet (the agency's in
/// Mode B, otherwise the sole accepted applicant's).
pub async fn settle_shift(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    actual_hours: Option<f64>,
    idem_key: Option<String>,
) -> EngineResult<Vec<Transaction>> {
    let mut tx = store.begin().await?;
    let mut shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    let hold = tx
        .get_active_hold_for_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::Conflict(format!("no active hold for shift {shift_id}")))?;
    if hold.is_escrow() {
        return Err(EngineError::Conflict(format!(
            "shift {shift_id} hold is in escrow, resolve the dispute first"
        )));
    }

    let base_key = idem_key.unwrap_or_else(|| ids::generate("settle"));
    let settlement_key = ids::derive(&base_key, "settlement");
    if let Some(existing) = tx.find_transaction_by_idem_key(&settlement_key).await? {
        let mut results = vec![existing];
        for suffix in ["commission", "refund"] {
            if let Some(t) = tx
                .find_transaction_by_idem_key(&ids::derive(&base_key, suffix))
                .await?
            {
                results.push(t);
            }
        }
        tx.commit().await?;
        return Ok(results);
    }

    let hours_used = actual_hours
        .or(shift.actual_hours_worked)
        .unwrap_or_else(|| shift.scheduled_hours());
    let gross = shift.hourly_rate.mul_f64_round(hours_used);
    let platform_fee = gross.percent_round(15.0);
    let recipient_amount = gross - platform_fee;
    let diff = hold.amount.checked_sub(gross).unwrap_or(Money::ZERO);

    let recipient_user_id = if shift.is_mode_b() {
        None
    } else {
        let application = tx
            .get_sole_accepted_application(shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
        Some(application.applicant_id)
    };

    let now = clock.now();
    let mut created = Vec::new();

    let same_wallet = recipient_user_id.is_none();
    if same_wallet {
        let mut wallet = tx
            .lock_wallet(hold.wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", hold.wallet_id)))?;
        wallet.reserved = wallet.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);
        wallet.balance -= gross;
        wallet.balance += recipient_amount;
        tx.save_wallet(&wallet).await?;

        created.push(
            tx.insert_transaction(
                Transaction::new(
                    wallet.id,
                    TransactionType::Commission,
                    platform_fee,
                    Money::ZERO,
                    ids::derive(&base_key, "commission"),
                    Some(shift_id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
        if diff.is_positive() {
            created.push(
                tx.insert_transaction(
                    Transaction::new(
                        wallet.id,
                        TransactionType::Refund,
                        diff,
                        Money::ZERO,
                        ids::derive(&base_key, "refund"),
                        Some(shift_id),
                        now,
                    )
                    .complete(now),
                )
                .await?,
            );
        }
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    wallet.id,
                    TransactionType::Settlement,
                    gross,
                    platform_fee,
                    settlement_key,
                    Some(shift_id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
    } else {
        let recipient_user_id = recipient_user_id.unwrap();
        let recipient_wallet = tx
            .get_wallet_by_user(recipient_user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet for user {recipient_user_id}")))?;

        let (mut first, mut second) =
            lock_wallets_in_order(&mut *tx, hold.wallet_id, recipient_wallet.id).await?;
        let (payer, recipient) = if first.id == hold.wallet_id {
            (&mut first, &mut second)
        } else {
            (&mut second, &mut first)
        };

        payer.reserved = payer.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);
        payer.balance -= gross;
        recipient.balance += recipient_amount;
        tx.save_wallet(payer).await?;
        tx.save_wallet(recipient).await?;

        created.push(
            tx.insert_transaction(
                Transaction::new(
                    payer.id,
                    TransactionType::Commission,
                    platform_fee,
                    Money::ZERO,
                    ids::derive(&base_key, "commission"),
                    Some(shift_id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
        if diff.is_positive() {
            created.push(
                tx.insert_transaction(
                    Transaction::new(
                        payer.id,
                        TransactionType::Refund,
                        diff,
                        Money::ZERO,
                        ids::derive(&base_key, "refund"),
                        Some(shift_id),
                        now,
                    )
                    .complete(now),
                )
                .await?,
            );
        }
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    recipient.id,
                    TransactionType::Settlement,
                    gross,
                    platform_fee,
                    settlement_key,
                    Some(shift_id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
    }

    let mut hold = hold;
    hold.status = FundsHoldStatus::Settled;
    hold.released_at = Some(now);
    tx.save_funds_hold(&hold).await?;

    shift.status = ShiftStatus::Completed;
    shift.actual_hours_worked = Some(hours_used);
    tx.save_shift(&shift).await?;

    tx.commit().await?;
    Ok(created)
}

/// Release a shift's hold on cancellation, applying the refund /
/// compensation table.
pub async fn process_cancellation(
    store: &dyn Store,
    clock: &dyn Clock,
    shift_id: i64,
    cancelled_by: CancelledBy,
    at: Option<DateTime<Utc>>,
    idem_key: Option<String>,
) -> EngineResult<Vec<Transaction>> {
    let mut tx = store.begin().await?;
    let mut shift = tx
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("shift {shift_id}")))?;
    let hold = tx
        .get_active_hold_for_shift(shift_id)
        .await?
        .ok_or_else(|| EngineError::Conflict(format!("no active hold for shift {shift_id}")))?;
    if hold.is_escrow() {
        return Err(EngineError::Conflict(format!(
            "shift {shift_id} hold is in escrow, resolve the dispute first"
        )));
    }

    let base_key = idem_key.unwrap_or_else(|| ids::generate("cancel"));
    let release_key = ids::derive(&base_key, "release");
    if tx.find_transaction_by_idem_key(&release_key).await?.is_some() {
        tx.commit().await?;
        return Ok(Vec::new());
    }

    let now = at.unwrap_or_else(|| clock.now());
    let delta_hours = (shift.start_at() - now).num_seconds() as f64 / 3600.0;

    // `worker_compensation` is only ever non-zero in the <24h branch (paid
    // out to the worker/agency); the 24-48h band withholds 50% from the
    // refund without paying it to anyone — the platform simply keeps it.
    let (refund_amount, worker_compensation, withheld_amount) = match cancelled_by {
        CancelledBy::Worker | CancelledBy::Platform => (hold.amount, Money::ZERO, Money::ZERO),
        CancelledBy::Company => {
            if delta_hours >= 48.0 {
                (hold.amount, Money::ZERO, Money::ZERO)
            } else if delta_hours >= 24.0 {
                let withheld = hold.amount.percent_round(50.0);
                (hold.amount - withheld, Money::ZERO, withheld)
            } else {
                let compensation = shift
                    .hourly_rate
                    .mul_f64_round(2.0)
                    .percent_round(85.0)
                    .min(hold.amount);
                (hold.amount - compensation, compensation, Money::ZERO)
            }
        }
    };

    let mut payer = tx
        .lock_wallet(hold.wallet_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", hold.wallet_id)))?;
    let mut created = Vec::new();

    payer.reserved = payer.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);

    if worker_compensation.is_positive() && !shift.is_agency_managed {
        payer.balance -= worker_compensation;
        let application = tx
            .get_sole_accepted_application(shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("accepted application for shift {shift_id}")))?;
        let mut recipient = tx
            .get_wallet_by_user(application.applicant_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet for user {}", application.applicant_id)))?;
        recipient = tx
            .lock_wallet(recipient.id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", recipient.id)))?;
        recipient.balance += worker_compensation;
        tx.save_wallet(&payer).await?;
        tx.save_wallet(&recipient).await?;
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    recipient.id,
                    TransactionType::CancellationFee,
                    worker_compensation,
                    Money::ZERO,
                    ids::derive(&base_key, "fee"),
                    Some(shift_id),
                    now,
                )
                .complete(now),
            )
            .await?,
        );
    } else if worker_compensation.is_positive() {
        // Agency-managed shift: the agency is already the payer, so the
        // compensation is paid to the same wallet it came from.
        payer.balance -= worker_compensation;
        payer.balance += worker_compensation;
        tx.save_wallet(&payer).await?;
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    payer.id,
                    TransactionType::CancellationFee,
                    worker_compensation,
                    Money::ZERO,
                    ids::derive(&base_key, "fee"),
                    Some(shift_id),
                    now,
                )
                .with_description("agency-supplied")
                .complete(now),
            )
            .await?,
        );
    } else if withheld_amount.is_positive() {
        // 24-48h company cancellation: the non-refunded half is simply
        // withheld from the payer, not paid out to the worker or agency.
        payer.balance -= withheld_amount;
        tx.save_wallet(&payer).await?;
        created.push(
            tx.insert_transaction(
                Transaction::new(
                    payer.id,
                    TransactionType::CancellationFee,
                    withheld_amount,
                    Money::ZERO,
                    ids::derive(&base_key, "fee"),
                    Some(shift_id),
                    now,
                )
                .with_description("platform-retained")
                .complete(now),
            )
            .await?,
        );
    } else {
        tx.save_wallet(&payer).await?;
    }

    created.push(
        tx.insert_transaction(
            Transaction::new(
                payer.id,
                TransactionType::Release,
                refund_amount,
                Money::ZERO,
                release_key,
                Some(shift_id),
                now,
            )
            .complete(now),
        )
        .await?,
    );

    let mut hold = hold;
    hold.status = FundsHoldStatus::Released;
    hold.released_at = Some(now);
    tx.save_funds_hold(&hold).await?;

    shift.status = ShiftStatus::Cancelled;
    tx.save_shift(&shift).await?;

    tx.commit().await?;
    Ok(created)
}

/// Expire every `active` hold past its `expires_at` with no resolution,
/// releasing its amount from `wallet.reserved`. Escrow holds are left alone —
/// a dispute in flight resolves through [`crate::escrow`], not here.
pub async fn expire_funds_holds(store: &dyn Store, clock: &dyn Clock) -> EngineResult<Vec<FundsHold>> {
    let now = clock.now();
    let candidate_ids: Vec<i64> = {
        let mut tx = store.begin().await?;
        let holds = tx.list_expirable_holds(now).await?;
        tx.commit().await?;
        holds.into_iter().filter(|h| !h.is_escrow()).map(|h| h.id).collect()
    };

    let mut expired = Vec::with_capacity(candidate_ids.len());
    for hold_id in candidate_ids {
        let mut tx = store.begin().await?;
        // Re-list inside this transaction so we act on a freshly locked
        // view — another job may have resolved the hold in between.
        let hold = tx
            .list_expirable_holds(now)
            .await?
            .into_iter()
            .find(|h| h.id == hold_id && !h.is_escrow());
        let Some(mut hold) = hold else {
            tx.commit().await?;
            continue;
        };

        let mut wallet = tx
            .lock_wallet(hold.wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", hold.wallet_id)))?;
        wallet.reserved = wallet.reserved.checked_sub(hold.amount).unwrap_or(Money::ZERO);
        tx.save_wallet(&wallet).await?;

        hold.status = FundsHoldStatus::Expired;
        hold.released_at = Some(now);
        tx.save_funds_hold(&hold).await?;

        tx.insert_transaction(
            Transaction::new(
                wallet.id,
                TransactionType::Release,
                hold.amount,
                Money::ZERO,
                ids::derive(&format!("hold_{hold_id}"), "expire"),
                Some(hold.shift_id),
                now,
            )
            .complete(now),
        )
        .await?;

        tx.commit().await?;
        expired.push(hold);
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::memory::MemoryStore;
    use crate::models::{Application, ApplicationStatus, Role, Shift, ShiftStatus, User};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    async fn wallet_snapshot(store: &MemoryStore, wallet_id: i64) -> Wallet {
        let mut tx = store.begin().await.unwrap();
        let wallet = tx.lock_wallet(wallet_id).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        wallet
    }

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

        let worker_wallet = Wallet::new(2, 2);
        store.seed_wallet(worker_wallet).await;

        store
            .seed_shift(Shift {
                id: 100,
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
            .seed_application(Application {
                id: 1,
                shift_id: 100,
                applicant_id: 2,
                status: ApplicationStatus::Accepted,
            })
            .await;

        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap());
        (store, clock)
    }

    #[tokio::test]
    async fn scenario_one_full_settlement() {
        let (store, clock) = setup().await;
        let hold = reserve_shift_funds(&store, &clock, 100, None, None).await.unwrap();
        assert_eq!(hold.amount, Money::from_cents(10_000));

        let txs = settle_shift(&store, &clock, 100, Some(5.0), None).await.unwrap();
        assert!(!txs.is_empty());

        let company = wallet_snapshot(&store, 1).await;
        let worker = wallet_snapshot(&store, 2).await;
        assert_eq!(company.balance, Money::from_cents(2_000));
        assert_eq!(company.reserved, Money::ZERO);
        assert_eq!(worker.balance, Money::from_cents(8_500));
    }

    #[tokio::test]
    async fn scenario_two_partial_hours_refunds_difference() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 100, None, None).await.unwrap();
        settle_shift(&store, &clock, 100, Some(3.0), None).await.unwrap();

        let company = wallet_snapshot(&store, 1).await;
        let worker = wallet_snapshot(&store, 2).await;
        assert_eq!(company.balance, Money::from_cents(6_000));
        assert_eq!(worker.balance, Money::from_cents(5_100));
    }

    #[tokio::test]
    async fn worker_cancellation_is_always_full_refund() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 100, None, None).await.unwrap();
        process_cancellation(&store, &clock, 100, CancelledBy::Worker, None, None)
            .await
            .unwrap();

        let company = wallet_snapshot(&store, 1).await;
        assert_eq!(company.balance, Money::from_cents(12_000));
        assert_eq!(company.reserved, Money::ZERO);
    }

    #[tokio::test]
    async fn company_cancellation_under_24h_pays_worker_compensation() {
        let (store, clock) = setup().await;
        reserve_shift_funds(&store, &clock, 100, None, None).await.unwrap();
        // Shift starts 2026-08-01T18:00Z; within 24h means `now` close to start.
        clock.set(Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap());
        process_cancellation(&store, &clock, 100, CancelledBy::Company, None, None)
            .await
            .unwrap();

        let worker = wallet_snapshot(&store, 2).await;
        // 2h * $20/h * 0.85 = $34.00
        assert_eq!(worker.balance, Money::from_cents(3_400));
    }
}
