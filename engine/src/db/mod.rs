//! Persistence & transactions
//!
//! [`memory::MemoryStore`] is a single struct owning every entity in
//! `BTreeMap`s, mutated in place with `&mut self` methods that enforce
//! invariants before returning — an in-process store used by engine tests
//! and as a reference semantics for [`postgres::PgStore`], the production
//! backend that implements the same [`Store`]/[`StoreTx`] contract against
//! real tables with row locks (`SELECT … FOR UPDATE`) and `sqlx`
//! transactions.
//!
//! Every public engine operation opens one [`StoreTx`], performs its reads
//! and writes, and either commits (on success) or drops without committing
//! (on error): every public operation is wrapped in a database transaction
//! that is committed on success and rolled back on any raised error.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::*;
use crate::money::Money;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("fatal invariant violated: {0}")]
    FatalInvariant(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => DbError::NotFound(e.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::UniqueViolation(e.to_string())
            }
            _ => DbError::Backend(e.to_string()),
        }
    }
}

/// A storage backend capable of opening atomic, row-lockable transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, DbError>;
}

/// One atomic unit of work. Every mutating method here corresponds to one
/// write inside the same database transaction; the caller commits once at
/// the end of a public engine operation.
///
/// Lock methods (`lock_*`) acquire a row lock (or the `MemoryStore`
/// equivalent, a held mutex guard) that is released on `commit`/drop.
/// Cross-wallet operations must acquire wallet locks in a fixed global
/// order (lowest `wallet.id` first) — callers are responsible for ordering
/// their `lock_wallet` calls accordingly; see [`lock_wallets_in_order`].
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> Result<(), DbError>;
    async fn rollback(self: Box<Self>) -> Result<(), DbError>;

    // -- users --
    async fn get_user(&mut self, id: i64) -> Result<Option<User>, DbError>;
    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), DbError>;
    async fn set_user_probation(
        &mut self,
        id: i64,
        probation_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>;

    // -- wallets --
    async fn get_wallet_by_user(&mut self, user_id: i64) -> Result<Option<Wallet>, DbError>;
    /// Row-lock a wallet by id for the remainder of the transaction.
    async fn lock_wallet(&mut self, id: i64) -> Result<Option<Wallet>, DbError>;
    async fn insert_wallet(&mut self, wallet: Wallet) -> Result<Wallet, DbError>;
    async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), DbError>;

    // -- shifts & applications --
    async fn get_shift(&mut self, id: i64) -> Result<Option<Shift>, DbError>;
    async fn save_shift(&mut self, shift: &Shift) -> Result<(), DbError>;
    async fn get_sole_accepted_application(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<Application>, DbError>;
    async fn list_noshow_candidates(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Shift>, DbError>;
    async fn list_completed_awaiting_auto_approve(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Shift>, DbError>;

    // -- transactions --
    async fn find_transaction_by_idem_key(
        &mut self,
        key: &str,
    ) -> Result<Option<Transaction>, DbError>;
    async fn insert_transaction(&mut self, tx: Transaction) -> Result<Transaction, DbError>;
    async fn list_transactions_for_wallet(
        &mut self,
        wallet_id: i64,
    ) -> Result<Vec<Transaction>, DbError>;

    // -- funds holds --
    async fn get_active_hold(
        &mut self,
        wallet_id: i64,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError>;
    async fn get_active_hold_for_shift(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError>;
    async fn insert_funds_hold(&mut self, hold: FundsHold) -> Result<FundsHold, DbError>;
    async fn save_funds_hold(&mut self, hold: &FundsHold) -> Result<(), DbError>;
    async fn list_expirable_holds(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<FundsHold>, DbError>;

    // -- scheduled reserves --
    async fn insert_scheduled_reserve(
        &mut self,
        reserve: ScheduledReserve,
    ) -> Result<ScheduledReserve, DbError>;
    async fn get_scheduled_reserve(&mut self, id: i64) -> Result<Option<ScheduledReserve>, DbError>;
    async fn list_due_scheduled_reserves(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReserve>, DbError>;
    async fn save_scheduled_reserve(&mut self, reserve: &ScheduledReserve) -> Result<(), DbError>;

    // -- payouts --
    async fn insert_payout(&mut self, payout: Payout) -> Result<Payout, DbError>;
    async fn list_payouts_for_wallet(&mut self, wallet_id: i64) -> Result<Vec<Payout>, DbError>;
    async fn list_payable_wallets(
        &mut self,
        min_available: Money,
    ) -> Result<Vec<Wallet>, DbError>;
    /// Wallets with auto-topup enabled whose `available` has fallen below
    /// their configured threshold.
    async fn list_wallets_needing_auto_topup(&mut self) -> Result<Vec<Wallet>, DbError>;

    // -- disputes --
    async fn get_dispute(&mut self, id: i64) -> Result<Option<Dispute>, DbError>;
    async fn get_open_dispute_for_shift(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<Dispute>, DbError>;
    async fn insert_dispute(&mut self, dispute: Dispute) -> Result<Dispute, DbError>;
    async fn save_dispute(&mut self, dispute: &Dispute) -> Result<(), DbError>;
    async fn list_overdue_disputes(&mut self, now: DateTime<Utc>) -> Result<Vec<Dispute>, DbError>;

    // -- strikes --
    async fn insert_strike(&mut self, strike: Strike) -> Result<Strike, DbError>;
    async fn list_strikes_for_user(&mut self, user_id: i64) -> Result<Vec<Strike>, DbError>;
    async fn save_strike(&mut self, strike: &Strike) -> Result<(), DbError>;
    async fn has_any_prior_strike(&mut self, user_id: i64) -> Result<bool, DbError>;

    // -- penalties --
    async fn insert_penalty(&mut self, penalty: Penalty) -> Result<Penalty, DbError>;
    async fn save_penalty(&mut self, penalty: &Penalty) -> Result<(), DbError>;
    async fn get_penalty(&mut self, id: i64) -> Result<Option<Penalty>, DbError>;
    async fn list_pending_penalties_for_user(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Penalty>, DbError>;

    // -- negative balance --
    async fn get_negative_balance(&mut self, user_id: i64) -> Result<Option<NegativeBalance>, DbError>;
    async fn save_negative_balance(&mut self, nb: &NegativeBalance) -> Result<(), DbError>;
    async fn list_stale_negative_balances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NegativeBalance>, DbError>;

    // -- suspensions --
    async fn get_active_suspension(
        &mut self,
        user_id: i64,
    ) -> Result<Option<UserSuspension>, DbError>;
    async fn insert_suspension(
        &mut self,
        suspension: UserSuspension,
    ) -> Result<UserSuspension, DbError>;
    async fn save_suspension(&mut self, suspension: &UserSuspension) -> Result<(), DbError>;
    /// Active, time-bound suspensions whose `suspended_until` has passed.
    /// Indefinite suspensions
    /// (`suspended_until = None`) never show up here — those lift only
    /// through [`crate::penalties::review_appeal`].
    async fn list_expired_suspensions(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserSuspension>, DbError>;

    // -- appeals --
    async fn insert_appeal(&mut self, appeal: Appeal) -> Result<Appeal, DbError>;
    async fn get_appeal(&mut self, id: i64) -> Result<Option<Appeal>, DbError>;
    async fn save_appeal(&mut self, appeal: &Appeal) -> Result<(), DbError>;
    async fn has_pending_appeal(
        &mut self,
        user_id: i64,
        appeal_type: AppealType,
        related_id: i64,
    ) -> Result<bool, DbError>;

    // -- emergency waivers --
    async fn get_emergency_waiver(
        &mut self,
        user_id: i64,
        year: i32,
    ) -> Result<Option<EmergencyWaiver>, DbError>;
    async fn insert_emergency_waiver(
        &mut self,
        waiver: EmergencyWaiver,
    ) -> Result<EmergencyWaiver, DbError>;

    // -- webhook idempotency --
    async fn get_processed_webhook(
        &mut self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookEvent>, DbError>;
    async fn insert_processed_webhook(
        &mut self,
        event: ProcessedWebhookEvent,
    ) -> Result<ProcessedWebhookEvent, DbError>;
}

/// Lock two wallets in a fixed global order (lowest wallet id first) so
/// cross-wallet operations can't deadlock against each other.
///
/// Returns `(first, second)` in lock-acquisition order; callers must match
/// wallet identity back up themselves (the order is about *locking*, not
/// about which wallet plays which economic role).
pub async fn lock_wallets_in_order(
    tx: &mut dyn StoreTx,
    a: i64,
    b: i64,
) -> Result<(Wallet, Wallet), DbError> {
    let (first_id, second_id) = if a <= b { (a, b) } else { (b, a) };
    let first = tx
        .lock_wallet(first_id)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("wallet {first_id}")))?;
    let second = tx
        .lock_wallet(second_id)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("wallet {second_id}")))?;
    Ok((first, second))
}
