//! In-process store used by engine tests.
//!
//! One struct owns every entity in a `BTreeMap`, mutated through `&mut
//! self`. A transaction here is a full-state clone for pause/resume: clone
//! the whole state into a scratch copy, mutate the scratch copy, and on
//! `commit` swap it back under the lock; on `rollback` (or a dropped
//! transaction) the scratch copy is simply discarded and the original is
//! untouched.
//!
//! The whole-store mutex is coarser than `PgStore`'s per-row locking —
//! acceptable for a test double, where what matters is that concurrent
//! transactions observe atomic, serializable effects, not that unrelated
//! wallets can be mutated concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::*;
use crate::money::Money;

use super::{DbError, Store, StoreTx};

#[derive(Default, Clone)]
struct Inner {
    users: BTreeMap<i64, User>,

    wallets: BTreeMap<i64, Wallet>,
    next_wallet_id: i64,

    shifts: BTreeMap<i64, Shift>,
    applications: BTreeMap<i64, Application>,

    transactions: BTreeMap<i64, Transaction>,
    next_transaction_id: i64,

    funds_holds: BTreeMap<i64, FundsHold>,
    next_hold_id: i64,

    scheduled_reserves: BTreeMap<i64, ScheduledReserve>,
    next_reserve_id: i64,

    payouts: BTreeMap<i64, Payout>,
    next_payout_id: i64,

    disputes: BTreeMap<i64, Dispute>,
    next_dispute_id: i64,

    strikes: BTreeMap<i64, Strike>,
    next_strike_id: i64,

    penalties: BTreeMap<i64, Penalty>,
    next_penalty_id: i64,

    negative_balances: BTreeMap<i64, NegativeBalance>,
    next_negative_balance_id: i64,

    suspensions: BTreeMap<i64, UserSuspension>,
    next_suspension_id: i64,

    appeals: BTreeMap<i64, Appeal>,
    next_appeal_id: i64,

    emergency_waivers: BTreeMap<(i64, i32), EmergencyWaiver>,
    next_waiver_id: i64,

    webhooks: BTreeMap<String, ProcessedWebhookEvent>,
    next_webhook_id: i64,
}

/// In-memory [`Store`] implementation. Seed it with users/wallets/shifts
/// via [`MemoryStore::seed_*`] helpers and pass it to engine operations in
/// tests exactly as a `PgStore` would be passed in production.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub async fn seed_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    pub async fn seed_wallet(&self, wallet: Wallet) {
        let mut inner = self.inner.lock().await;
        inner.next_wallet_id = inner.next_wallet_id.max(wallet.id + 1);
        inner.wallets.insert(wallet.id, wallet);
    }

    pub async fn seed_shift(&self, shift: Shift) {
        self.inner.lock().await.shifts.insert(shift.id, shift);
    }

    pub async fn seed_application(&self, application: Application) {
        self.inner
            .lock()
            .await
            .applications
            .insert(application.id, application);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, DbError> {
        let guard = self.inner.clone().lock_owned().await;
        let scratch = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, scratch }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Inner>,
    scratch: Inner,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(mut self: Box<Self>) -> Result<(), DbError> {
        *self.guard = self.scratch;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }

    async fn get_user(&mut self, id: i64) -> Result<Option<User>, DbError> {
        Ok(self.scratch.users.get(&id).cloned())
    }

    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), DbError> {
        let user = self
            .scratch
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("user {id}")))?;
        user.active = active;
        Ok(())
    }

    async fn set_user_probation(
        &mut self,
        id: i64,
        probation_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let user = self
            .scratch
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("user {id}")))?;
        user.probation_until = probation_until;
        Ok(())
    }

    async fn get_wallet_by_user(&mut self, user_id: i64) -> Result<Option<Wallet>, DbError> {
        Ok(self
            .scratch
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn lock_wallet(&mut self, id: i64) -> Result<Option<Wallet>, DbError> {
        Ok(self.scratch.wallets.get(&id).cloned())
    }

    async fn insert_wallet(&mut self, mut wallet: Wallet) -> Result<Wallet, DbError> {
        if wallet.id == 0 {
            self.scratch.next_wallet_id += 1;
            wallet.id = self.scratch.next_wallet_id;
        }
        self.scratch.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), DbError> {
        if !self.scratch.wallets.contains_key(&wallet.id) {
            return Err(DbError::NotFound(format!("wallet {}", wallet.id)));
        }
        self.scratch.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn get_shift(&mut self, id: i64) -> Result<Option<Shift>, DbError> {
        Ok(self.scratch.shifts.get(&id).cloned())
    }

    async fn save_shift(&mut self, shift: &Shift) -> Result<(), DbError> {
        self.scratch.shifts.insert(shift.id, shift.clone());
        Ok(())
    }

    async fn get_sole_accepted_application(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<Application>, DbError> {
        Ok(self
            .scratch
            .applications
            .values()
            .find(|a| a.shift_id == shift_id && a.status == ApplicationStatus::Accepted)
            .cloned())
    }

    async fn list_noshow_candidates(&mut self, now: DateTime<Utc>) -> Result<Vec<Shift>, DbError> {
        let penalized_shifts: std::collections::HashSet<i64> = self
            .scratch
            .penalties
            .values()
            .map(|p| p.shift_id)
            .collect();
        Ok(self
            .scratch
            .shifts
            .values()
            .filter(|s| {
                s.status == ShiftStatus::Filled
                    && now >= s.start_at() + chrono::Duration::minutes(30)
                    && s.clock_in_at.is_none()
                    && !penalized_shifts.contains(&s.id)
            })
            .cloned()
            .collect())
    }

    async fn list_completed_awaiting_auto_approve(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Shift>, DbError> {
        let open_dispute_shifts: std::collections::HashSet<i64> = self
            .scratch
            .disputes
            .values()
            .filter(|d| d.is_unresolved())
            .map(|d| d.shift_id)
            .collect();
        Ok(self
            .scratch
            .shifts
            .values()
            .filter(|s| {
                s.status == ShiftStatus::Completed
                    && s.clock_out_at
                        .map(|t| t <= now - chrono::Duration::hours(24))
                        .unwrap_or(false)
                    && !open_dispute_shifts.contains(&s.id)
            })
            .cloned()
            .collect())
    }

    async fn find_transaction_by_idem_key(
        &mut self,
        key: &str,
    ) -> Result<Option<Transaction>, DbError> {
        Ok(self
            .scratch
            .transactions
            .values()
            .find(|t| t.idempotency_key == key)
            .cloned())
    }

    async fn insert_transaction(&mut self, mut tx: Transaction) -> Result<Transaction, DbError> {
        if self
            .scratch
            .transactions
            .values()
            .any(|t| t.idempotency_key == tx.idempotency_key)
        {
            return Err(DbError::UniqueViolation(format!(
                "idempotency_key {}",
                tx.idempotency_key
            )));
        }
        self.scratch.next_transaction_id += 1;
        tx.id = self.scratch.next_transaction_id;
        self.scratch.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn list_transactions_for_wallet(
        &mut self,
        wallet_id: i64,
    ) -> Result<Vec<Transaction>, DbError> {
        Ok(self
            .scratch
            .transactions
            .values()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn get_active_hold(
        &mut self,
        wallet_id: i64,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError> {
        Ok(self
            .scratch
            .funds_holds
            .values()
            .find(|h| h.wallet_id == wallet_id && h.shift_id == shift_id && h.is_active())
            .cloned())
    }

    async fn get_active_hold_for_shift(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<FundsHold>, DbError> {
        Ok(self
            .scratch
            .funds_holds
            .values()
            .find(|h| h.shift_id == shift_id && h.is_active())
            .cloned())
    }

    async fn insert_funds_hold(&mut self, mut hold: FundsHold) -> Result<FundsHold, DbError> {
        self.scratch.next_hold_id += 1;
        hold.id = self.scratch.next_hold_id;
        self.scratch.funds_holds.insert(hold.id, hold.clone());
        Ok(hold)
    }

    async fn save_funds_hold(&mut self, hold: &FundsHold) -> Result<(), DbError> {
        self.scratch.funds_holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn list_expirable_holds(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<FundsHold>, DbError> {
        Ok(self
            .scratch
            .funds_holds
            .values()
            .filter(|h| h.is_active() && h.expires_at.map(|e| e < now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn insert_scheduled_reserve(
        &mut self,
        mut reserve: ScheduledReserve,
    ) -> Result<ScheduledReserve, DbError> {
        self.scratch.next_reserve_id += 1;
        reserve.id = self.scratch.next_reserve_id;
        self.scratch
            .scheduled_reserves
            .insert(reserve.id, reserve.clone());
        Ok(reserve)
    }

    async fn get_scheduled_reserve(&mut self, id: i64) -> Result<Option<ScheduledReserve>, DbError> {
        Ok(self.scratch.scheduled_reserves.get(&id).cloned())
    }

    async fn list_due_scheduled_reserves(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReserve>, DbError> {
        Ok(self
            .scratch
            .scheduled_reserves
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect())
    }

    async fn save_scheduled_reserve(&mut self, reserve: &ScheduledReserve) -> Result<(), DbError> {
        self.scratch
            .scheduled_reserves
            .insert(reserve.id, reserve.clone());
        Ok(())
    }

    async fn insert_payout(&mut self, mut payout: Payout) -> Result<Payout, DbError> {
        self.scratch.next_payout_id += 1;
        payout.id = self.scratch.next_payout_id;
        self.scratch.payouts.insert(payout.id, payout.clone());
        Ok(payout)
    }

    async fn list_payouts_for_wallet(&mut self, wallet_id: i64) -> Result<Vec<Payout>, DbError> {
        Ok(self
            .scratch
            .payouts
            .values()
            .filter(|p| p.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn list_payable_wallets(&mut self, min_available: Money) -> Result<Vec<Wallet>, DbError> {
        Ok(self
            .scratch
            .wallets
            .values()
            .filter(|w| w.available() >= min_available)
            .cloned()
            .collect())
    }

    async fn list_wallets_needing_auto_topup(&mut self) -> Result<Vec<Wallet>, DbError> {
        Ok(self
            .scratch
            .wallets
            .values()
            .filter(|w| {
                w.auto_topup.enabled
                    && w.auto_topup
                        .threshold
                        .map(|threshold| w.available() < threshold)
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn get_dispute(&mut self, id: i64) -> Result<Option<Dispute>, DbError> {
        Ok(self.scratch.disputes.get(&id).cloned())
    }

    async fn get_open_dispute_for_shift(
        &mut self,
        shift_id: i64,
    ) -> Result<Option<Dispute>, DbError> {
        Ok(self
            .scratch
            .disputes
            .values()
            .find(|d| d.shift_id == shift_id && d.is_unresolved())
            .cloned())
    }

    async fn insert_dispute(&mut self, mut dispute: Dispute) -> Result<Dispute, DbError> {
        self.scratch.next_dispute_id += 1;
        dispute.id = self.scratch.next_dispute_id;
        self.scratch.disputes.insert(dispute.id, dispute.clone());
        Ok(dispute)
    }

    async fn save_dispute(&mut self, dispute: &Dispute) -> Result<(), DbError> {
        self.scratch.disputes.insert(dispute.id, dispute.clone());
        Ok(())
    }

    async fn list_overdue_disputes(&mut self, now: DateTime<Utc>) -> Result<Vec<Dispute>, DbError> {
        Ok(self
            .scratch
            .disputes
            .values()
            .filter(|d| d.is_overdue(now))
            .cloned()
            .collect())
    }

    async fn insert_strike(&mut self, mut strike: Strike) -> Result<Strike, DbError> {
        self.scratch.next_strike_id += 1;
        strike.id = self.scratch.next_strike_id;
        self.scratch.strikes.insert(strike.id, strike.clone());
        Ok(strike)
    }

    async fn list_strikes_for_user(&mut self, user_id: i64) -> Result<Vec<Strike>, DbError> {
        Ok(self
            .scratch
            .strikes
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn save_strike(&mut self, strike: &Strike) -> Result<(), DbError> {
        self.scratch.strikes.insert(strike.id, strike.clone());
        Ok(())
    }

    async fn has_any_prior_strike(&mut self, user_id: i64) -> Result<bool, DbError> {
        Ok(self.scratch.strikes.values().any(|s| s.user_id == user_id))
    }

    async fn insert_penalty(&mut self, mut penalty: Penalty) -> Result<Penalty, DbError> {
        self.scratch.next_penalty_id += 1;
        penalty.id = self.scratch.next_penalty_id;
        self.scratch.penalties.insert(penalty.id, penalty.clone());
        Ok(penalty)
    }

    async fn save_penalty(&mut self, penalty: &Penalty) -> Result<(), DbError> {
        self.scratch.penalties.insert(penalty.id, penalty.clone());
        Ok(())
    }

    async fn get_penalty(&mut self, id: i64) -> Result<Option<Penalty>, DbError> {
        Ok(self.scratch.penalties.get(&id).cloned())
    }

    async fn list_pending_penalties_for_user(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Penalty>, DbError> {
        Ok(self
            .scratch
            .penalties
            .values()
            .filter(|p| p.user_id == user_id && p.status == PenaltyStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_negative_balance(
        &mut self,
        user_id: i64,
    ) -> Result<Option<NegativeBalance>, DbError> {
        Ok(self
            .scratch
            .negative_balances
            .values()
            .find(|nb| nb.user_id == user_id)
            .cloned())
    }

    async fn save_negative_balance(&mut self, nb: &NegativeBalance) -> Result<(), DbError> {
        let mut nb = nb.clone();
        if nb.id == 0 {
            self.scratch.next_negative_balance_id += 1;
            nb.id = self.scratch.next_negative_balance_id;
        }
        self.scratch.negative_balances.insert(nb.user_id, nb);
        Ok(())
    }

    async fn list_stale_negative_balances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NegativeBalance>, DbError> {
        Ok(self
            .scratch
            .negative_balances
            .values()
            .filter(|nb| nb.amount.is_positive() && nb.last_activity_at < cutoff)
            .cloned()
            .collect())
    }

    async fn get_active_suspension(
        &mut self,
        user_id: i64,
    ) -> Result<Option<UserSuspension>, DbError> {
        Ok(self
            .scratch
            .suspensions
            .values()
            .find(|s| s.user_id == user_id && s.is_active)
            .cloned())
    }

    async fn insert_suspension(
        &mut self,
        mut suspension: UserSuspension,
    ) -> Result<UserSuspension, DbError> {
        self.scratch.next_suspension_id += 1;
        suspension.id = self.scratch.next_suspension_id;
        self.scratch
            .suspensions
            .insert(suspension.id, suspension.clone());
        Ok(suspension)
    }

    async fn save_suspension(&mut self, suspension: &UserSuspension) -> Result<(), DbError> {
        self.scratch
            .suspensions
            .insert(suspension.id, suspension.clone());
        Ok(())
    }

    async fn list_expired_suspensions(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserSuspension>, DbError> {
        Ok(self
            .scratch
            .suspensions
            .values()
            .filter(|s| s.is_active && s.suspended_until.map(|until| until <= now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn insert_appeal(&mut self, mut appeal: Appeal) -> Result<Appeal, DbError> {
        self.scratch.next_appeal_id += 1;
        appeal.id = self.scratch.next_appeal_id;
        self.scratch.appeals.insert(appeal.id, appeal.clone());
        Ok(appeal)
    }

    async fn get_appeal(&mut self, id: i64) -> Result<Option<Appeal>, DbError> {
        Ok(self.scratch.appeals.get(&id).cloned())
    }

    async fn save_appeal(&mut self, appeal: &Appeal) -> Result<(), DbError> {
        self.scratch.appeals.insert(appeal.id, appeal.clone());
        Ok(())
    }

    async fn has_pending_appeal(
        &mut self,
        user_id: i64,
        appeal_type: AppealType,
        related_id: i64,
    ) -> Result<bool, DbError> {
        Ok(self.scratch.appeals.values().any(|a| {
            a.user_id == user_id
                && a.appeal_type == appeal_type
                && a.related_id == related_id
                && a.status == AppealStatus::Pending
        }))
    }

    async fn get_emergency_waiver(
        &mut self,
        user_id: i64,
        year: i32,
    ) -> Result<Option<EmergencyWaiver>, DbError> {
        Ok(self
            .scratch
            .emergency_waivers
            .get(&(user_id, year))
            .cloned())
    }

    async fn insert_emergency_waiver(
        &mut self,
        mut waiver: EmergencyWaiver,
    ) -> Result<EmergencyWaiver, DbError> {
        if self
            .scratch
            .emergency_waivers
            .contains_key(&(waiver.user_id, waiver.year))
        {
            return Err(DbError::UniqueViolation(format!(
                "emergency waiver for user {} year {}",
                waiver.user_id, waiver.year
            )));
        }
        self.scratch.next_waiver_id += 1;
        waiver.id = self.scratch.next_waiver_id;
        self.scratch
            .emergency_waivers
            .insert((waiver.user_id, waiver.year), waiver.clone());
        Ok(waiver)
    }

    async fn get_processed_webhook(
        &mut self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookEvent>, DbError> {
        Ok(self.scratch.webhooks.get(event_id).cloned())
    }

    async fn insert_processed_webhook(
        &mut self,
        mut event: ProcessedWebhookEvent,
    ) -> Result<ProcessedWebhookEvent, DbError> {
        if self.scratch.webhooks.contains_key(&event.event_id) {
            return Err(DbError::UniqueViolation(format!(
                "event_id {}",
                event.event_id
            )));
        }
        self.scratch.next_webhook_id += 1;
        event.id = self.scratch.next_webhook_id;
        self.scratch
            .webhooks
            .insert(event.event_id.clone(), event.clone());
        Ok(event)
    }
}
