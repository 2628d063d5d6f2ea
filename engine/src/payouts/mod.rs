//! Payout engine: weekly batch and instant cash-out.
//!
//! Every payout here is written `pending`; a separate, out-of-scope
//! processor worker drives `pending -> in_transit -> paid` via provider
//! webhooks and stamps `Payout.paid_at` — this module never calls
//! [`crate::processor::PaymentProcessor`] itself.

use chrono::Datelike;

use crate::clock::Clock;
use crate::db::Store;
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::models::{Payout, PayoutStatus, PayoutType, Role, Transaction, TransactionType};
use crate::money::Money;
use crate::penalties::offset_negative_balance;

const INSTANT_PAYOUT_MINIMUM_CENTS: i64 = 1_000;
const WEEKLY_PAYOUT_MINIMUM_CENTS: i64 = 5_000;
const INSTANT_PAYOUT_FEE_PCT: f64 = 1.5;

fn instant_minimum() -> Money {
    Money::from_cents(INSTANT_PAYOUT_MINIMUM_CENTS)
}

fn weekly_minimum() -> Money {
    Money::from_cents(WEEKLY_PAYOUT_MINIMUM_CENTS)
}

/// Cash out on demand. `amount` defaults to the wallet's full available
/// balance. The negative-balance offset is applied first; only the
/// remainder needs to clear the $10 minimum, but the *entire* requested
/// amount leaves the wallet (the offset portion pays down debt rather than
/// being transferred).
pub async fn request_instant_payout(
    store: &dyn Store,
    clock: &dyn Clock,
    wallet_id: i64,
    amount: Option<Money>,
    idem_key: String,
) -> EngineResult<Payout> {
    let now = clock.now();

    let (user_id, requested) = {
        let mut tx = store.begin().await?;
        if let Some(_prior) = tx.find_transaction_by_idem_key(&idem_key).await? {
            let existing = tx
                .list_payouts_for_wallet(wallet_id)
                .await?
                .into_iter()
                .rev()
                .find(|p| p.r#type == PayoutType::Instant)
                .ok_or_else(|| EngineError::Conflict(format!(
                    "idempotency key {idem_key} already used but no matching instant payout found"
                )))?;
            tx.commit().await?;
            return Ok(existing);
        }
        let wallet = tx
            .lock_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {wallet_id}")))?;
        let requested = amount.unwrap_or(wallet.available());
        if !requested.is_positive() {
            return Err(EngineError::Validation("payout amount must be positive".into()));
        }
        if requested > wallet.available() {
            return Err(EngineError::Validation(format!(
                "requested payout {requested} exceeds available balance {}",
                wallet.available()
            )));
        }
        tx.commit().await?;
        (wallet.user_id, requested)
    };

    let (_offset, eff) = offset_negative_balance(store, clock, user_id, requested).await?;
    if eff < instant_minimum() {
        return Err(EngineError::Validation(format!(
            "instant payout remainder {eff} below the {} minimum after negative-balance offset",
            instant_minimum()
        )));
    }

    let fee = eff.percent_round(INSTANT_PAYOUT_FEE_PCT);
    let net = eff - fee;

    let mut tx = store.begin().await?;
    let mut wallet = tx
        .lock_wallet(wallet_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {wallet_id}")))?;
    wallet.balance -= requested;
    tx.save_wallet(&wallet).await?;
    tx.insert_transaction(
        Transaction::new(wallet_id, TransactionType::Payout, requested, fee, idem_key, None, now)
            .complete(now),
    )
    .await?;
    let payout = tx
        .insert_payout(Payout {
            id: 0,
            wallet_id,
            amount: eff,
            fee,
            net_amount: net,
            r#type: PayoutType::Instant,
            status: PayoutStatus::Pending,
            scheduled_date: now.date_naive(),
            external_id: None,
            paid_at: None,
        })
        .await?;
    tx.commit().await?;
    Ok(payout)
}

/// Weekly batch across every eligible wallet.
pub async fn process_weekly_payouts(store: &dyn Store, clock: &dyn Clock) -> EngineResult<Vec<Payout>> {
    let now = clock.now();
    let wallets = {
        let mut tx = store.begin().await?;
        let wallets = tx.list_payable_wallets(weekly_minimum()).await?;
        tx.commit().await?;
        wallets
    };

    let mut created = Vec::new();
    for wallet in wallets {
        let (wallet_id, user_id, requested) = {
            let mut tx = store.begin().await?;
            let Some(user) = tx.get_user(wallet.user_id).await? else {
                tx.commit().await?;
                continue;
            };
            if !matches!(user.role, Role::Staff | Role::Agency) {
                tx.commit().await?;
                continue;
            }
            let Some(wallet) = tx.lock_wallet(wallet.id).await? else {
                tx.commit().await?;
                continue;
            };
            let requested = wallet.available();
            tx.commit().await?;
            (wallet.id, wallet.user_id, requested)
        };

        if requested < weekly_minimum() {
            continue;
        }

        let (offset, eff) = offset_negative_balance(store, clock, user_id, requested).await?;

        let mut tx = store.begin().await?;
        let mut wallet = tx
            .lock_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {wallet_id}")))?;

        if eff < weekly_minimum() {
            wallet.balance -= offset;
            tx.save_wallet(&wallet).await?;
            tx.commit().await?;
            continue;
        }

        wallet.balance -= requested;
        tx.save_wallet(&wallet).await?;
        tx.insert_transaction(
            Transaction::new(
                wallet_id,
                TransactionType::Payout,
                requested,
                Money::ZERO,
                ids::generate("weekly_payout"),
                None,
                now,
            )
            .complete(now),
        )
        .await?;
        let payout = tx
            .insert_payout(Payout {
                id: 0,
                wallet_id,
                amount: eff,
                fee: Money::ZERO,
                net_amount: eff,
                r#type: PayoutType::Weekly,
                status: PayoutStatus::Pending,
                scheduled_date: now.date_naive(),
                external_id: None,
                paid_at: None,
            })
            .await?;
        tx.commit().await?;
        created.push(payout);
    }
    Ok(created)
}

/// Payouts not yet settled at the rail.
pub async fn get_payout_schedule(store: &dyn Store, wallet_id: i64) -> EngineResult<Vec<Payout>> {
    let mut tx = store.begin().await?;
    let payouts = tx
        .list_payouts_for_wallet(wallet_id)
        .await?
        .into_iter()
        .filter(|p| matches!(p.status, PayoutStatus::Pending | PayoutStatus::InTransit))
        .collect();
    tx.commit().await?;
    Ok(payouts)
}

/// Payouts that have reached a terminal state.
pub async fn get_payout_history(store: &dyn Store, wallet_id: i64) -> EngineResult<Vec<Payout>> {
    let mut tx = store.begin().await?;
    let payouts = tx
        .list_payouts_for_wallet(wallet_id)
        .await?
        .into_iter()
        .filter(|p| matches!(p.status, PayoutStatus::Paid | PayoutStatus::Failed | PayoutStatus::Cancelled))
        .collect();
    tx.commit().await?;
    Ok(payouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::memory::MemoryStore;
    use crate::models::{NegativeBalance, User, Wallet};
    use chrono::{TimeZone, Utc};

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_user(User { id: 1, role: Role::Staff, active: true, deleted: false, probation_until: None }).await;
        let mut wallet = Wallet::new(0, 1);
        wallet.balance = Money::from_cents(10_000);
        store.seed_wallet(wallet).await;
        store
    }

    #[tokio::test]
    async fn instant_payout_charges_fee_and_debits_full_request() {
        let store = seeded_store().await;
        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let payout = request_instant_payout(&store, &clock, 1, Some(Money::from_cents(2_000)), "ip1".into())
            .await
            .unwrap();
        assert_eq!(payout.fee, Money::from_cents(30));
        assert_eq!(payout.net_amount, Money::from_cents(1_970));

        let mut tx = store.begin().await.unwrap();
        let wallet = tx.lock_wallet(1).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(wallet.balance, Money::from_cents(8_000));
    }

    #[tokio::test]
    async fn instant_payout_below_minimum_after_offset_is_rejected() {
        let store = seeded_store().await;
        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_negative_balance(&NegativeBalance {
                id: 0,
                user_id: 1,
                amount: Money::from_cents(1_500),
                last_activity_at: clock.now(),
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let err = request_instant_payout(&store, &clock, 1, Some(Money::from_cents(2_000)), "ip2".into())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn weekly_payout_skips_wallets_under_minimum_after_offset() {
        let store = seeded_store().await;
        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_negative_balance(&NegativeBalance {
                id: 0,
                user_id: 1,
                amount: Money::from_cents(9_000),
                last_activity_at: clock.now(),
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let payouts = process_weekly_payouts(&store, &clock).await.unwrap();
        assert!(payouts.is_empty());

        let mut tx = store.begin().await.unwrap();
        let wallet = tx.lock_wallet(1).await.unwrap().unwrap();
        let nb = tx.get_negative_balance(1).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        assert_eq!(wallet.balance, Money::from_cents(0));
        assert_eq!(nb.amount, Money::from_cents(0));
    }

    #[tokio::test]
    async fn weekly_payout_pays_eligible_wallet() {
        let store = seeded_store().await;
        let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
        let payouts = process_weekly_payouts(&store, &clock).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].fee, Money::ZERO);
        assert_eq!(payouts[0].net_amount, Money::from_cents(10_000));
    }
}
