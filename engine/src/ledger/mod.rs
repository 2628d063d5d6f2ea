//! Wallet ledger: balance, reserved, status machine, auto-topup.
//!
//! Transactions are the sole write path for balance — nothing here mutates
//! a `Wallet` row without appending a matching `Transaction` in the same
//! atomic unit.

use chrono::Duration;

use crate::clock::Clock;
use crate::db::Store;
use crate::error::{EngineError, EngineResult};
use crate::models::{AutoTopup, Transaction, TransactionType, Wallet, WalletStatus};
use crate::money::Money;
use crate::notify::{NotificationSink, Notice};
use crate::processor::{ChargeOutcome, PaymentProcessor};

/// Fetch a user's wallet, creating it with zero balance if it doesn't
/// exist yet.
pub async fn get_or_create(store: &dyn Store, user_id: i64) -> EngineResult<Wallet> {
    let mut tx = store.begin().await?;
    if let Some(wallet) = tx.get_wallet_by_user(user_id).await? {
        tx.commit().await?;
        return Ok(wallet);
    }
    let wallet = tx.insert_wallet(Wallet::new(0, user_id)).await?;
    tx.commit().await?;
    Ok(wallet)
}

/// Charge the processor and credit the wallet. On processor failure,
/// writes a `failed` Transaction and moves the wallet into `grace_period`
/// instead of rolling back — the user must be told, not silently retried.
pub async fn topup(
    store: &dyn Store,
    processor: &dyn PaymentProcessor,
    notify: &dyn NotificationSink,
    clock: &dyn Clock,
    user_id: i64,
    amount: Money,
    payment_method: &str,
    idem_key: &str,
) -> EngineResult<Transaction> {
    if !amount.is_positive() {
        return Err(EngineError::Validation("topup amount must be positive".into()));
    }

    let mut tx = store.begin().await?;

    if let Some(existing) = tx.find_transaction_by_idem_key(idem_key).await? {
        tx.commit().await?;
        return Ok(existing);
    }

    let wallet = tx
        .get_wallet_by_user(user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet for user {user_id}")))?;
    let mut wallet = tx
        .lock_wallet(wallet.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))?;

    let now = clock.now();
    let outcome = processor.charge(payment_method, amount, idem_key).await;

    match outcome {
        ChargeOutcome::Succeeded { .. } => {
            wallet.balance += amount;
            tx.save_wallet(&wallet).await?;
            let record = tx
                .insert_transaction(
                    Transaction::new(
                        wallet.id,
                        TransactionType::Topup,
                        amount,
                        Money::ZERO,
                        idem_key.to_string(),
                        None,
                        now,
                    )
                    .complete(now),
                )
                .await?;
            tx.commit().await?;
            Ok(record)
        }
        ChargeOutcome::Declined { reason } => {
            tx.insert_transaction(
                Transaction::new(
                    wallet.id,
                    TransactionType::Topup,
                    amount,
                    Money::ZERO,
                    idem_key.to_string(),
                    None,
                    now,
                )
                .with_description(reason.clone())
                .fail(now),
            )
            .await?;
            wallet.status = WalletStatus::GracePeriod;
            wallet.grace_period_ends_at = Some(now + Duration::hours(48));
            wallet.last_failed_topup_at = Some(now);
            tx.save_wallet(&wallet).await?;
            tx.commit().await?;
            notify.notify(Notice::AutoTopupFailed { user_id }).await;
            Err(EngineError::PaymentProcessorFailed(reason))
        }
    }
}

/// Update auto-topup configuration. Valid only if every field is present
/// when `enabled`.
pub async fn configure_auto_topup(
    store: &dyn Store,
    user_id: i64,
    enabled: bool,
    threshold: Option<Money>,
    amount: Option<Money>,
    payment_method: Option<String>,
) -> EngineResult<Wallet> {
    let config = AutoTopup {
        enabled,
        threshold,
        amount,
        payment_method,
    };
    if !config.is_valid() {
        return Err(EngineError::Validation(
            "auto_topup requires threshold, amount, and payment_method when enabled".into(),
        ));
    }

    let mut tx = store.begin().await?;
    let wallet = tx
        .get_wallet_by_user(user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet for user {user_id}")))?;
    let mut wallet = tx
        .lock_wallet(wallet.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))?;
    wallet.auto_topup = config;
    tx.save_wallet(&wallet).await?;
    tx.commit().await?;
    Ok(wallet)
}

/// Move a wallet out of `grace_period`/`suspended` back to `active`, but
/// only when `available >= required_min` (defaulting to the wallet's own
/// `minimum_balance`).
pub async fn reactivate(
    store: &dyn Store,
    wallet_id: i64,
    required_min: Option<Money>,
) -> EngineResult<Wallet> {
    let mut tx = store.begin().await?;
    let mut wallet = tx
        .lock_wallet(wallet_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("wallet {wallet_id}")))?;

    if matches!(wallet.status, WalletStatus::Active) {
        tx.commit().await?;
        return Ok(wallet);
    }

    let floor = required_min.unwrap_or(wallet.minimum_balance);
    if wallet.available() < floor {
        return Err(EngineError::Validation(format!(
            "wallet {wallet_id} available {} below required minimum {floor}",
            wallet.available()
        )));
    }

    wallet.status = WalletStatus::Active;
    wallet.grace_period_ends_at = None;
    tx.save_wallet(&wallet).await?;
    tx.commit().await?;
    Ok(wallet)
}
