//! Payment processor port.
//!
//! The engine never talks to a card network or bank rail directly. Every
//! money movement that crosses the platform boundary — a topup charge, a
//! payout transfer, a payout cancellation — goes through this trait, and
//! every call carries an idempotency key so a retried call after a timeout
//! is provably safe to resend.
//!
//! A narrow trait the core depends on, with a deterministic fake standing
//! in for the real integration in tests. Success/failure is modelled as
//! data rather than as a thrown error — a declined card is an expected
//! outcome, not a fault.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{Store, StoreTx};
use crate::error::EngineResult;
use crate::models::ProcessedWebhookEvent;
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { external_id: String },
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Accepted { external_id: String },
    Rejected { reason: String },
}

/// Port to the external payment rail. All methods are idempotent: calling
/// the same `idempotency_key` twice returns the first call's outcome
/// without double-charging or double-paying.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge a payment method for a wallet topup.
    async fn charge(
        &self,
        payment_method: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> ChargeOutcome;

    /// Move funds from the platform's settlement account to a user's payout
    /// destination.
    async fn transfer_payout(
        &self,
        external_account_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> PayoutOutcome;

    /// Best-effort cancellation of an in-transit payout. Returns `true` if
    /// the transfer was stopped before settling at the rail.
    async fn cancel_payout(&self, external_id: &str) -> bool;
}

/// Deterministic in-memory fake for tests: every `payment_method` or
/// `external_account_id` starting with `fail_` is declined/rejected,
/// everything else succeeds. Idempotency keys are remembered so repeat
/// calls replay the first outcome.
#[derive(Default)]
pub struct SandboxProcessor {
    charges: Mutex<HashMap<String, ChargeOutcome>>,
    payouts: Mutex<HashMap<String, PayoutOutcome>>,
}

impl SandboxProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentProcessor for SandboxProcessor {
    async fn charge(
        &self,
        payment_method: &str,
        _amount: Money,
        idempotency_key: &str,
    ) -> ChargeOutcome {
        let mut charges = self.charges.lock().expect("sandbox mutex poisoned");
        if let Some(existing) = charges.get(idempotency_key) {
            return existing.clone();
        }
        let outcome = if payment_method.starts_with("fail_") {
            ChargeOutcome::Declined {
                reason: "card_declined".to_string(),
            }
        } else {
            ChargeOutcome::Succeeded {
                external_id: format!("ch_{idempotency_key}"),
            }
        };
        charges.insert(idempotency_key.to_string(), outcome.clone());
        outcome
    }

    async fn transfer_payout(
        &self,
        external_account_id: &str,
        _amount: Money,
        idempotency_key: &str,
    ) -> PayoutOutcome {
        let mut payouts = self.payouts.lock().expect("sandbox mutex poisoned");
        if let Some(existing) = payouts.get(idempotency_key) {
            return existing.clone();
        }
        let outcome = if external_account_id.starts_with("fail_") {
            PayoutOutcome::Rejected {
                reason: "account_closed".to_string(),
            }
        } else {
            PayoutOutcome::Accepted {
                external_id: format!("po_{idempotency_key}"),
            }
        };
        payouts.insert(idempotency_key.to_string(), outcome.clone());
        outcome
    }

    async fn cancel_payout(&self, _external_id: &str) -> bool {
        true
    }
}

/// One webhook delivery's side effect, applied inside the same transaction
/// that records its `event_id` — so a replay can never apply the effect
/// twice even if it crashes between the two.
#[async_trait]
pub trait WebhookEffect: Send {
    async fn apply(self: Box<Self>, tx: &mut dyn StoreTx) -> EngineResult<serde_json::Value>;
}

/// Dispatch a payment-processor webhook. Looks up `event_id` in
/// `ProcessedWebhookEvent` first; a second delivery of an already-processed
/// event is a no-op that returns the stored result without invoking
/// `effect` again.
pub async fn dispatch_webhook(
    store: &dyn Store,
    event_id: &str,
    event_type: &str,
    effect: Box<dyn WebhookEffect>,
) -> EngineResult<serde_json::Value> {
    let mut tx = store.begin().await?;
    if let Some(existing) = tx.get_processed_webhook(event_id).await? {
        tx.commit().await?;
        return Ok(existing.result);
    }
    let result = effect.apply(&mut *tx).await?;
    tx.insert_processed_webhook(ProcessedWebhookEvent {
        id: 0,
        event_id: event_id.to_string(),
        event_type: event_type.to_string(),
        result: result.clone(),
    })
    .await?;
    tx.commit().await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::db::memory::MemoryStore;

    #[tokio::test]
    async fn repeat_idempotency_key_replays_outcome() {
        let processor = SandboxProcessor::new();
        let first = processor.charge("pm_1", Money::from_cents(1_000), "k1").await;
        let second = processor.charge("pm_1", Money::from_cents(1_000), "k1").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn fail_prefixed_payment_method_declines() {
        let processor = SandboxProcessor::new();
        let outcome = processor.charge("fail_card", Money::from_cents(1_000), "k2").await;
        assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
    }

    struct CountingEffect {
        counter: Arc<AtomicUsize>,
        value: serde_json::Value,
    }

    #[async_trait]
    impl WebhookEffect for CountingEffect {
        async fn apply(self: Box<Self>, _tx: &mut dyn StoreTx) -> EngineResult<serde_json::Value> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    #[tokio::test]
    async fn dispatch_webhook_applies_effect_once_then_replays_stored_result() {
        let store = MemoryStore::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let effect = Box::new(CountingEffect {
            counter: counter.clone(),
            value: serde_json::json!({"charged": true}),
        });
        let first = dispatch_webhook(&store, "evt_1", "charge.succeeded", effect).await.unwrap();
        assert_eq!(first, serde_json::json!({"charged": true}));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // A second delivery of the same event_id must not re-apply the
        // effect — it replays the first call's stored result even though
        // this effect carries a different value.
        let effect = Box::new(CountingEffect {
            counter: counter.clone(),
            value: serde_json::json!({"charged": false}),
        });
        let second = dispatch_webhook(&store, "evt_1", "charge.succeeded", effect).await.unwrap();
        assert_eq!(second, serde_json::json!({"charged": true}));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
