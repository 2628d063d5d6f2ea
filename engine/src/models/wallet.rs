//! Wallet — per-user balance, reserved funds, and auto-topup/status machine.
//!
//! Balance and reserved funds are tracked as separate fields with a status
//! state machine (active/grace_period/suspended) and auto-topup
//! configuration layered on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    GracePeriod,
    Suspended,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoTopup {
    pub enabled: bool,
    pub threshold: Option<Money>,
    pub amount: Option<Money>,
    pub payment_method: Option<String>,
}

impl AutoTopup {
    /// Valid iff all three fields are present when enabled.
    pub fn is_valid(&self) -> bool {
        if !self.enabled {
            return true;
        }
        self.threshold.is_some() && self.amount.is_some() && self.payment_method.is_some()
    }
}

/// A user's wallet.
///
/// Invariants (enforced on every mutation, see `engine::ledger`):
/// `balance >= reserved >= 0`; `available = balance - reserved`; at most
/// one wallet per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: Money,
    pub reserved: Money,
    pub minimum_balance: Money,
    pub auto_topup: AutoTopup,
    pub status: WalletStatus,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub last_failed_topup_at: Option<DateTime<Utc>>,
    pub external_account_id: Option<String>,
}

impl Wallet {
    pub fn new(id: i64, user_id: i64) -> Self {
        Self {
            id,
            user_id,
            balance: Money::ZERO,
            reserved: Money::ZERO,
            minimum_balance: Money::ZERO,
            auto_topup: AutoTopup::default(),
            status: WalletStatus::Active,
            grace_period_ends_at: None,
            last_failed_topup_at: None,
            external_account_id: None,
        }
    }

    /// `balance - reserved`: what the wallet can spend or withdraw right now.
    pub fn available(&self) -> Money {
        self.balance - self.reserved
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.status, WalletStatus::Suspended)
    }

    /// `balance >= reserved >= 0` — the wallet's core invariant.
    pub fn check_invariant(&self) -> bool {
        self.balance >= self.reserved && self.reserved >= Money::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_balance_minus_reserved() {
        let mut w = Wallet::new(1, 10);
        w.balance = Money::from_cents(10_000);
        w.reserved = Money::from_cents(4_000);
        assert_eq!(w.available(), Money::from_cents(6_000));
        assert!(w.check_invariant());
    }

    #[test]
    fn auto_topup_requires_all_fields_when_enabled() {
        let mut cfg = AutoTopup {
            enabled: true,
            threshold: Some(Money::from_cents(1_000)),
            amount: None,
            payment_method: Some("pm_1".to_string()),
        };
        assert!(!cfg.is_valid());
        cfg.amount = Some(Money::from_cents(5_000));
        assert!(cfg.is_valid());
    }
}
