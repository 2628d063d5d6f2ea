//! Transaction — the sole write path for wallet balances.
//!
//! Builder-style construction, an explicit `status` enum driving the
//! lifecycle, a ledger entry against one wallet per row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Topup,
    Reserve,
    Release,
    Settlement,
    Commission,
    Payout,
    Refund,
    CancellationFee,
    Penalty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// An append-once-`completed` ledger entry against a wallet.
///
/// `net_amount = amount - fee` for credits; for debits `amount` is positive
/// and direction is inferred from `r#type`. `idempotency_key` is globally
/// unique — see `engine::ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub wallet_id: i64,
    pub r#type: TransactionType,
    pub amount: Money,
    pub fee: Money,
    pub net_amount: Money,
    pub status: TransactionStatus,
    pub idempotency_key: String,
    pub related_shift_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        wallet_id: i64,
        r#type: TransactionType,
        amount: Money,
        fee: Money,
        idempotency_key: String,
        related_shift_id: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            wallet_id,
            r#type,
            amount,
            fee,
            net_amount: amount - fee,
            status: TransactionStatus::Pending,
            idempotency_key,
            related_shift_id,
            description: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn complete(mut self, at: DateTime<Utc>) -> Self {
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(at);
        self
    }

    pub fn fail(mut self, at: DateTime<Utc>) -> Self {
        self.status = TransactionStatus::Failed;
        self.completed_at = Some(at);
        self
    }

    /// True when this transaction carries the stable "agency-supplied"
    /// routing tag used by the no-show path for agency-managed shifts — a
    /// structured check rather than a raw description substring match.
    pub fn is_agency_supplied_marker(&self) -> bool {
        self.r#type == TransactionType::CancellationFee
            && self
                .description
                .as_deref()
                .map(|d| d.starts_with("agency-supplied"))
                .unwrap_or(false)
    }
}
