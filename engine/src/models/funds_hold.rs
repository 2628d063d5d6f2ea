//! FundsHold — reserved funds against one shift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundsHoldStatus {
    Active,
    Released,
    Settled,
    Expired,
}

/// At most one `active` hold per `(wallet_id, shift_id)`. While `active`,
/// `amount` is counted in the wallet's `reserved`.
///
/// Escrow is modelled as an `active` hold whose `description` carries the
/// `ESCROW:` prefix rather than a dedicated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsHold {
    pub id: i64,
    pub wallet_id: i64,
    pub shift_id: i64,
    pub amount: Money,
    pub status: FundsHoldStatus,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

impl FundsHold {
    pub const ESCROW_PREFIX: &'static str = "ESCROW:";

    pub fn is_escrow(&self) -> bool {
        self.description
            .as_deref()
            .map(|d| d.starts_with(Self::ESCROW_PREFIX))
            .unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, FundsHoldStatus::Active)
    }
}
