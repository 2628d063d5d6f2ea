//! Payout — weekly batch or instant.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutType {
    Weekly,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    InTransit,
    Paid,
    Failed,
    Cancelled,
}

/// All payouts are written `pending`; the core never transitions one
/// directly to `paid` — a separate, out-of-scope processor worker does
/// that via provider webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub wallet_id: i64,
    pub amount: Money,
    pub fee: Money,
    pub net_amount: Money,
    pub r#type: PayoutType,
    pub status: PayoutStatus,
    pub scheduled_date: NaiveDate,
    pub external_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}
