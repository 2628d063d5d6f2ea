//! ScheduledReserve — one row per non-first day of a multi-day shift.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledReserveStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReserve {
    pub id: i64,
    pub shift_id: i64,
    pub wallet_id: i64,
    pub shift_date: NaiveDate,
    pub amount: Money,
    pub execute_at: DateTime<Utc>,
    pub status: ScheduledReserveStatus,
    pub failure_reason: Option<String>,
}

impl ScheduledReserve {
    /// Past `execute_at` is promoted to "immediate" — due now.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, ScheduledReserveStatus::Pending) && self.execute_at <= now
    }
}
