//! Strike — a time-limited mark on a user's record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strike {
    pub id: i64,
    pub user_id: i64,
    pub shift_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_warning_only: bool,
}

impl Strike {
    /// Counts toward suspension thresholds: active, non-warning, unexpired.
    pub fn counts_toward_suspension(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_warning_only && self.expires_at > now
    }

    pub fn is_same_day(&self, other: DateTime<Utc>) -> bool {
        self.created_at.date_naive() == other.date_naive()
    }
}
