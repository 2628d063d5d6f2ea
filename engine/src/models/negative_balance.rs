//! NegativeBalance — debt a user carries when a penalty exceeds wallet funds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Singleton per user when owed; `amount > 0` carries forward indefinitely
/// until offset by earnings or written off after 180 days of inactivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeBalance {
    pub id: i64,
    pub user_id: i64,
    pub amount: Money,
    pub last_activity_at: DateTime<Utc>,
}
