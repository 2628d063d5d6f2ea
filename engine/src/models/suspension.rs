//! UserSuspension — account-level disciplinary state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `suspended_until = None` means indefinite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSuspension {
    pub id: i64,
    pub user_id: i64,
    pub reason: String,
    pub suspended_at: DateTime<Utc>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub lifted_by: Option<i64>,
}
