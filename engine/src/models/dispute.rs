//! Dispute — raised on rejection, resolved for/against/split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    ResolvedForRaiser,
    ResolvedAgainstRaiser,
    Closed,
}

/// At most one `open`/`under_review` dispute per shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: i64,
    pub shift_id: i64,
    pub raised_by_user_id: i64,
    pub against_user_id: i64,
    pub amount_disputed: Money,
    pub reason: String,
    pub evidence: Vec<String>,
    pub status: DisputeStatus,
    pub resolution_deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, DisputeStatus::Open | DisputeStatus::UnderReview)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_unresolved() && self.resolution_deadline < now
    }
}
