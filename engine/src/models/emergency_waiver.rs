//! EmergencyWaiver — at most one per `(user, calendar year)`.

use serde::{Deserialize, Serialize};

use crate::models::appeal::EmergencyType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyWaiver {
    pub id: i64,
    pub user_id: i64,
    pub year: i32,
    pub appeal_id: i64,
    pub emergency_type: EmergencyType,
}
