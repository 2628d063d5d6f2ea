//! Appeal — the 7-day (penalty/strike) / 72h (suspension) review path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealType {
    Penalty,
    Strike,
    Suspension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Approved,
    Denied,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    Medical,
    FamilyEmergency,
    NaturalDisaster,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: i64,
    pub user_id: i64,
    pub appeal_type: AppealType,
    pub related_id: i64,
    pub reason: String,
    pub evidence_urls: Vec<String>,
    pub emergency_type: Option<EmergencyType>,
    pub status: AppealStatus,
    pub appeal_deadline: DateTime<Utc>,
    pub frivolous_fee_charged: bool,
    pub emergency_waiver_used: bool,
}

impl AppealType {
    /// Appeal windows from the moment the sanction lands: 7 days for
    /// penalty/strike, 72 hours for suspension.
    pub fn window(&self) -> chrono::Duration {
        match self {
            AppealType::Penalty | AppealType::Strike => chrono::Duration::days(7),
            AppealType::Suspension => chrono::Duration::hours(72),
        }
    }
}
