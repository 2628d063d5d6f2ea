//! Penalty — monetary charge levied on no-show.

use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyStatus {
    Pending,
    Collected,
    Waived,
    WrittenOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub id: i64,
    pub user_id: i64,
    pub shift_id: i64,
    pub amount: Money,
    pub reason: String,
    pub status: PenaltyStatus,
    pub collected_amount: Option<Money>,
    pub waived_by: Option<i64>,
}
