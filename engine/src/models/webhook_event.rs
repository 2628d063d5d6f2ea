//! ProcessedWebhookEvent — idempotency store for the payment-processor port.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedWebhookEvent {
    pub id: i64,
    pub event_id: String,
    pub event_type: String,
    pub result: serde_json::Value,
}
