//! Notification sink port.
//!
//! The engine raises notices — a failed auto-topup, a strike, a
//! suspension, an appeal decision — but never decides how they reach a
//! user (push, email, in-app). That's an external collaborator; this
//! trait is the seam.

use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AutoTopupFailed { user_id: i64 },
    WalletSuspended { user_id: i64 },
    StrikeIssued { user_id: i64, strike_id: i64 },
    UserSuspended { user_id: i64, suspension_id: i64 },
    SuspensionLifted { user_id: i64, suspension_id: i64 },
    AppealResolved { user_id: i64, appeal_id: i64, approved: bool },
    DisputeAutoResolved { dispute_id: i64 },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notice: Notice);
}

/// Test double that records every notice sent, in order.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().expect("recording sink mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notice: Notice) {
        self.sent.lock().expect("recording sink mutex poisoned").push(notice);
    }
}
