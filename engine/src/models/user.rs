//! User — opaque to the core beyond role and active flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Company,
    Agency,
    Admin,
}

/// A platform user, opaque to the engine beyond role and active flag.
///
/// User identity, profile, auth tokens, and GDPR export/deletion all live
/// outside this crate — the engine only ever sees `id`, `role`, and
/// `active`/`deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub role: Role,
    pub active: bool,
    pub deleted: bool,
    /// Set for 30 days when a suspension appeal is approved. Recorded only
    /// — no behaviour in this core reads it back; it is a signal for the
    /// product/HTTP layer.
    pub probation_until: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_usable(&self) -> bool {
        self.active && !self.deleted
    }

    pub fn is_on_probation(&self, now: DateTime<Utc>) -> bool {
        self.probation_until.map(|until| until > now).unwrap_or(false)
    }
}
