//! Domain types
//!
//! All identifiers are `i64`, monotonically assigned by the database
//! (`BIGSERIAL` primary keys).

pub mod appeal;
pub mod application;
pub mod dispute;
pub mod emergency_waiver;
pub mod funds_hold;
pub mod negative_balance;
pub mod payout;
pub mod penalty;
pub mod scheduled_reserve;
pub mod shift;
pub mod strike;
pub mod suspension;
pub mod transaction;
pub mod user;
pub mod wallet;
pub mod webhook_event;

pub use appeal::{Appeal, AppealStatus, AppealType, EmergencyType};
pub use application::{Application, ApplicationStatus};
pub use dispute::{Dispute, DisputeStatus};
pub use emergency_waiver::EmergencyWaiver;
pub use funds_hold::{FundsHold, FundsHoldStatus};
pub use negative_balance::NegativeBalance;
pub use payout::{Payout, PayoutStatus, PayoutType};
pub use penalty::{Penalty, PenaltyStatus};
pub use scheduled_reserve::{ScheduledReserve, ScheduledReserveStatus};
pub use shift::{Shift, ShiftStatus};
pub use strike::Strike;
pub use suspension::UserSuspension;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use user::{Role, User};
pub use wallet::{AutoTopup, Wallet, WalletStatus};
pub use webhook_event::ProcessedWebhookEvent;
