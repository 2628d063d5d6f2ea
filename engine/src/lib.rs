//! ExtraShifty financial engine
//!
//! The core that owns money movement for a shift-work marketplace: wallet
//! balances, funds reservation/settlement, cancellation refunds, disputes
//! and escrow, no-show penalties and suspensions, payouts, and shift
//! verification/approval. Everything else — HTTP, auth, user identity,
//! search, PDFs — is an external collaborator.
//!
//! Every public operation here is `async`, opens exactly one [`db::StoreTx`]
//! and either commits on success or drops without committing on error, and
//! takes its dependencies (storage, clock, payment processor, notification
//! sink) as trait objects so the whole engine runs deterministically against
//! [`db::memory::MemoryStore`] in tests and against
//! [`db::postgres::PgStore`] in production.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod ids;
pub mod ledger;
pub mod models;
pub mod money;
pub mod notify;
pub mod payouts;
pub mod penalties;
pub mod processor;
pub mod scheduler;
pub mod settlement;
pub mod verification;

pub use error::{EngineError, EngineResult};
