//! Closed error taxonomy for the engine.
//!
//! One top-level enum every component error converts into, so callers (the
//! scheduler, the out-of-scope HTTP layer) can match on a single closed set
//! instead of a per-module error type.

use thiserror::Error;

use crate::money::Money;

/// Structured detail for a failed reservation or payout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient funds: required {required}, available {available}, shortfall {shortfall}")]
pub struct InsufficientFundsDetail {
    pub required: Money,
    pub available: Money,
    pub shortfall: Money,
    pub minimum_balance: Option<Money>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFundsDetail),

    #[error("wallet {0} is suspended")]
    WalletSuspended(i64),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("duplicate dispute for shift {0}")]
    DuplicateDispute(i64),

    #[error("appeal window closed")]
    AppealWindowClosed,

    #[error("duplicate appeal")]
    DuplicateAppeal,

    #[error("invalid appeal: {0}")]
    InvalidAppeal(String),

    #[error("payment processor failed: {0}")]
    PaymentProcessorFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("fatal invariant violated: {0}")]
    FatalInvariant(String),

    #[error("storage error: {0}")]
    Storage(#[from] crate::db::DbError),
}

pub type EngineResult<T> = Result<T, EngineError>;
