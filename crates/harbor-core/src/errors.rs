//! # Core Error Types
//!
//! Every violated precondition aborts the whole operation with one of these
//! variants; there is no partial state and no in-library retry.

use thiserror::Error;

/// Core accounting errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Validation and Authorization Errors
    // ========================================================================

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient share balance")]
    InsufficientShares,

    #[error("Fee basis points exceed 100%")]
    FeeConfigExceeded,

    // ========================================================================
    // Pool Status Errors
    // ========================================================================

    #[error("Deposits disabled")]
    DepositsDisabled,

    #[error("Pool closed")]
    PoolClosed,

    #[error("Loss threshold not met")]
    LossThresholdNotMet,

    // ========================================================================
    // Liquidity Errors
    // ========================================================================

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    // ========================================================================
    // Strategy Registry Errors
    // ========================================================================

    #[error("Strategy not found")]
    StrategyNotFound,

    #[error("Duplicate strategy")]
    DuplicateStrategy,

    #[error("Strategy has outstanding deposits")]
    StrategyNotEmpty,

    #[error("Strategy limit reached")]
    StrategyLimitReached,

    #[error("Invalid strategy order")]
    InvalidStrategyOrder,

    // ========================================================================
    // Insurance Claim Errors
    // ========================================================================

    #[error("No claim in progress")]
    NoClaimInProgress,

    #[error("Claim already in progress")]
    ClaimInProgress,
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, CoreError>;
