//! # Queue Error Types
//!
//! Queue-layer preconditions, layered over the core taxonomy.

use harbor_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("Insufficient deposit room")]
    InsufficientDepositRoom,

    #[error("Insufficient queued tokens")]
    InsufficientQueuedTokens,

    #[error("Insufficient queued balance")]
    InsufficientQueuedBalance,

    #[error("Invalid Merkle proof")]
    InvalidProof,

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("Pool is paused for update")]
    PoolPaused,

    #[error("Pool is not paused")]
    PoolNotPaused,

    #[error("Update conditions not met")]
    UpdateConditionsNotMet,

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type PoolResult<T> = Result<T, PoolError>;
