//! # Harbor Pool - Queueing & Settlement Layer
//!
//! Admission control in front of the share ledger: deposits that exceed
//! strategy capacity are queued, placed in batches by keepers, and settled
//! through an off-chain-computed, proof-verified Merkle distribution so that
//! no settlement step ever iterates over all depositors.
//!
//! - `PriorityPool` — the deposit queue facade (owns the share ledger)
//! - `WithdrawalQueue` — FIFO share-denominated withdrawal requests
//! - `DistributionLedger` — cumulative-claim bookkeeping per account
//! - `merkle` — sorted-pair Merkle tree and proof verification
//! - `DistributionOracle` — in-process reference oracle for tests and the
//!   keeper harness

pub mod distribution;
pub mod errors;
pub mod merkle;
pub mod oracle;
pub mod priority;
pub mod withdrawal;

pub use distribution::{ClaimRecord, DistributionLedger, DistributionUpdate};
pub use errors::{PoolError, PoolResult};
pub use merkle::{leaf_hash, verify_proof, MerkleTree};
pub use oracle::{CycleReport, DistributionOracle, Entitlement};
pub use priority::{
    DepositPayload, DepositReceipt, PriorityPool, QueueConfig, QueueStatus, Upkeep,
    WithdrawOutcome,
};
pub use withdrawal::{Fulfillment, WithdrawalQueue, WithdrawalRequest};
