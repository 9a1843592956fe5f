//! # Shared Types
//!
//! Identity and configuration types shared across the ledger and the
//! queueing layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque 32-byte account identity.
///
/// The ledger is chain-agnostic: an `AccountId` may be a wallet address, a
/// pool-owned escrow identity or a strategy address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub const ZERO: AccountId = AccountId([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build an id from a small integer. Convenient for tests and the
    /// keeper harness.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated form for logs
        write!(
            f,
            "AccountId({:02x}{:02x}..{:02x}{:02x})",
            self.0[0], self.0[1], self.0[30], self.0[31]
        )
    }
}

/// Pool lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Deposits and withdrawals allowed
    Open,
    /// New deposits rejected, withdrawals still served
    Draining,
    /// Everything blocked except the backstop/insurance settlement path
    Closed,
}

/// A fee recipient paid in newly minted shares on positive rebases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeReceiver {
    pub account: AccountId,
    pub basis_points: u16,
}

/// Result of a ledger deposit: how much principal was routed into
/// strategies and how much remains as idle pool liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositOutcome {
    pub shares_minted: u64,
    pub placed: u64,
    pub unplaced: u64,
}
