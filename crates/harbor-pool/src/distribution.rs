//! # Distribution Ledger
//!
//! Cumulative-claim bookkeeping behind the Merkle distribution. Every
//! account's entitlement in a published tree is *cumulative over all
//! epochs*; the ledger records how much of that cumulative value each
//! account has already converted, so a proof can never be replayed for more
//! than the delta and a recorded cumulative never decreases.

use std::collections::BTreeMap;

use harbor_core::AccountId;

use crate::errors::{PoolError, PoolResult};

/// Per-account settled cumulative values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimRecord {
    pub amount: u64,
    pub shares: u64,
}

/// One published distribution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionUpdate {
    pub merkle_root: [u8; 32],
    pub ipfs_hash: [u8; 32],
    pub amount_distributed: u64,
    pub shares_distributed: u64,
    pub epoch: u64,
}

/// Root, epoch counter and per-account claim records.
#[derive(Debug, Default)]
pub struct DistributionLedger {
    merkle_root: Option<[u8; 32]>,
    ipfs_hash: [u8; 32],
    epoch: u64,
    total_amount_distributed: u64,
    total_shares_distributed: u64,
    claimed: BTreeMap<AccountId, ClaimRecord>,
}

impl DistributionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merkle_root(&self) -> Option<[u8; 32]> {
        self.merkle_root
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn ipfs_hash(&self) -> [u8; 32] {
        self.ipfs_hash
    }

    pub fn total_amount_distributed(&self) -> u64 {
        self.total_amount_distributed
    }

    pub fn total_shares_distributed(&self) -> u64 {
        self.total_shares_distributed
    }

    pub fn claimed(&self, account: &AccountId) -> ClaimRecord {
        self.claimed.get(account).copied().unwrap_or_default()
    }

    /// Install a new root. `amount`/`shares` are this cycle's distributed
    /// values; totals accumulate and the epoch advances.
    pub fn update(
        &mut self,
        merkle_root: [u8; 32],
        ipfs_hash: [u8; 32],
        amount_distributed: u64,
        shares_distributed: u64,
    ) -> DistributionUpdate {
        self.merkle_root = Some(merkle_root);
        self.ipfs_hash = ipfs_hash;
        self.epoch += 1;
        self.total_amount_distributed = self
            .total_amount_distributed
            .saturating_add(amount_distributed);
        self.total_shares_distributed = self
            .total_shares_distributed
            .saturating_add(shares_distributed);
        DistributionUpdate {
            merkle_root,
            ipfs_hash,
            amount_distributed,
            shares_distributed,
            epoch: self.epoch,
        }
    }

    /// Delta between a proven cumulative entitlement and what the account
    /// has already claimed. A proof against an older root (cumulative below
    /// the record) yields a zero delta.
    pub fn claimable(
        &self,
        account: &AccountId,
        cumulative_amount: u64,
        cumulative_shares: u64,
    ) -> (u64, u64) {
        let record = self.claimed(account);
        (
            cumulative_amount.saturating_sub(record.amount),
            cumulative_shares.saturating_sub(record.shares),
        )
    }

    /// Advance an account's record to the proven cumulative values.
    /// Records are monotone; regressions are rejected.
    pub fn record_claim(
        &mut self,
        account: AccountId,
        cumulative_amount: u64,
        cumulative_shares: u64,
    ) -> PoolResult<()> {
        let record = self.claimed(&account);
        if cumulative_amount < record.amount || cumulative_shares < record.shares {
            return Err(PoolError::NothingToClaim);
        }
        self.claimed.insert(
            account,
            ClaimRecord {
                amount: cumulative_amount,
                shares: cumulative_shares,
            },
        );
        Ok(())
    }
}
