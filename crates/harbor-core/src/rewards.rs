//! # Rewards Pool
//!
//! Cumulative per-share reward index for a secondary, non-rebasing reward
//! token. Distribution is O(1): the index advances once per distribution and
//! each holder settles lazily against it. Reward flow never touches the
//! share ledger's `total_staked`, so an insurance claim that scales stake
//! balances leaves already-earned rewards untouched.
//!
//! Callers must settle an account (withdraw or checkpoint) before changing
//! its share balance; the index has no hook into share transfers.

use std::collections::BTreeMap;

use crate::constants::REWARD_PRECISION;
use crate::errors::{CoreError, CoreResult};
use crate::math::{safe_add_u128, safe_mul_u128};
use crate::types::AccountId;

/// Capability interface for components that accept reward distributions.
pub trait RewardsDistributor {
    fn distribute(&mut self, amount: u64, total_shares: u64) -> CoreResult<()>;
}

/// Per-share reward accumulator.
#[derive(Debug, Default)]
pub struct RewardsPool {
    /// Cumulative rewards per share, scaled by `REWARD_PRECISION`
    reward_per_share: u128,
    /// Index value each account was last settled at
    settled_index: BTreeMap<AccountId, u128>,
    total_distributed: u64,
    total_withdrawn: u64,
}

impl RewardsPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_distributed(&self) -> u64 {
        self.total_distributed
    }

    /// Rewards the account could withdraw right now, given its current
    /// share balance.
    pub fn withdrawable(&self, account: &AccountId, shares: u64) -> CoreResult<u64> {
        let since = self.settled_index.get(account).copied().unwrap_or(0);
        let accrued = self
            .reward_per_share
            .checked_sub(since)
            .ok_or(CoreError::MathUnderflow)?;
        let amount = safe_mul_u128(shares as u128, accrued)? / REWARD_PRECISION;
        u64::try_from(amount).map_err(|_| CoreError::MathOverflow)
    }

    /// Settle and pay out the account's accrued rewards. Returns the amount.
    pub fn withdraw(&mut self, account: AccountId, shares: u64) -> CoreResult<u64> {
        let amount = self.withdrawable(&account, shares)?;
        self.settled_index.insert(account, self.reward_per_share);
        self.total_withdrawn = crate::math::safe_add_u64(self.total_withdrawn, amount)?;
        Ok(amount)
    }
}

impl RewardsDistributor for RewardsPool {
    /// Advance the index by `amount / total_shares`. Flooring dust stays in
    /// the pool.
    fn distribute(&mut self, amount: u64, total_shares: u64) -> CoreResult<()> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount);
        }
        if total_shares == 0 {
            return Err(CoreError::DivisionByZero);
        }
        let scaled = safe_mul_u128(amount as u128, REWARD_PRECISION)? / total_shares as u128;
        self.reward_per_share = safe_add_u128(self.reward_per_share, scaled)?;
        self.total_distributed = crate::math::safe_add_u64(self.total_distributed, amount)?;
        Ok(())
    }
}
