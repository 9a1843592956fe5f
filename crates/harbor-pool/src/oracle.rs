//! # Distribution Oracle
//!
//! In-process reference implementation of the off-chain distribution
//! pipeline: pause the pool, allocate the principal placed since the last
//! update pro-rata across queued depositors, rebuild the cumulative Merkle
//! tree and publish its root. The keeper binary drives this directly; the
//! integration tests use it to produce verifiable proofs.

use std::collections::BTreeMap;

use harbor_core::AccountId;
use sha2::{Digest, Sha256};

use crate::errors::PoolResult;
use crate::merkle::{leaf_hash, MerkleTree};
use crate::priority::PriorityPool;

/// Cumulative entitlement assigned to one account across all epochs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entitlement {
    pub amount: u64,
    pub shares: u64,
}

/// Result of a published oracle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub merkle_root: [u8; 32],
    pub amount_distributed: u64,
    pub shares_distributed: u64,
    pub accounts: usize,
}

pub struct DistributionOracle {
    authority: AccountId,
    /// What each account would have claimed if fully settled. Mirrors the
    /// tree contents exactly.
    cumulative: BTreeMap<AccountId, Entitlement>,
}

impl DistributionOracle {
    pub fn new(authority: AccountId) -> Self {
        Self {
            authority,
            cumulative: BTreeMap::new(),
        }
    }

    pub fn authority(&self) -> AccountId {
        self.authority
    }

    pub fn entitlement(&self, account: &AccountId) -> Entitlement {
        self.cumulative.get(account).copied().unwrap_or_default()
    }

    /// Run one distribution cycle against the pool. Returns `None` (after
    /// cancelling the pause) when nothing was placed since the last update.
    pub fn run_cycle(&mut self, pool: &mut PriorityPool) -> PoolResult<Option<CycleReport>> {
        pool.pause_for_update(self.authority)?;

        let pending_amount = pool.deposits_since_last_update();
        let pending_shares = pool.shares_since_last_update();
        if pending_amount == 0 {
            pool.cancel_update(self.authority)?;
            return Ok(None);
        }

        // Weight each depositor by queued principal not yet assigned to it.
        let weights: Vec<(AccountId, u64)> = pool
            .queued_accounts()
            .into_iter()
            .map(|(account, raw)| {
                let assigned = self.entitlement(&account).amount;
                (account, raw.saturating_sub(assigned))
            })
            .filter(|(_, weight)| *weight > 0)
            .collect();
        let total_weight: u128 = weights.iter().map(|(_, w)| *w as u128).sum();
        if total_weight == 0 {
            pool.cancel_update(self.authority)?;
            return Ok(None);
        }

        let mut amount_distributed: u64 = 0;
        let mut shares_distributed: u64 = 0;
        for (account, weight) in weights {
            // floor rounding leaves any remainder for a later cycle
            let amount =
                ((pending_amount as u128 * weight as u128) / total_weight) as u64;
            if amount == 0 {
                continue;
            }
            let shares =
                ((pending_shares as u128 * amount as u128) / pending_amount as u128) as u64;
            let entry = self.cumulative.entry(account).or_default();
            entry.amount = entry.amount.saturating_add(amount);
            entry.shares = entry.shares.saturating_add(shares);
            amount_distributed += amount;
            shares_distributed += shares;
        }

        // Every queued account appears in the tree, zero entitlements
        // included, so a depositor queued after the last allocation can
        // still prove its cumulative against the published root.
        for (account, _) in pool.queued_accounts() {
            self.cumulative.entry(account).or_default();
        }

        let tree = self.build_tree();
        let root = tree.root();
        pool.update_distribution(
            self.authority,
            root,
            self.content_hash(),
            amount_distributed,
            shares_distributed,
        )?;
        log::info!(
            "oracle cycle published: root={:02x?}.. amount={} shares={} accounts={}",
            &root[..4],
            amount_distributed,
            shares_distributed,
            self.cumulative.len()
        );
        Ok(Some(CycleReport {
            merkle_root: root,
            amount_distributed,
            shares_distributed,
            accounts: self.cumulative.len(),
        }))
    }

    /// Cumulative values and inclusion proof for an account under the
    /// current tree.
    pub fn proof_for(&self, account: &AccountId) -> Option<(u64, u64, Vec<[u8; 32]>)> {
        let index = self.cumulative.keys().position(|k| k == account)?;
        let entitlement = self.cumulative.get(account)?;
        let proof = self.build_tree().proof(index)?;
        Some((entitlement.amount, entitlement.shares, proof))
    }

    /// Leaves in account order, matching `proof_for` indexing.
    fn build_tree(&self) -> MerkleTree {
        let leaves = self
            .cumulative
            .iter()
            .map(|(account, e)| leaf_hash(account, e.amount, e.shares))
            .collect();
        MerkleTree::new(leaves)
    }

    /// Content identifier for the published dataset. Stands in for the
    /// off-chain storage hash the on-chain record carries alongside the root.
    fn content_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (account, e) in &self.cumulative {
            hasher.update(account.as_bytes());
            hasher.update(e.amount.to_le_bytes());
            hasher.update(e.shares.to_le_bytes());
        }
        hasher.finalize().into()
    }
}
