//! # Priority Pool (Deposit Queue)
//!
//! Admission control in front of the share ledger. Deposits that fit
//! current strategy room stake immediately; the remainder is queued as raw
//! principal. Keepers batch-place queued principal when room frees up, and
//! an off-chain oracle periodically publishes a Merkle root assigning the
//! resulting shares to queued depositors. Settlement is O(1) per cycle;
//! verification is O(log n) per claim.
//!
//! State machine: `Active —pause_for_update→ PausedForUpdate
//! —update_distribution/cancel_update→ Active`. While paused, proof-gated
//! operations and queue settlement are rejected so the root under
//! verification stays stable.

use std::collections::BTreeMap;

use harbor_core::{AccountId, CoreError, PoolStatus, StakingPool};
use serde::{Deserialize, Serialize};

use crate::distribution::DistributionLedger;
use crate::errors::{PoolError, PoolResult};
use crate::merkle::{leaf_hash, verify_proof};
use crate::withdrawal::{Fulfillment, WithdrawalQueue, WithdrawalRequest};

/// Keeper-facing upkeep hooks.
pub trait Upkeep {
    /// Whether upkeep is needed, plus the perform payload.
    fn check_upkeep(&self, data: &[u8]) -> (bool, Vec<u8>);

    /// Execute upkeep. Violated thresholds abort with
    /// `UpdateConditionsNotMet`-class errors.
    fn perform_upkeep(&mut self, data: &[u8]) -> PoolResult<()>;
}

/// Routing data carried by a transfer-with-payload deposit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DepositPayload {
    /// Hold unplaceable principal in the queue instead of rejecting
    pub should_queue: bool,
}

/// Queue configuration. The escrow identities are pool-owned accounts on
/// the share ledger.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Distribution oracle authority
    pub oracle: AccountId,
    /// Holds shares minted for queued principal until they are claimed
    pub deposit_escrow: AccountId,
    /// Holds shares backing queued withdrawal requests
    pub withdrawal_escrow: AccountId,
    /// Queued total that makes deposit upkeep worthwhile
    pub queued_deposit_threshold: u64,
    /// Smallest batch a queued-deposit placement may move
    pub min_queued_deposit: u64,
    /// Largest batch a queued-deposit placement may move
    pub max_queued_deposit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Active,
    PausedForUpdate,
}

/// Immediate-vs-queued split of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositReceipt {
    pub shares_minted: u64,
    pub staked: u64,
    pub queued: u64,
}

/// Result of a queue-layer withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WithdrawOutcome {
    /// Principal returned straight from the account's unplaced queue
    pub from_queue: u64,
    /// Principal withdrawn from pool liquidity
    pub from_pool: u64,
    /// Shares locked behind a queued withdrawal request
    pub queued_shares: u64,
}

/// The deposit queue facade. Owns the share ledger, the distribution
/// ledger and the withdrawal queue.
pub struct PriorityPool {
    config: QueueConfig,
    staking: StakingPool,
    distribution: DistributionLedger,
    withdrawal: WithdrawalQueue,
    /// Raw queued principal per account: everything ever queued minus
    /// everything unqueued. Distributed amounts are subtracted via the
    /// distribution ledger's cumulative records, not here.
    queued: BTreeMap<AccountId, u64>,
    total_queued: u64,
    status: QueueStatus,
    deposits_since_last_update: u64,
    shares_since_last_update: u64,
}

impl PriorityPool {
    pub fn new(staking: StakingPool, config: QueueConfig) -> Self {
        Self {
            config,
            staking,
            distribution: DistributionLedger::new(),
            withdrawal: WithdrawalQueue::new(),
            queued: BTreeMap::new(),
            total_queued: 0,
            status: QueueStatus::Active,
            deposits_since_last_update: 0,
            shares_since_last_update: 0,
        }
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn status(&self) -> QueueStatus {
        self.status
    }

    pub fn staking(&self) -> &StakingPool {
        &self.staking
    }

    pub fn staking_mut(&mut self) -> &mut StakingPool {
        &mut self.staking
    }

    pub fn distribution(&self) -> &DistributionLedger {
        &self.distribution
    }

    pub fn withdrawal_queue(&self) -> &WithdrawalQueue {
        &self.withdrawal
    }

    pub fn total_queued(&self) -> u64 {
        self.total_queued
    }

    pub fn deposits_since_last_update(&self) -> u64 {
        self.deposits_since_last_update
    }

    pub fn shares_since_last_update(&self) -> u64 {
        self.shares_since_last_update
    }

    /// Everything the account ever queued minus everything it unqueued.
    pub fn queued_raw(&self, account: &AccountId) -> u64 {
        self.queued.get(account).copied().unwrap_or(0)
    }

    /// Queued principal still convertible or unqueueable, from the
    /// account's *settled* point of view. Distributions the account has not
    /// yet proven still count as queued here; settling the claim moves them
    /// out.
    pub fn effective_queued(&self, account: &AccountId) -> u64 {
        self.queued_raw(account)
            .saturating_sub(self.distribution.claimed(account).amount)
    }

    /// Snapshot of raw queued balances, for the distribution oracle.
    pub fn queued_accounts(&self) -> Vec<(AccountId, u64)> {
        self.queued.iter().map(|(k, v)| (*k, *v)).collect()
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    /// Transfer-with-payload entry point: the token layer delivers the
    /// deposited amount together with routing data.
    pub fn on_token_transfer(
        &mut self,
        from: AccountId,
        amount: u64,
        payload: DepositPayload,
    ) -> PoolResult<DepositReceipt> {
        self.deposit(from, amount, payload.should_queue)
    }

    /// Stake up to the available room immediately; queue or reject the
    /// remainder.
    pub fn deposit(
        &mut self,
        account: AccountId,
        amount: u64,
        should_queue: bool,
    ) -> PoolResult<DepositReceipt> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount.into());
        }
        match self.staking.status() {
            PoolStatus::Open => {}
            PoolStatus::Draining => return Err(CoreError::DepositsDisabled.into()),
            PoolStatus::Closed => return Err(CoreError::PoolClosed.into()),
        }

        let room = self.staking.deposit_room();
        let to_stake = amount.min(room);
        let to_queue = amount - to_stake;
        if to_queue > 0 && !should_queue {
            return Err(CoreError::DepositsDisabled.into());
        }

        let mut receipt = DepositReceipt::default();
        if to_stake > 0 {
            let outcome = self.staking.deposit(account, to_stake)?;
            receipt.shares_minted = outcome.shares_minted;
            receipt.staked = to_stake;
        }
        if to_queue > 0 {
            let entry = self.queued.entry(account).or_insert(0);
            *entry = entry.checked_add(to_queue).ok_or(CoreError::MathOverflow)?;
            self.total_queued = self
                .total_queued
                .checked_add(to_queue)
                .ok_or(CoreError::MathOverflow)?;
            receipt.queued = to_queue;
        }
        Ok(receipt)
    }

    /// Keeper-invoked batch placement of queued principal. Shares are
    /// minted to the deposit escrow; the next distribution assigns them.
    pub fn deposit_queued_tokens(&mut self, min_deposit: u64, max_deposit: u64) -> PoolResult<u64> {
        self.require_active()?;
        self.require_not_closed()?;
        if max_deposit < min_deposit {
            return Err(CoreError::InvalidAmount.into());
        }
        let room = self.staking.deposit_room();
        if room == 0 || room < min_deposit {
            return Err(PoolError::InsufficientDepositRoom);
        }
        if self.total_queued < min_deposit {
            return Err(PoolError::InsufficientQueuedTokens);
        }

        let to_deposit = self.total_queued.min(max_deposit).min(room);
        let outcome = self.staking.deposit(self.config.deposit_escrow, to_deposit)?;
        self.total_queued -= to_deposit;
        self.deposits_since_last_update += to_deposit;
        self.shares_since_last_update += outcome.shares_minted;
        log::info!(
            "queued deposit placed: amount={} shares={} still_queued={}",
            to_deposit,
            outcome.shares_minted,
            self.total_queued
        );
        Ok(to_deposit)
    }

    // ========================================================================
    // Distribution Cycle
    // ========================================================================

    /// Freeze proof-gated operations while the oracle computes a new root.
    pub fn pause_for_update(&mut self, caller: AccountId) -> PoolResult<()> {
        self.require_oracle(caller)?;
        self.require_active()?;
        self.status = QueueStatus::PausedForUpdate;
        Ok(())
    }

    /// Install a new cumulative root and unpause atomically.
    pub fn update_distribution(
        &mut self,
        caller: AccountId,
        merkle_root: [u8; 32],
        ipfs_hash: [u8; 32],
        amount_distributed: u64,
        shares_distributed: u64,
    ) -> PoolResult<()> {
        self.require_oracle(caller)?;
        if self.status != QueueStatus::PausedForUpdate {
            return Err(PoolError::PoolNotPaused);
        }
        if amount_distributed > self.deposits_since_last_update
            || shares_distributed > self.shares_since_last_update
        {
            return Err(CoreError::InvalidAmount.into());
        }
        let update = self.distribution.update(
            merkle_root,
            ipfs_hash,
            amount_distributed,
            shares_distributed,
        );
        self.deposits_since_last_update -= amount_distributed;
        self.shares_since_last_update -= shares_distributed;
        self.status = QueueStatus::Active;
        log::info!(
            "distribution updated: epoch={} amount={} shares={}",
            update.epoch,
            amount_distributed,
            shares_distributed
        );
        Ok(())
    }

    /// Abandon a paused cycle without publishing (manual verification
    /// failed, oracle request cancelled).
    pub fn cancel_update(&mut self, caller: AccountId) -> PoolResult<()> {
        self.require_oracle(caller)?;
        if self.status != QueueStatus::PausedForUpdate {
            return Err(PoolError::PoolNotPaused);
        }
        self.status = QueueStatus::Active;
        Ok(())
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Convert queued principal into derivative shares by proving the
    /// account's cumulative entitlement. Credits only the delta over what
    /// was already claimed.
    pub fn claim_lsd_tokens(
        &mut self,
        account: AccountId,
        cumulative_amount: u64,
        cumulative_shares: u64,
        proof: &[[u8; 32]],
    ) -> PoolResult<u64> {
        self.require_active()?;
        self.require_not_closed()?;
        let (amount, shares) =
            self.settle_distribution(account, cumulative_amount, cumulative_shares, proof)?;
        if amount == 0 && shares == 0 {
            return Err(PoolError::NothingToClaim);
        }
        Ok(shares)
    }

    /// Return not-yet-placed queued principal to the depositor. Any newly
    /// provable claim is settled first so no entitlement is stranded.
    pub fn unqueue_tokens(
        &mut self,
        account: AccountId,
        amount: u64,
        cumulative_amount: u64,
        cumulative_shares: u64,
        proof: &[[u8; 32]],
    ) -> PoolResult<u64> {
        self.require_active()?;
        self.require_not_closed()?;
        if amount == 0 {
            return Err(CoreError::InvalidAmount.into());
        }
        self.settle_distribution(account, cumulative_amount, cumulative_shares, proof)?;

        let available = self.effective_queued(&account).min(self.total_queued);
        if amount > available {
            return Err(PoolError::InsufficientQueuedBalance);
        }
        self.debit_queued(account, amount)?;
        Ok(amount)
    }

    // ========================================================================
    // Withdrawals
    // ========================================================================

    /// Withdraw `amount`, drawing first from unplaced queued principal
    /// (`should_unqueue`), then from the settled share balance against pool
    /// liquidity. A shortfall becomes a queued withdrawal request if
    /// `should_queue_withdrawal`, otherwise the whole call fails with
    /// `InsufficientLiquidity`.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw(
        &mut self,
        account: AccountId,
        amount: u64,
        cumulative_amount: u64,
        cumulative_shares: u64,
        proof: &[[u8; 32]],
        should_unqueue: bool,
        should_queue_withdrawal: bool,
    ) -> PoolResult<WithdrawOutcome> {
        self.require_active()?;
        self.require_not_closed()?;
        if amount == 0 {
            return Err(CoreError::InvalidAmount.into());
        }

        // Validate everything before mutating anything: the call either
        // fully commits or fully reverts.
        let record = self.distribution.claimed(&account);
        let needs_settle =
            cumulative_amount != record.amount || cumulative_shares != record.shares;
        if needs_settle || should_unqueue {
            self.verify_cumulative(&account, cumulative_amount, cumulative_shares, proof)?;
        }
        let (_, settled_shares) =
            self.distribution
                .claimable(&account, cumulative_amount, cumulative_shares);

        let settled_cumulative = cumulative_amount.max(record.amount);
        let effective = self
            .queued_raw(&account)
            .saturating_sub(settled_cumulative)
            .min(self.total_queued);
        let from_queue = if should_unqueue {
            amount.min(effective)
        } else {
            0
        };
        let remaining = amount - from_queue;
        let liquidity = self.staking.available_liquidity();
        let from_pool = remaining.min(liquidity);
        let shortfall = remaining - from_pool;
        if shortfall > 0 && !should_queue_withdrawal {
            return Err(CoreError::InsufficientLiquidity.into());
        }

        let shares_for_pool = self.staking.shares_from_stake_ceil(from_pool)?;
        let shares_for_shortfall = self.staking.shares_from_stake(shortfall)?;
        let balance_after_settle = self
            .staking
            .shares_of(&account)
            .saturating_add(settled_shares);
        if balance_after_settle < shares_for_pool.saturating_add(shares_for_shortfall) {
            return Err(CoreError::InsufficientShares.into());
        }

        // Apply.
        if needs_settle {
            self.settle_distribution(account, cumulative_amount, cumulative_shares, proof)?;
        }
        if from_queue > 0 {
            self.debit_queued(account, from_queue)?;
        }
        if shares_for_shortfall > 0 {
            self.staking
                .transfer_shares(account, self.config.withdrawal_escrow, shares_for_shortfall)?;
            self.withdrawal.push(WithdrawalRequest {
                account,
                shares: shares_for_shortfall,
            });
        }
        if from_pool > 0 {
            self.staking.withdraw(account, from_pool)?;
        }

        Ok(WithdrawOutcome {
            from_queue,
            from_pool,
            queued_shares: shares_for_shortfall,
        })
    }

    /// Drain freed liquidity into queued withdrawal requests, FIFO.
    /// Idempotent: no eligible work is a no-op.
    pub fn withdrawal_upkeep(&mut self) -> PoolResult<Vec<Fulfillment>> {
        self.withdrawal
            .perform_upkeep(&mut self.staking, self.config.withdrawal_escrow)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_oracle(&self, caller: AccountId) -> PoolResult<()> {
        if caller != self.config.oracle {
            return Err(CoreError::Unauthorized.into());
        }
        Ok(())
    }

    fn require_active(&self) -> PoolResult<()> {
        if self.status != QueueStatus::Active {
            return Err(PoolError::PoolPaused);
        }
        Ok(())
    }

    fn require_not_closed(&self) -> PoolResult<()> {
        if self.staking.status() == PoolStatus::Closed {
            return Err(CoreError::PoolClosed.into());
        }
        Ok(())
    }

    /// Check submitted cumulative values. Once a root is published every
    /// proof-gated operation must verify against it, even for values equal
    /// to the account's record; before any root exists only all-zero
    /// cumulatives are acceptable.
    fn verify_cumulative(
        &self,
        account: &AccountId,
        cumulative_amount: u64,
        cumulative_shares: u64,
        proof: &[[u8; 32]],
    ) -> PoolResult<()> {
        match self.distribution.merkle_root() {
            Some(root) => {
                let leaf = leaf_hash(account, cumulative_amount, cumulative_shares);
                if !verify_proof(&root, &leaf, proof) {
                    return Err(PoolError::InvalidProof);
                }
            }
            None => {
                if cumulative_amount != 0 || cumulative_shares != 0 {
                    return Err(PoolError::InvalidProof);
                }
            }
        }
        Ok(())
    }

    /// Settle the delta between a proven cumulative entitlement and the
    /// account's record, moving the corresponding shares out of escrow.
    fn settle_distribution(
        &mut self,
        account: AccountId,
        cumulative_amount: u64,
        cumulative_shares: u64,
        proof: &[[u8; 32]],
    ) -> PoolResult<(u64, u64)> {
        self.verify_cumulative(&account, cumulative_amount, cumulative_shares, proof)?;
        let (amount, shares) =
            self.distribution
                .claimable(&account, cumulative_amount, cumulative_shares);
        if amount == 0 && shares == 0 {
            // proof against an older root; nothing beyond the record
            return Ok((0, 0));
        }
        self.distribution
            .record_claim(account, cumulative_amount, cumulative_shares)?;
        if shares > 0 {
            self.staking
                .transfer_shares(self.config.deposit_escrow, account, shares)?;
        }
        Ok((amount, shares))
    }

    fn debit_queued(&mut self, account: AccountId, amount: u64) -> PoolResult<()> {
        let raw = self.queued_raw(&account);
        let remaining = raw
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientQueuedBalance)?;
        if remaining == 0 {
            self.queued.remove(&account);
        } else {
            self.queued.insert(account, remaining);
        }
        self.total_queued = self
            .total_queued
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientQueuedBalance)?;
        Ok(())
    }
}

impl Upkeep for PriorityPool {
    /// Deposit upkeep is needed once the queued total and free room both
    /// clear the configured thresholds.
    fn check_upkeep(&self, _data: &[u8]) -> (bool, Vec<u8>) {
        let needed = self.status == QueueStatus::Active
            && self.staking.status() == PoolStatus::Open
            && self.total_queued >= self.config.queued_deposit_threshold
            && self.total_queued >= self.config.min_queued_deposit
            && self.staking.deposit_room() >= self.config.min_queued_deposit;
        let mut perform_data = Vec::with_capacity(16);
        perform_data.extend_from_slice(&self.config.min_queued_deposit.to_le_bytes());
        perform_data.extend_from_slice(&self.config.max_queued_deposit.to_le_bytes());
        (needed, perform_data)
    }

    fn perform_upkeep(&mut self, data: &[u8]) -> PoolResult<()> {
        if data.len() != 16 {
            return Err(PoolError::UpdateConditionsNotMet);
        }
        let mut min_bytes = [0u8; 8];
        let mut max_bytes = [0u8; 8];
        min_bytes.copy_from_slice(&data[..8]);
        max_bytes.copy_from_slice(&data[8..]);
        let (needed, _) = self.check_upkeep(&[]);
        if !needed {
            return Err(PoolError::UpdateConditionsNotMet);
        }
        self.deposit_queued_tokens(u64::from_le_bytes(min_bytes), u64::from_le_bytes(max_bytes))?;
        Ok(())
    }
}
