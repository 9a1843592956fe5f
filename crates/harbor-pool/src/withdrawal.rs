//! # Withdrawal Queue
//!
//! FIFO queue of share-denominated withdrawal requests, fulfilled (possibly
//! partially) as pool liquidity frees up. The shares backing every queued
//! request are held by a pool-owned escrow account on the share ledger, so
//! a queued request keeps rebasing with the pool until it is paid out.

use std::collections::VecDeque;

use harbor_core::{AccountId, StakingPool};

use crate::errors::PoolResult;

/// A queued withdrawal. `shares` is what remains unfulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub account: AccountId,
    pub shares: u64,
}

/// Principal paid to an account by an upkeep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fulfillment {
    pub account: AccountId,
    pub amount: u64,
}

#[derive(Debug, Default)]
pub struct WithdrawalQueue {
    requests: VecDeque<WithdrawalRequest>,
    total_queued_shares: u64,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn total_queued_shares(&self) -> u64 {
        self.total_queued_shares
    }

    pub fn requests(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.requests.iter()
    }

    /// Enqueue a request. The caller has already moved the backing shares
    /// to the escrow account.
    pub fn push(&mut self, request: WithdrawalRequest) {
        self.total_queued_shares = self.total_queued_shares.saturating_add(request.shares);
        self.requests.push_back(request);
    }

    /// Whether an upkeep run would fulfill anything right now.
    pub fn has_eligible_work(&self, staking: &StakingPool) -> bool {
        !self.requests.is_empty() && staking.available_liquidity() > 0
    }

    /// Drain free pool liquidity into queued requests, FIFO, with partial
    /// fulfillment. Shares are burned from `escrow`; payouts are returned
    /// to the caller for settlement. A call with no eligible work is a
    /// no-op, not an error.
    pub fn perform_upkeep(
        &mut self,
        staking: &mut StakingPool,
        escrow: AccountId,
    ) -> PoolResult<Vec<Fulfillment>> {
        let mut fulfilled = Vec::new();
        while let Some(request) = self.requests.front_mut() {
            let value = staking.stake_from_shares(request.shares)?;
            if value == 0 {
                // dust request: hand residual shares back and drop it
                let residual = request.shares;
                let account = request.account;
                if residual > 0 {
                    staking.transfer_shares(escrow, account, residual)?;
                }
                self.total_queued_shares -= residual;
                self.requests.pop_front();
                continue;
            }

            let liquidity = staking.available_liquidity();
            if liquidity == 0 {
                break;
            }
            let amount = value.min(liquidity);
            let burned = staking.withdraw(escrow, amount)?;
            let account = request.account;
            request.shares = request.shares.saturating_sub(burned);
            self.total_queued_shares = self.total_queued_shares.saturating_sub(burned);
            fulfilled.push(Fulfillment { account, amount });

            if request.shares == 0 {
                self.requests.pop_front();
            } else if amount < value {
                // partial fill exhausted the pool; remainder stays queued
                break;
            }
        }
        Ok(fulfilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::{ManualStrategy, PoolConfig};

    fn controller() -> AccountId {
        AccountId::from_low_u64(1)
    }

    fn escrow() -> AccountId {
        AccountId::from_low_u64(9)
    }

    fn account(n: u64) -> AccountId {
        AccountId::from_low_u64(10 + n)
    }

    fn staking_pool() -> StakingPool {
        StakingPool::new(PoolConfig {
            controller: controller(),
            rebase_controller: controller(),
            fee_receivers: vec![],
            pool_cap: u64::MAX,
            reopen_loss_threshold: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_upkeep_noop_when_empty() {
        let mut staking = staking_pool();
        staking.deposit(account(1), 1000).unwrap();
        let mut queue = WithdrawalQueue::new();
        assert!(!queue.has_eligible_work(&staking));
        assert_eq!(queue.perform_upkeep(&mut staking, escrow()).unwrap(), vec![]);
        assert_eq!(staking.total_staked(), 1000);
    }

    #[test]
    fn test_fifo_partial_fulfillment() {
        let strat = ManualStrategy::new(u64::MAX, 700);
        let mut staking = staking_pool();
        staking
            .add_strategy(
                controller(),
                AccountId::from_low_u64(100),
                Box::new(strat.clone()),
                AccountId::ZERO,
                0,
            )
            .unwrap();
        staking.deposit(account(1), 600).unwrap();
        staking.deposit(account(2), 400).unwrap();

        // both accounts queue everything; only 300 is drainable
        let mut queue = WithdrawalQueue::new();
        staking.transfer_shares(account(1), escrow(), 600).unwrap();
        staking.transfer_shares(account(2), escrow(), 400).unwrap();
        queue.push(WithdrawalRequest { account: account(1), shares: 600 });
        queue.push(WithdrawalRequest { account: account(2), shares: 400 });

        let fulfilled = queue.perform_upkeep(&mut staking, escrow()).unwrap();
        assert_eq!(
            fulfilled,
            vec![Fulfillment { account: account(1), amount: 300 }]
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_queued_shares(), 700);

        // freeing liquidity lets the rest drain, head first
        strat.set_min_deposits(0);
        let fulfilled = queue.perform_upkeep(&mut staking, escrow()).unwrap();
        assert_eq!(
            fulfilled,
            vec![
                Fulfillment { account: account(1), amount: 300 },
                Fulfillment { account: account(2), amount: 400 },
            ]
        );
        assert!(queue.is_empty());
        assert_eq!(queue.total_queued_shares(), 0);
        assert_eq!(staking.total_staked(), 0);
    }

    #[test]
    fn test_upkeep_idempotent_without_new_liquidity() {
        let strat = ManualStrategy::new(u64::MAX, 1000);
        let mut staking = staking_pool();
        staking
            .add_strategy(
                controller(),
                AccountId::from_low_u64(100),
                Box::new(strat),
                AccountId::ZERO,
                0,
            )
            .unwrap();
        staking.deposit(account(1), 1000).unwrap();
        staking.transfer_shares(account(1), escrow(), 1000).unwrap();

        let mut queue = WithdrawalQueue::new();
        queue.push(WithdrawalRequest { account: account(1), shares: 1000 });

        // everything is locked behind the min-deposit floor
        assert_eq!(queue.perform_upkeep(&mut staking, escrow()).unwrap(), vec![]);
        let total_before = staking.total_staked();
        assert_eq!(queue.perform_upkeep(&mut staking, escrow()).unwrap(), vec![]);
        assert_eq!(staking.total_staked(), total_before);
        assert_eq!(queue.total_queued_shares(), 1000);
    }
}
