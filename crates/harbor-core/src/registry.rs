//! # Strategy Registry
//!
//! Ordered, capacity-aware routing of principal across strategies. Deposits
//! fill strategies greedily in list order; withdrawals drain them in the
//! same order down to each strategy's `min_deposits` floor.
//!
//! Each entry carries the last observed deposit snapshot. Placements and
//! withdrawals move the snapshot together with the principal, so the drift
//! a rebase observes is yield (or loss) only.

use crate::constants::MAX_STRATEGIES;
use crate::errors::{CoreError, CoreResult};
use crate::strategy::Strategy;
use crate::types::AccountId;

/// A registered strategy plus its routing and fee metadata.
pub struct StrategyEntry {
    pub id: AccountId,
    pub fee_basis_points: u16,
    pub fee_receiver: AccountId,
    pub last_snapshot: u64,
    strategy: Box<dyn Strategy>,
}

impl StrategyEntry {
    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn strategy_mut(&mut self) -> &mut dyn Strategy {
        self.strategy.as_mut()
    }
}

/// Ordered list of strategies with greedy placement.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<StrategyEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StrategyEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&StrategyEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut StrategyEntry> {
        self.entries.get_mut(index)
    }

    pub fn position(&self, id: &AccountId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Append a strategy to the routing order.
    pub fn add_strategy(
        &mut self,
        id: AccountId,
        strategy: Box<dyn Strategy>,
        fee_receiver: AccountId,
        fee_basis_points: u16,
    ) -> CoreResult<()> {
        if self.entries.len() >= MAX_STRATEGIES {
            return Err(CoreError::StrategyLimitReached);
        }
        if self.position(&id).is_some() {
            return Err(CoreError::DuplicateStrategy);
        }
        let last_snapshot = strategy.total_deposits();
        self.entries.push(StrategyEntry {
            id,
            fee_basis_points,
            fee_receiver,
            last_snapshot,
            strategy,
        });
        Ok(())
    }

    /// Remove a strategy; it must report zero outstanding deposits.
    pub fn remove_strategy(&mut self, id: &AccountId) -> CoreResult<()> {
        let index = self.position(id).ok_or(CoreError::StrategyNotFound)?;
        if self.entries[index].strategy.total_deposits() != 0 {
            return Err(CoreError::StrategyNotEmpty);
        }
        self.entries.remove(index);
        Ok(())
    }

    /// Reorder strategies. `order` must be a permutation of `0..len`.
    pub fn reorder_strategies(&mut self, order: &[usize]) -> CoreResult<()> {
        if order.len() != self.entries.len() {
            return Err(CoreError::InvalidStrategyOrder);
        }
        let mut seen = vec![false; self.entries.len()];
        for &index in order {
            if index >= self.entries.len() || seen[index] {
                return Err(CoreError::InvalidStrategyOrder);
            }
            seen[index] = true;
        }
        // order validated as a permutation above
        let mut slots: Vec<Option<StrategyEntry>> =
            self.entries.drain(..).map(Some).collect();
        self.entries = order.iter().filter_map(|&i| slots[i].take()).collect();
        Ok(())
    }

    /// Greedily place principal in routing order; returns the amount placed.
    /// Leftover stays with the caller.
    pub fn place_deposits(&mut self, amount: u64) -> CoreResult<u64> {
        let mut remaining = amount;
        for entry in &mut self.entries {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(entry.strategy.deposit_room());
            if take == 0 {
                continue;
            }
            entry.strategy.deposit(take)?;
            entry.last_snapshot = entry
                .last_snapshot
                .checked_add(take)
                .ok_or(CoreError::MathOverflow)?;
            remaining -= take;
        }
        Ok(amount - remaining)
    }

    /// Withdraw principal in routing order, respecting `min_deposits` floors.
    pub fn withdraw(&mut self, amount: u64) -> CoreResult<()> {
        if self.withdrawable_total() < amount {
            return Err(CoreError::InsufficientLiquidity);
        }
        let mut remaining = amount;
        for entry in &mut self.entries {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(entry.strategy.withdrawable());
            if take == 0 {
                continue;
            }
            entry.strategy.withdraw(take)?;
            entry.last_snapshot = entry
                .last_snapshot
                .checked_sub(take)
                .ok_or(CoreError::MathUnderflow)?;
            remaining -= take;
        }
        Ok(())
    }

    /// Sum of per-strategy remaining capacity.
    pub fn strategy_deposit_room(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.strategy.deposit_room()))
    }

    /// Sum of per-strategy withdrawable amounts.
    pub fn withdrawable_total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.strategy.withdrawable()))
    }

    /// Sum of reported strategy balances.
    pub fn total_deposits(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.strategy.total_deposits()))
    }

    /// Signed drift of each named strategy since its last snapshot.
    ///
    /// Deltas are recomputed from live strategy state on every call; nothing
    /// is cached between transactions.
    pub fn deposit_deltas(&self, indexes: &[usize]) -> CoreResult<Vec<i128>> {
        let mut seen = vec![false; self.entries.len()];
        let mut deltas = Vec::with_capacity(indexes.len());
        for &index in indexes {
            let entry = self.entries.get(index).ok_or(CoreError::StrategyNotFound)?;
            if seen[index] {
                return Err(CoreError::DuplicateStrategy);
            }
            seen[index] = true;
            deltas.push(entry.strategy.deposit_change(entry.last_snapshot));
        }
        Ok(deltas)
    }

    /// Fast-forward snapshots of the named strategies to current balances.
    pub fn commit_snapshots(&mut self, indexes: &[usize]) -> CoreResult<()> {
        for &index in indexes {
            let entry = self
                .entries
                .get_mut(index)
                .ok_or(CoreError::StrategyNotFound)?;
            entry.last_snapshot = entry.strategy.total_deposits();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ManualStrategy;

    fn registry_with(caps: &[(u64, u64)]) -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        for (i, &(max, min)) in caps.iter().enumerate() {
            registry
                .add_strategy(
                    AccountId::from_low_u64(100 + i as u64),
                    Box::new(ManualStrategy::new(max, min)),
                    AccountId::from_low_u64(900 + i as u64),
                    0,
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_greedy_placement_in_order() {
        let mut registry = registry_with(&[(300, 0), (500, 0), (1000, 0)]);
        let placed = registry.place_deposits(600).unwrap();
        assert_eq!(placed, 600);
        assert_eq!(registry.get(0).unwrap().strategy().total_deposits(), 300);
        assert_eq!(registry.get(1).unwrap().strategy().total_deposits(), 300);
        assert_eq!(registry.get(2).unwrap().strategy().total_deposits(), 0);
    }

    #[test]
    fn test_placement_leftover_returned() {
        let mut registry = registry_with(&[(300, 0), (200, 0)]);
        let placed = registry.place_deposits(900).unwrap();
        assert_eq!(placed, 500);
        assert_eq!(registry.strategy_deposit_room(), 0);
    }

    #[test]
    fn test_withdraw_respects_min_deposit_floor() {
        let mut registry = registry_with(&[(1000, 100), (1000, 200)]);
        registry.place_deposits(1200).unwrap();
        // strategy0 = 1000, strategy1 = 200; withdrawable = 900 + 0
        assert_eq!(registry.withdrawable_total(), 900);
        assert_eq!(registry.withdraw(901), Err(CoreError::InsufficientLiquidity));
        registry.withdraw(900).unwrap();
        assert_eq!(registry.get(0).unwrap().strategy().total_deposits(), 100);
        assert_eq!(registry.get(1).unwrap().strategy().total_deposits(), 200);
    }

    #[test]
    fn test_add_remove_checks() {
        let mut registry = registry_with(&[(1000, 0)]);
        let id = AccountId::from_low_u64(100);
        assert_eq!(
            registry.add_strategy(
                id,
                Box::new(ManualStrategy::new(1, 0)),
                AccountId::ZERO,
                0
            ),
            Err(CoreError::DuplicateStrategy)
        );

        registry.place_deposits(10).unwrap();
        assert_eq!(registry.remove_strategy(&id), Err(CoreError::StrategyNotEmpty));
        registry.withdraw(10).unwrap();
        registry.remove_strategy(&id).unwrap();
        assert!(registry.is_empty());
        assert_eq!(
            registry.remove_strategy(&id),
            Err(CoreError::StrategyNotFound)
        );
    }

    #[test]
    fn test_reorder_validation() {
        let mut registry = registry_with(&[(1, 0), (2, 0), (3, 0)]);
        assert_eq!(
            registry.reorder_strategies(&[0, 1]),
            Err(CoreError::InvalidStrategyOrder)
        );
        assert_eq!(
            registry.reorder_strategies(&[0, 1, 1]),
            Err(CoreError::InvalidStrategyOrder)
        );
        assert_eq!(
            registry.reorder_strategies(&[0, 1, 3]),
            Err(CoreError::InvalidStrategyOrder)
        );
        registry.reorder_strategies(&[2, 0, 1]).unwrap();
        assert_eq!(registry.get(0).unwrap().strategy().max_deposits(), 3);
        assert_eq!(registry.get(1).unwrap().strategy().max_deposits(), 1);
    }

    #[test]
    fn test_snapshot_tracks_principal_not_yield() {
        let handle = ManualStrategy::new(1000, 0);
        let mut registry = StrategyRegistry::new();
        registry
            .add_strategy(
                AccountId::from_low_u64(1),
                Box::new(handle.clone()),
                AccountId::ZERO,
                0,
            )
            .unwrap();

        // principal movement does not register as drift
        registry.place_deposits(500).unwrap();
        assert_eq!(registry.deposit_deltas(&[0]).unwrap(), vec![0]);
        registry.withdraw(200).unwrap();
        assert_eq!(registry.deposit_deltas(&[0]).unwrap(), vec![0]);

        // external yield does
        handle.set_total_deposits(370);
        assert_eq!(registry.deposit_deltas(&[0]).unwrap(), vec![70]);
        registry.commit_snapshots(&[0]).unwrap();
        assert_eq!(registry.deposit_deltas(&[0]).unwrap(), vec![0]);

        // as does a slash
        handle.set_total_deposits(300);
        assert_eq!(registry.deposit_deltas(&[0]).unwrap(), vec![-70]);
    }

    #[test]
    fn test_deposit_deltas_duplicate_index() {
        let registry = registry_with(&[(1, 0), (2, 0)]);
        assert_eq!(
            registry.deposit_deltas(&[0, 0]),
            Err(CoreError::DuplicateStrategy)
        );
        assert_eq!(
            registry.deposit_deltas(&[2]),
            Err(CoreError::StrategyNotFound)
        );
    }
}
