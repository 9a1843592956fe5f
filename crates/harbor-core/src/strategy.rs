//! # Strategy Capability Interface
//!
//! A strategy is a pluggable yield source. The ledger only ever sees this
//! narrow interface: move principal in or out, report balances and capacity.
//! Yield and slashing show up as drift between `total_deposits` and the
//! registry's last snapshot, never as an explicit callback.

use crate::errors::{CoreError, CoreResult};
use std::sync::{Arc, Mutex};

/// Capability interface every yield source must expose.
pub trait Strategy: Send {
    /// Place `amount` of principal into the strategy.
    fn deposit(&mut self, amount: u64) -> CoreResult<()>;

    /// Pull `amount` of principal back out of the strategy.
    fn withdraw(&mut self, amount: u64) -> CoreResult<()>;

    /// Current principal + accrued yield held by the strategy.
    fn total_deposits(&self) -> u64;

    /// Hard deposit ceiling.
    fn max_deposits(&self) -> u64;

    /// Floor below which withdrawals will not drain the strategy.
    fn min_deposits(&self) -> u64;

    /// Signed balance drift since the given snapshot.
    fn deposit_change(&self, since: u64) -> i128 {
        self.total_deposits() as i128 - since as i128
    }

    /// Remaining deposit capacity.
    fn deposit_room(&self) -> u64 {
        self.max_deposits().saturating_sub(self.total_deposits())
    }

    /// Amount withdrawable without breaching the `min_deposits` floor.
    fn withdrawable(&self) -> u64 {
        self.total_deposits().saturating_sub(self.min_deposits())
    }
}

#[derive(Debug)]
struct ManualState {
    max_deposits: u64,
    min_deposits: u64,
    total_deposits: u64,
}

/// Hold-style strategy whose balance is settled externally.
///
/// Yield (or a slash) is reported by the operator calling
/// [`ManualStrategy::set_total_deposits`]. Clones share state, so a handle
/// kept outside the registry can keep driving a registered strategy; the
/// next rebase picks the drift up as a signed delta. Used by tests and the
/// keeper harness.
#[derive(Debug, Clone)]
pub struct ManualStrategy {
    state: Arc<Mutex<ManualState>>,
}

impl ManualStrategy {
    pub fn new(max_deposits: u64, min_deposits: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                max_deposits,
                min_deposits,
                total_deposits: 0,
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().expect("strategy state poisoned")
    }

    /// Overwrite the reported balance, simulating external yield or loss.
    pub fn set_total_deposits(&self, total: u64) {
        self.state().total_deposits = total;
    }

    pub fn set_max_deposits(&self, max: u64) {
        self.state().max_deposits = max;
    }

    pub fn set_min_deposits(&self, min: u64) {
        self.state().min_deposits = min;
    }
}

impl Strategy for ManualStrategy {
    fn deposit(&mut self, amount: u64) -> CoreResult<()> {
        let mut state = self.state();
        let new_total = state
            .total_deposits
            .checked_add(amount)
            .ok_or(CoreError::MathOverflow)?;
        if new_total > state.max_deposits {
            return Err(CoreError::InvalidAmount);
        }
        state.total_deposits = new_total;
        Ok(())
    }

    fn withdraw(&mut self, amount: u64) -> CoreResult<()> {
        let mut state = self.state();
        if amount > state.total_deposits {
            return Err(CoreError::InsufficientLiquidity);
        }
        state.total_deposits -= amount;
        Ok(())
    }

    fn total_deposits(&self) -> u64 {
        self.state().total_deposits
    }

    fn max_deposits(&self) -> u64 {
        self.state().max_deposits
    }

    fn min_deposits(&self) -> u64 {
        self.state().min_deposits
    }
}
