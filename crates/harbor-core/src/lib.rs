//! # Harbor Core - Staking Ledger Logic
//!
//! This crate contains the accounting core shared between the queueing layer
//! and off-chain tooling. It provides:
//!
//! - The share ledger and rebase engine (`StakingPool`)
//! - Ordered, capacity-aware strategy routing (`StrategyRegistry`)
//! - The strategy capability interface (`Strategy`)
//! - A per-share reward index for secondary reward tokens (`RewardsPool`)
//! - Floor-rounded conversion math and the core error taxonomy
//!
//! All amounts are `u64` base units; conversions go through `math::mul_div`
//! with an explicit floor-rounding policy that never favors the depositor.

pub mod constants;
pub mod errors;
pub mod ledger;
pub mod math;
pub mod registry;
pub mod rewards;
pub mod strategy;
pub mod types;

pub use constants::*;
pub use errors::{CoreError, CoreResult};
pub use ledger::{PoolConfig, RebaseSummary, StakingPool};
pub use registry::{StrategyEntry, StrategyRegistry};
pub use rewards::{RewardsDistributor, RewardsPool};
pub use strategy::{ManualStrategy, Strategy};
pub use types::{AccountId, DepositOutcome, FeeReceiver, PoolStatus};
