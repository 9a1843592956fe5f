//! The keeper service: one `run_cycle` rebases strategy rewards, drains the
//! withdrawal queue, places queued deposits when thresholds allow, and
//! drives a distribution cycle through the in-process oracle.
//!
//! Strategies are simulated `ManualStrategy` handles whose balances drift
//! each cycle according to the configured yield rate, so a standalone keeper
//! run exercises the full rebase and settlement pipeline.

use harbor_core::{ManualStrategy, PoolConfig, StakingPool, Strategy};
use harbor_pool::{DistributionOracle, PriorityPool, QueueConfig, Upkeep};
use rand::Rng;

use crate::config::KeeperConfig;
use crate::error::KeeperResult;

/// What one keeper cycle accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub rebase_net: i128,
    pub fee_shares_minted: u64,
    pub withdrawals_fulfilled: usize,
    pub queued_placed: u64,
    pub distributed: u64,
}

struct SimulatedStrategy {
    name: String,
    handle: ManualStrategy,
    yield_bps_per_cycle: i32,
}

pub struct Keeper {
    config: KeeperConfig,
    pool: PriorityPool,
    oracle: DistributionOracle,
    strategies: Vec<SimulatedStrategy>,
    dry_run: bool,
}

impl Keeper {
    /// Build the pool and register the configured strategies.
    pub fn new(config: KeeperConfig, dry_run: bool) -> KeeperResult<Self> {
        config.validate()?;

        let mut staking = StakingPool::new(PoolConfig {
            controller: config.pool.controller,
            rebase_controller: config.pool.rebase_controller,
            fee_receivers: config
                .pool
                .fee_receivers
                .iter()
                .map(|f| harbor_core::FeeReceiver {
                    account: f.account,
                    basis_points: f.basis_points,
                })
                .collect(),
            pool_cap: config.pool.pool_cap,
            reopen_loss_threshold: config.pool.reopen_loss_threshold,
        })?;

        let mut strategies = Vec::with_capacity(config.strategies.len());
        for strategy_config in &config.strategies {
            let handle =
                ManualStrategy::new(strategy_config.max_deposits, strategy_config.min_deposits);
            staking.add_strategy(
                config.pool.controller,
                strategy_config.id,
                Box::new(handle.clone()),
                strategy_config.fee_receiver,
                strategy_config.fee_basis_points,
            )?;
            log::info!(
                "registered strategy {} (cap={}, fee={}bps)",
                strategy_config.name,
                strategy_config.max_deposits,
                strategy_config.fee_basis_points
            );
            strategies.push(SimulatedStrategy {
                name: strategy_config.name.clone(),
                handle,
                yield_bps_per_cycle: strategy_config.yield_bps_per_cycle,
            });
        }

        let pool = PriorityPool::new(
            staking,
            QueueConfig {
                oracle: config.pool.oracle,
                deposit_escrow: config.pool.deposit_escrow,
                withdrawal_escrow: config.pool.withdrawal_escrow,
                queued_deposit_threshold: config.queue.queued_deposit_threshold,
                min_queued_deposit: config.queue.min_queued_deposit,
                max_queued_deposit: config.queue.max_queued_deposit,
            },
        );
        let oracle = DistributionOracle::new(config.pool.oracle);

        Ok(Self {
            config,
            pool,
            oracle,
            strategies,
            dry_run,
        })
    }

    pub fn pool(&self) -> &PriorityPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut PriorityPool {
        &mut self.pool
    }

    pub fn oracle(&self) -> &DistributionOracle {
        &self.oracle
    }

    /// Drift every simulated strategy balance by its configured per-cycle
    /// yield, with +/-50% jitter so consecutive rebases are never uniform.
    pub fn simulate_yield(&mut self) {
        let mut rng = rand::thread_rng();
        for strategy in &self.strategies {
            let total = strategy.handle.total_deposits();
            if total == 0 || strategy.yield_bps_per_cycle == 0 {
                continue;
            }
            let jitter: i128 = rng.gen_range(50..=150);
            let drift = total as i128 * strategy.yield_bps_per_cycle as i128 * jitter
                / (10_000 * 100);
            let next = (total as i128 + drift).clamp(0, u64::MAX as i128) as u64;
            log::debug!(
                "strategy {}: balance {} -> {} (drift {})",
                strategy.name,
                total,
                next,
                drift
            );
            strategy.handle.set_total_deposits(next);
        }
    }

    /// One full keeper cycle. In dry-run mode the pending rebase delta is
    /// reported but nothing is committed.
    pub fn run_cycle(&mut self) -> KeeperResult<CycleOutcome> {
        let mut outcome = CycleOutcome::default();
        let indexes: Vec<usize> = (0..self.strategies.len()).collect();

        if self.dry_run {
            let deltas = self.pool.staking().registry().deposit_deltas(&indexes)?;
            let net: i128 = deltas.iter().sum();
            log::info!("dry run: pending rebase net change {}", net);
            outcome.rebase_net = net;
            return Ok(outcome);
        }

        // 1. rebase
        let summary = self
            .pool
            .staking_mut()
            .update_strategy_rewards(self.config.pool.rebase_controller, &indexes)?;
        outcome.rebase_net = summary.net_change;
        outcome.fee_shares_minted = summary.fee_shares_minted;

        // 2. withdrawal queue
        let fulfilled = self.pool.withdrawal_upkeep()?;
        for payout in &fulfilled {
            log::info!(
                "withdrawal fulfilled: account={:?} amount={}",
                payout.account,
                payout.amount
            );
        }
        outcome.withdrawals_fulfilled = fulfilled.len();

        // 3. deposit queue
        let (needed, _) = self.pool.check_upkeep(&[]);
        if needed {
            outcome.queued_placed = self.pool.deposit_queued_tokens(
                self.config.queue.min_queued_deposit,
                self.config.queue.max_queued_deposit,
            )?;
        }

        // 4. distribution
        if let Some(report) = self.oracle.run_cycle(&mut self.pool)? {
            outcome.distributed = report.amount_distributed;
        }

        Ok(outcome)
    }

    /// Log pool totals. Cheap enough to run every iteration at debug level.
    pub fn log_status(&self) {
        let staking = self.pool.staking();
        log::info!(
            "pool status: staked={} shares={} idle={} queued={} pending_distribution={} withdrawal_queue={}",
            staking.total_staked(),
            staking.total_shares(),
            staking.idle_liquidity(),
            self.pool.total_queued(),
            self.pool.deposits_since_last_update(),
            self.pool.withdrawal_queue().len()
        );
    }
}
