//! Keeper configuration: TOML file describing the pool identities, queue
//! thresholds and the simulated strategy set the keeper drives.

use std::fs;

use harbor_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, KeeperResult};

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Pool identities and limits
    pub pool: PoolSection,

    /// Deposit-queue thresholds
    pub queue: QueueSection,

    /// Strategies the keeper registers and simulates
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSection {
    /// Pool admin authority
    #[serde(with = "account_serde")]
    pub controller: AccountId,

    /// Rebase / insurance authority
    #[serde(with = "account_serde")]
    pub rebase_controller: AccountId,

    /// Distribution oracle authority
    #[serde(with = "account_serde")]
    pub oracle: AccountId,

    /// Escrow holding shares minted for queued principal
    #[serde(with = "account_serde")]
    pub deposit_escrow: AccountId,

    /// Escrow holding shares behind queued withdrawals
    #[serde(with = "account_serde")]
    pub withdrawal_escrow: AccountId,

    /// Ceiling on total staked principal
    pub pool_cap: u64,

    /// Maximum unrecovered loss tolerated when reopening a closed pool
    pub reopen_loss_threshold: u64,

    /// Pool-level fee receivers (basis points of positive rebases)
    #[serde(default)]
    pub fee_receivers: Vec<FeeReceiverConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeReceiverConfig {
    #[serde(with = "account_serde")]
    pub account: AccountId,
    pub basis_points: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSection {
    /// Queued total that makes deposit upkeep worthwhile
    pub queued_deposit_threshold: u64,

    /// Smallest batch a queued-deposit placement may move
    pub min_queued_deposit: u64,

    /// Largest batch a queued-deposit placement may move
    pub max_queued_deposit: u64,
}

/// Configuration for one simulated strategy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy name for logging
    pub name: String,

    /// Strategy identity on the ledger
    #[serde(with = "account_serde")]
    pub id: AccountId,

    /// Hard deposit ceiling
    pub max_deposits: u64,

    /// Floor below which withdrawals will not drain the strategy
    pub min_deposits: u64,

    /// Performance fee receiver
    #[serde(with = "account_serde")]
    pub fee_receiver: AccountId,

    /// Performance fee in basis points
    pub fee_basis_points: u16,

    /// Simulated yield per keeper cycle, in basis points of the strategy
    /// balance. Negative values simulate slashing.
    pub yield_bps_per_cycle: i32,
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> KeeperResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: KeeperConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.strategies.is_empty() {
            return Err(KeeperError::InvalidConfig(
                "at least one strategy is required".into(),
            ));
        }
        if self.queue.min_queued_deposit == 0 {
            return Err(KeeperError::InvalidConfig(
                "min_queued_deposit must be greater than 0".into(),
            ));
        }
        if self.queue.max_queued_deposit < self.queue.min_queued_deposit {
            return Err(KeeperError::InvalidConfig(format!(
                "max_queued_deposit {} is below min_queued_deposit {}",
                self.queue.max_queued_deposit, self.queue.min_queued_deposit
            )));
        }
        let total_bps: u64 = self
            .pool
            .fee_receivers
            .iter()
            .map(|f| f.basis_points as u64)
            .chain(self.strategies.iter().map(|s| s.fee_basis_points as u64))
            .sum();
        if total_bps > 10_000 {
            return Err(KeeperError::InvalidConfig(format!(
                "combined fee basis points {} exceed 10000",
                total_bps
            )));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }
        Ok(())
    }
}

impl StrategyConfig {
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(KeeperError::InvalidConfig(
                "strategy name must not be empty".into(),
            ));
        }
        if self.min_deposits > self.max_deposits {
            return Err(KeeperError::InvalidConfig(format!(
                "strategy {}: min_deposits {} exceeds max_deposits {}",
                self.name, self.min_deposits, self.max_deposits
            )));
        }
        if self.yield_bps_per_cycle.unsigned_abs() > 10_000 {
            return Err(KeeperError::InvalidConfig(format!(
                "strategy {}: yield_bps_per_cycle {} outside +/-10000",
                self.name, self.yield_bps_per_cycle
            )));
        }
        Ok(())
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            pool: PoolSection {
                controller: AccountId::from_low_u64(1),
                rebase_controller: AccountId::from_low_u64(2),
                oracle: AccountId::from_low_u64(3),
                deposit_escrow: AccountId::from_low_u64(8),
                withdrawal_escrow: AccountId::from_low_u64(9),
                pool_cap: u64::MAX,
                reopen_loss_threshold: 0,
                fee_receivers: vec![],
            },
            queue: QueueSection {
                queued_deposit_threshold: 1_000_000_000,
                min_queued_deposit: 100_000_000,
                max_queued_deposit: 1_000_000_000_000,
            },
            strategies: vec![],
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> KeeperResult<()> {
    let example = KeeperConfig {
        pool: PoolSection {
            fee_receivers: vec![FeeReceiverConfig {
                account: AccountId::from_low_u64(500),
                basis_points: 2000,
            }],
            ..KeeperConfig::default().pool
        },
        strategies: vec![
            StrategyConfig {
                name: "validator-alpha".to_string(),
                id: AccountId::from_low_u64(100),
                max_deposits: 5_000_000_000_000,
                min_deposits: 0,
                fee_receiver: AccountId::from_low_u64(501),
                fee_basis_points: 1000,
                yield_bps_per_cycle: 5,
            },
            StrategyConfig {
                name: "validator-beta".to_string(),
                id: AccountId::from_low_u64(101),
                max_deposits: 2_000_000_000_000,
                min_deposits: 0,
                fee_receiver: AccountId::from_low_u64(501),
                fee_basis_points: 0,
                yield_bps_per_cycle: 3,
            },
        ],
        ..KeeperConfig::default()
    };
    example.save(path)?;
    Ok(())
}

// Custom serde module for AccountId as a hex string
mod account_serde {
    use harbor_core::AccountId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(account: &AccountId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&account.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<AccountId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim_start_matches("0x");
        if s.len() != 64 {
            return Err(serde::de::Error::custom(format!(
                "account id must be 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(AccountId::new(bytes))
    }
}
