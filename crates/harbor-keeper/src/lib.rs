pub mod config;
pub mod error;
pub mod keeper;

pub use config::{create_example_config, KeeperConfig, PoolSection, QueueSection, StrategyConfig};
pub use error::{KeeperError, KeeperResult};
pub use keeper::{CycleOutcome, Keeper};
