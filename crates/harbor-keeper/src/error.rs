//! Error types for the keeper service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] harbor_pool::PoolError),

    #[error("Ledger error: {0}")]
    Core(#[from] harbor_core::CoreError),
}

pub type KeeperResult<T> = Result<T, KeeperError>;
