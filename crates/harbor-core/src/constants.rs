//! Protocol-wide constants.

/// Basis point denominator (100% = 10,000 bps)
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

/// Maximum number of registered strategies
pub const MAX_STRATEGIES: usize = 64;

/// Fixed-point scale for the per-share reward index
pub const REWARD_PRECISION: u128 = 1_000_000_000_000;
