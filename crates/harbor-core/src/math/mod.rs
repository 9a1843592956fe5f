//! Conversion and checked-arithmetic helpers.

pub mod safe_math;

pub use safe_math::*;
