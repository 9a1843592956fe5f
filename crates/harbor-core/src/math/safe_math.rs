//! # Safe Math Operations
//!
//! Overflow-checked arithmetic and floor-rounded conversions. All stake/share
//! conversions funnel through [`mul_div_u64`]; rounding is always explicit
//! and defaults to `Rounding::Down` so that dust accrues to the pool.

use crate::errors::{CoreError, CoreResult};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round down (towards zero)
    Down,
    /// Round up (away from zero)
    Up,
}

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Safe $fn_name with overflow/underflow check
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };

    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        /// Safe division with zero check
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            if b == 0 {
                return Err(CoreError::DivisionByZero);
            }
            Ok(a / b)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, CoreError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, CoreError::MathUnderflow);
safe_arith!(safe_mul_u64, u64, checked_mul, CoreError::MathOverflow);
safe_arith!(div, safe_div_u64, u64);

safe_arith!(safe_add_u128, u128, checked_add, CoreError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, CoreError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, CoreError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

safe_arith!(safe_add_i128, i128, checked_add, CoreError::MathOverflow);
safe_arith!(safe_sub_i128, i128, checked_sub, CoreError::MathUnderflow);

/// `a * b / denominator` with a u128 intermediate, explicit rounding.
pub fn mul_div_u64(a: u64, b: u64, denominator: u64, rounding: Rounding) -> CoreResult<u64> {
    if denominator == 0 {
        return Err(CoreError::DivisionByZero);
    }
    let num = (a as u128) * (b as u128);
    let den = denominator as u128;
    let mut result = num / den;
    if rounding == Rounding::Up && num % den != 0 {
        result += 1;
    }
    u64::try_from(result).map_err(|_| CoreError::MathOverflow)
}

/// Apply basis points to an amount, flooring.
pub fn apply_bps(amount: u64, basis_points: u16) -> CoreResult<u64> {
    const BPS_DENOMINATOR: u64 = 10_000;
    if basis_points as u64 > BPS_DENOMINATOR {
        return Err(CoreError::FeeConfigExceeded);
    }
    mul_div_u64(amount, basis_points as u64, BPS_DENOMINATOR, Rounding::Down)
}

/// Apply a signed delta to an unsigned balance.
pub fn apply_delta_u64(value: u64, delta: i128) -> CoreResult<u64> {
    if delta >= 0 {
        let add = u64::try_from(delta).map_err(|_| CoreError::MathOverflow)?;
        safe_add_u64(value, add)
    } else {
        let sub = u64::try_from(-delta).map_err(|_| CoreError::MathOverflow)?;
        safe_sub_u64(value, sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div_u64(10, 10, 3, Rounding::Down).unwrap(), 33);
        assert_eq!(mul_div_u64(10, 10, 3, Rounding::Up).unwrap(), 34);
        assert_eq!(mul_div_u64(9, 10, 3, Rounding::Up).unwrap(), 30);
        assert_eq!(
            mul_div_u64(1, 1, 0, Rounding::Down),
            Err(CoreError::DivisionByZero)
        );
    }

    #[test]
    fn test_mul_div_no_intermediate_overflow() {
        // u64::MAX * u64::MAX fits the u128 intermediate
        let max = u64::MAX;
        assert_eq!(mul_div_u64(max, max, max, Rounding::Down).unwrap(), max);
    }

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(1200, 1000).unwrap(), 120);
        assert_eq!(apply_bps(1200, 2000).unwrap(), 240);
        // floors
        assert_eq!(apply_bps(999, 10).unwrap(), 0);
        assert_eq!(apply_bps(1, 10_001), Err(CoreError::FeeConfigExceeded));
    }

    #[test]
    fn test_apply_delta() {
        assert_eq!(apply_delta_u64(100, 50).unwrap(), 150);
        assert_eq!(apply_delta_u64(100, -50).unwrap(), 50);
        assert_eq!(apply_delta_u64(100, -101), Err(CoreError::MathUnderflow));
        assert_eq!(
            apply_delta_u64(u64::MAX, 1),
            Err(CoreError::MathOverflow)
        );
    }
}
