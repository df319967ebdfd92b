//! # Fixed-Point Money
//!
//! All money in the line of credit is an unsigned 256-bit integer counted in
//! the smallest unit of its token. There are no floats anywhere near the
//! ledger, and there never will be.
//!
//! Every ratio (`a * b / c`) goes through [`mul_div`], which forces the
//! caller to pick a [`Rounding`] direction. The vault always rounds against
//! the party that is acting, so that nobody can farm value out of the pool
//! one truncated wei at a time.

mod amount;
mod u256;

pub use amount::{Assets, BasisPoints, Shares};
pub use u256::U256;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by fixed-point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// An intermediate product or sum did not fit in 256 bits.
    #[error("arithmetic overflow")]
    Overflow,

    /// A subtraction would have gone below zero.
    #[error("arithmetic underflow")]
    Underflow,

    /// A ratio was requested with a zero denominator.
    #[error("division by zero")]
    DivisionByZero,
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// Direction in which a ratio is rounded when it does not divide evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    /// Truncate toward zero.
    Down,
    /// Round toward positive infinity.
    Up,
}

/// Computes `a * b / denominator` with the requested rounding.
///
/// The product is formed in full 256-bit precision before dividing. Values
/// in this crate are token amounts multiplied by basis points and seconds,
/// which stays far below the 256-bit ceiling for any realistic supply, but
/// an overflow is still reported instead of wrapping.
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up => {
            if (product % denominator).is_zero() {
                Ok(quotient)
            } else {
                quotient
                    .checked_add(U256::one())
                    .ok_or(MathError::Overflow)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
