//! Typed amounts. `Assets` and `Shares` both wrap a [`U256`], but they are
//! different units: one is the underlying token, the other is a claim on the
//! vault. Mixing them up is a bug, so the compiler refuses to.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MathError, U256};
use crate::config::BASIS_PRECISION;

macro_rules! amount_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(U256);

        impl $name {
            /// The zero amount.
            pub const ZERO: Self = Self(U256([0; 4]));

            /// Wraps a raw integer counted in smallest units.
            pub const fn new(raw: U256) -> Self {
                Self(raw)
            }

            /// Returns the raw integer.
            pub const fn raw(self) -> U256 {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
                self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
            }

            pub fn checked_sub(self, other: Self) -> Result<Self, MathError> {
                self.0.checked_sub(other.0).map(Self).ok_or(MathError::Underflow)
            }

            /// Subtraction floored at zero.
            pub fn saturating_sub(self, other: Self) -> Self {
                Self(self.0.saturating_sub(other.0))
            }

            /// Parses a decimal string of smallest units.
            pub fn from_dec_str(s: &str) -> Option<Self> {
                U256::from_dec_str(s).ok().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(U256::from(v))
            }
        }

        impl From<u128> for $name {
            fn from(v: u128) -> Self {
                Self(U256::from(v))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

amount_type! {
    /// An amount of the underlying asset token, in its native decimals.
    Assets
}

amount_type! {
    /// An amount of vault shares, in the vault token's decimals.
    Shares
}

impl Shares {
    /// Reinterprets an asset amount as the same number of share units.
    ///
    /// Only valid where the vault defines a 1:1 rate, i.e. while no shares
    /// exist yet. Everything else must go through the vault's conversions.
    pub const fn from_asset_units(assets: Assets) -> Self {
        Self(assets.0)
    }
}

impl Assets {
    /// The mirror of [`Shares::from_asset_units`].
    pub const fn from_share_units(shares: Shares) -> Self {
        Self(shares.0)
    }
}

// ---------------------------------------------------------------------------
// Basis points
// ---------------------------------------------------------------------------

/// A ratio in hundredths of a percent. `10_000` is 100%.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BasisPoints(pub u32);

impl BasisPoints {
    pub const ZERO: Self = Self(0);

    /// 100%.
    pub const MAX: Self = Self(BASIS_PRECISION);

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn as_u256(self) -> U256 {
        U256::from(self.0)
    }

    /// Whether the value lies within `0..=10_000`.
    pub fn is_valid_ratio(self) -> bool {
        self.0 <= BASIS_PRECISION
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_arithmetic() {
        let a = Assets::from(10u64);
        let b = Assets::from(3u64);
        assert_eq!(a.checked_add(b).unwrap(), Assets::from(13u64));
        assert_eq!(a.checked_sub(b).unwrap(), Assets::from(7u64));
        assert_eq!(b.checked_sub(a), Err(MathError::Underflow));
    }

    #[test]
    fn overflow_is_reported() {
        let max = Shares::new(U256::MAX);
        assert_eq!(max.checked_add(Shares::from(1u64)), Err(MathError::Overflow));
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        assert_eq!(
            Assets::from(3u64).saturating_sub(Assets::from(5u64)),
            Assets::ZERO
        );
    }

    #[test]
    fn identity_conversion_keeps_units() {
        let assets = Assets::from(1_000_000u64);
        assert_eq!(Shares::from_asset_units(assets).raw(), assets.raw());
    }

    #[test]
    fn basis_points_bounds() {
        assert!(BasisPoints(10_000).is_valid_ratio());
        assert!(!BasisPoints(10_001).is_valid_ratio());
        assert_eq!(BasisPoints(250).to_string(), "250bps");
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let json = serde_json::to_string(&Assets::from(5u64)).unwrap();
        assert_eq!(json, "\"5\"");
    }
}
