// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ALOC Protocol: Core Library
//!
//! The primitives underneath the Automated Line of Credit: a share-based
//! lending vault where lenders pool a single asset and one borrower draws
//! against it at a utilization-dependent rate.
//!
//! This crate holds everything the vault needs that is not the vault
//! itself. The accounting lives in `aloc-contracts`; the service that
//! hosts it lives in `aloc-node`.
//!
//! ## Architecture
//!
//! - **math**: 256-bit fixed-point money with explicit rounding. No floats, ever.
//! - **address**: Opaque account identifiers.
//! - **clock**: Injectable time, so accrual can be tested without waiting a year.
//! - **token**: The fungible asset interface plus an in-memory ledger.
//! - **storage**: Versioned records on sled.
//! - **config**: Protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. Every ratio names its rounding direction. Rounding favours the vault.
//! 2. Assets and shares are different types. Converting between them is
//!    always explicit.
//! 3. Overflow is an error, never a wrap.
//! 4. If it touches money, it has tests. Plural.

pub mod address;
pub mod clock;
pub mod config;
pub mod math;
pub mod storage;
pub mod token;

pub use address::Address;
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use math::{mul_div, Assets, BasisPoints, MathError, Rounding, Shares, U256};
pub use token::{AssetToken, InMemoryToken, TokenError};
