//! # Asset Tokens
//!
//! The line of credit custodies exactly one fungible asset. It never
//! touches balances directly: all movement goes through the narrow
//! [`AssetToken`] interface, so the same vault logic runs against the
//! in-memory ledger in [`memory`] or anything else that speaks the
//! standard fungible-token dialect.
//!
//! Every method takes `&self`. Implementations are expected to serialize
//! their own mutations (the in-memory token uses a `RwLock`), because a
//! token is usually shared between a vault, its lenders and its borrower.

pub mod memory;

pub use memory::{InMemoryToken, TokenSnapshot};

use thiserror::Error;

use crate::address::Address;
use crate::math::{Assets, MathError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by token transfers. Any of these aborts the vault
/// operation that triggered the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The sender does not hold enough tokens.
    #[error("transfer amount exceeds balance: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Balance of the sender.
        balance: Assets,
        /// Amount that was requested.
        requested: Assets,
    },

    /// The spender has not been approved for this much.
    #[error("insufficient allowance: allowance {allowance}, requested {requested}")]
    InsufficientAllowance {
        /// Remaining allowance of the spender.
        allowance: Assets,
        /// Amount that was requested.
        requested: Assets,
    },

    /// Only the minter may create supply.
    #[error("unauthorized mint by {0}")]
    UnauthorizedMint(Address),

    #[error(transparent)]
    Math(#[from] MathError),
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// A standard fungible token with balances, allowances and decimals.
pub trait AssetToken: Send + Sync {
    /// Ticker symbol, e.g. `USDC`.
    fn symbol(&self) -> String;

    /// Decimal places of one whole token.
    fn decimals(&self) -> u8;

    fn total_supply(&self) -> Assets;

    fn balance_of(&self, owner: &Address) -> Assets;

    fn allowance(&self, owner: &Address, spender: &Address) -> Assets;

    /// Sets `spender`'s allowance over `owner`'s tokens to exactly `amount`.
    fn approve(&self, owner: &Address, spender: &Address, amount: Assets) -> Result<(), TokenError>;

    /// Moves `amount` from `from` to `to`, acting as `from`.
    fn transfer(&self, from: &Address, to: &Address, amount: Assets) -> Result<(), TokenError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Assets,
    ) -> Result<(), TokenError>;
}
