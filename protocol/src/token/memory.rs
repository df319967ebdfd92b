//! In-memory fungible token.
//!
//! Balances and allowances live in `HashMap`s behind a single `RwLock`, so a
//! transfer is checked and applied under one write guard: either both sides
//! move or neither does. Supply is tracked alongside so it can be audited
//! against the sum of balances.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{AssetToken, TokenError};
use crate::address::Address;
use crate::math::Assets;

/// Serializable state of an [`InMemoryToken`], used for persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub balances: HashMap<Address, Assets>,
    pub allowances: HashMap<Address, HashMap<Address, Assets>>,
    pub total_supply: Assets,
}

/// A token whose entire ledger sits in process memory.
#[derive(Debug)]
pub struct InMemoryToken {
    symbol: String,
    decimals: u8,
    minter: Address,
    state: RwLock<TokenSnapshot>,
}

impl InMemoryToken {
    /// Creates an empty token. Only `minter` may create supply.
    pub fn new(symbol: impl Into<String>, decimals: u8, minter: Address) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            minter,
            state: RwLock::new(TokenSnapshot::default()),
        }
    }

    /// Rebuilds a token from a persisted snapshot.
    pub fn from_snapshot(
        symbol: impl Into<String>,
        decimals: u8,
        minter: Address,
        snapshot: TokenSnapshot,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            minter,
            state: RwLock::new(snapshot),
        }
    }

    pub fn minter(&self) -> &Address {
        &self.minter
    }

    /// Creates `amount` new tokens in `to`'s balance.
    pub fn mint(&self, caller: &Address, to: &Address, amount: Assets) -> Result<(), TokenError> {
        if caller != &self.minter {
            return Err(TokenError::UnauthorizedMint(caller.clone()));
        }
        let mut state = self.state.write();
        let total_supply = state.total_supply.checked_add(amount)?;
        let balance = state.balances.get(to).copied().unwrap_or_default();
        let new_balance = balance.checked_add(amount)?;
        state.balances.insert(to.clone(), new_balance);
        state.total_supply = total_supply;
        trace!(symbol = %self.symbol, %to, %amount, "minted");
        Ok(())
    }

    /// Returns a copy of the full ledger.
    pub fn snapshot(&self) -> TokenSnapshot {
        self.state.read().clone()
    }

    /// Replaces the full ledger with `snapshot`.
    pub fn restore(&self, snapshot: TokenSnapshot) {
        *self.state.write() = snapshot;
        debug!(symbol = %self.symbol, "ledger restored from snapshot");
    }

    fn move_balance(
        state: &mut TokenSnapshot,
        from: &Address,
        to: &Address,
        amount: Assets,
    ) -> Result<(), TokenError> {
        let from_balance = state.balances.get(from).copied().unwrap_or_default();
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = state.balances.get(to).copied().unwrap_or_default();
        let new_to = to_balance.checked_add(amount)?;
        state.balances.insert(from.clone(), from_balance.checked_sub(amount)?);
        state.balances.insert(to.clone(), new_to);
        Ok(())
    }
}

impl AssetToken for InMemoryToken {
    fn symbol(&self) -> String {
        self.symbol.clone()
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn total_supply(&self) -> Assets {
        self.state.read().total_supply
    }

    fn balance_of(&self, owner: &Address) -> Assets {
        self.state
            .read()
            .balances
            .get(owner)
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Assets {
        self.state
            .read()
            .allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: Assets) -> Result<(), TokenError> {
        let mut state = self.state.write();
        state
            .allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Assets) -> Result<(), TokenError> {
        let mut state = self.state.write();
        Self::move_balance(&mut state, from, to, amount)?;
        trace!(symbol = %self.symbol, %from, %to, %amount, "transfer");
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Assets,
    ) -> Result<(), TokenError> {
        let mut state = self.state.write();
        let allowance = state
            .allowances
            .get(from)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                allowance,
                requested: amount,
            });
        }
        Self::move_balance(&mut state, from, to, amount)?;
        let remaining = allowance.checked_sub(amount)?;
        state
            .allowances
            .entry(from.clone())
            .or_default()
            .insert(spender.clone(), remaining);
        trace!(symbol = %self.symbol, %spender, %from, %to, %amount, "transfer_from");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
