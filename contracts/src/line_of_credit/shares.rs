//! Share balances and allowances.
//!
//! Supply and per-holder balances are updated together on every mint,
//! burn and transfer. Overflow is checked on every operation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use aloc_protocol::{Address, Shares};

use super::error::VaultError;

/// The vault's share table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRegistry {
    balances: HashMap<Address, Shares>,
    allowances: HashMap<Address, HashMap<Address, Shares>>,
    total_supply: Shares,
}

impl ShareRegistry {
    pub fn total_supply(&self) -> Shares {
        self.total_supply
    }

    pub fn balance_of(&self, owner: &Address) -> Shares {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Shares {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Number of addresses holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }

    pub fn mint(&mut self, to: &Address, shares: Shares) -> Result<(), VaultError> {
        let total_supply = self.total_supply.checked_add(shares)?;
        let balance = self.balance_of(to).checked_add(shares)?;
        self.balances.insert(to.clone(), balance);
        self.total_supply = total_supply;
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, shares: Shares) -> Result<(), VaultError> {
        let balance = self.balance_of(from);
        if balance < shares {
            return Err(VaultError::InsufficientShares {
                balance,
                requested: shares,
            });
        }
        self.balances.insert(from.clone(), balance.checked_sub(shares)?);
        self.total_supply = self.total_supply.checked_sub(shares)?;
        Ok(())
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, shares: Shares) -> Result<(), VaultError> {
        let from_balance = self.balance_of(from);
        if from_balance < shares {
            return Err(VaultError::InsufficientShares {
                balance: from_balance,
                requested: shares,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.balance_of(to).checked_add(shares)?;
        self.balances.insert(from.clone(), from_balance.checked_sub(shares)?);
        self.balances.insert(to.clone(), to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, shares: Shares) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), shares);
    }

    /// Consumes `shares` of `spender`'s allowance over `owner`, or returns
    /// the error built by `on_shortfall`.
    pub fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: Shares,
        on_shortfall: impl FnOnce(Shares, Shares) -> VaultError,
    ) -> Result<(), VaultError> {
        let allowance = self.allowance(owner, spender);
        if allowance < shares {
            return Err(on_shortfall(allowance, shares));
        }
        self.approve(owner, spender, allowance.checked_sub(shares)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn shares(v: u64) -> Shares {
        Shares::from(v)
    }

    #[test]
    fn mint_and_burn_track_supply() {
        let mut reg = ShareRegistry::default();
        reg.mint(&addr("alice"), shares(100)).unwrap();
        reg.mint(&addr("bob"), shares(50)).unwrap();
        reg.burn(&addr("alice"), shares(30)).unwrap();
        assert_eq!(reg.total_supply(), shares(120));
        assert_eq!(reg.balance_of(&addr("alice")), shares(70));
        assert_eq!(reg.holder_count(), 2);
    }

    #[test]
    fn burn_more_than_balance_fails() {
        let mut reg = ShareRegistry::default();
        reg.mint(&addr("alice"), shares(1)).unwrap();
        let err = reg.burn(&addr("alice"), shares(2)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares { .. }));
        assert_eq!(reg.total_supply(), shares(1));
    }

    #[test]
    fn transfer_keeps_supply() {
        let mut reg = ShareRegistry::default();
        reg.mint(&addr("alice"), shares(10)).unwrap();
        reg.transfer(&addr("alice"), &addr("bob"), shares(4)).unwrap();
        assert_eq!(reg.balance_of(&addr("bob")), shares(4));
        assert_eq!(reg.total_supply(), shares(10));
    }

    #[test]
    fn spend_allowance_decrements() {
        let mut reg = ShareRegistry::default();
        reg.approve(&addr("alice"), &addr("bob"), shares(10));
        reg.spend_allowance(&addr("alice"), &addr("bob"), shares(4), |allowance, requested| {
            VaultError::SharesNotApproved { allowance, requested }
        })
        .unwrap();
        assert_eq!(reg.allowance(&addr("alice"), &addr("bob")), shares(6));
    }

    #[test]
    fn spend_allowance_shortfall_uses_callers_error() {
        let mut reg = ShareRegistry::default();
        let err = reg
            .spend_allowance(&addr("alice"), &addr("bob"), shares(1), |allowance, requested| {
                VaultError::SharesNotApproved { allowance, requested }
            })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Caller not approved to burn given amount of shares"
        );
    }
}
