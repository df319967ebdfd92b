//! Lender verifiers: who is allowed to put money into a vault.

use std::collections::HashSet;

use parking_lot::RwLock;
use tracing::info;

use aloc_protocol::Address;

use crate::line_of_credit::{Role, VaultError};

/// Decides whether an address may lend.
pub trait LenderVerifier: Send + Sync {
    fn is_allowed(&self, lender: &Address) -> bool;
}

/// Everybody may lend.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllLenderVerifier;

impl LenderVerifier for AllowAllLenderVerifier {
    fn is_allowed(&self, _lender: &Address) -> bool {
        true
    }
}

/// Only whitelisted addresses may lend. The manager curates the list.
#[derive(Debug)]
pub struct WhitelistLenderVerifier {
    manager: Address,
    allowed: RwLock<HashSet<Address>>,
}

impl WhitelistLenderVerifier {
    pub fn new(manager: Address) -> Self {
        Self {
            manager,
            allowed: RwLock::new(HashSet::new()),
        }
    }

    /// Creates a verifier with an initial whitelist.
    pub fn with_lenders(manager: Address, lenders: impl IntoIterator<Item = Address>) -> Self {
        Self {
            manager,
            allowed: RwLock::new(lenders.into_iter().collect()),
        }
    }

    /// Adds or removes `lender` from the whitelist.
    pub fn set_allowed(
        &self,
        caller: &Address,
        lender: &Address,
        allowed: bool,
    ) -> Result<(), VaultError> {
        if caller != &self.manager {
            return Err(VaultError::Unauthorized {
                caller: caller.clone(),
                role: Role::Manager,
            });
        }
        let mut set = self.allowed.write();
        if allowed {
            set.insert(lender.clone());
        } else {
            set.remove(lender);
        }
        info!(%lender, allowed, "lender whitelist updated");
        Ok(())
    }

    /// Whitelisted addresses in sorted order.
    pub fn lenders(&self) -> Vec<Address> {
        let mut lenders: Vec<_> = self.allowed.read().iter().cloned().collect();
        lenders.sort();
        lenders
    }
}

impl LenderVerifier for WhitelistLenderVerifier {
    fn is_allowed(&self, lender: &Address) -> bool {
        self.allowed.read().contains(lender)
    }
}
