//! The default deposit policy.

use std::sync::Arc;

use aloc_protocol::{Address, Assets, Rounding, Shares};

use super::{DepositPolicy, LenderVerifier};
use crate::line_of_credit::{VaultError, VaultStatus, VaultView};

/// Admits deposits from verified lenders up to the vault's max size.
///
/// Limits go to zero once the vault is closed. Eligibility is judged on
/// the receiver of the shares, not the caller: a receiver the verifier
/// rejects gets a zero limit and a veto on every deposit or mint.
#[derive(Clone)]
pub struct DepositController {
    verifier: Arc<dyn LenderVerifier>,
}

impl DepositController {
    pub fn new(verifier: Arc<dyn LenderVerifier>) -> Self {
        Self { verifier }
    }
}

impl DepositPolicy for DepositController {
    fn max_deposit(&self, vault: &dyn VaultView, receiver: &Address) -> Result<Assets, VaultError> {
        if vault.status()? == VaultStatus::Closed || !self.verifier.is_allowed(receiver) {
            return Ok(Assets::ZERO);
        }
        Ok(vault.max_size().saturating_sub(vault.total_assets()?))
    }

    fn max_mint(&self, vault: &dyn VaultView, receiver: &Address) -> Result<Shares, VaultError> {
        let assets = self.max_deposit(vault, receiver)?;
        vault.shares_for_assets(assets, Rounding::Down)
    }

    fn on_deposit(
        &self,
        vault: &dyn VaultView,
        _sender: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares, VaultError> {
        if !self.verifier.is_allowed(receiver) {
            return Ok(Shares::ZERO);
        }
        self.preview_deposit(vault, assets)
    }

    fn on_mint(
        &self,
        vault: &dyn VaultView,
        _sender: &Address,
        shares: Shares,
        receiver: &Address,
    ) -> Result<Assets, VaultError> {
        if !self.verifier.is_allowed(receiver) {
            return Ok(Assets::ZERO);
        }
        self.preview_mint(vault, shares)
    }

    fn label(&self) -> &'static str {
        "DepositController"
    }
}
