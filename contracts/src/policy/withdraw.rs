//! The default withdraw policy.

use aloc_protocol::{Address, Assets, Rounding, Shares};

use super::WithdrawPolicy;
use crate::line_of_credit::{VaultError, VaultView};

/// Lets any holder exit, bounded by what the vault can actually pay out.
///
/// Limits are the lesser of the holder's claim and the vault's liquid
/// assets, so a fully lent-out vault reports zero until the borrower
/// repays.
#[derive(Debug, Default, Clone, Copy)]
pub struct WithdrawController;

impl WithdrawPolicy for WithdrawController {
    fn max_withdraw(&self, vault: &dyn VaultView, owner: &Address) -> Result<Assets, VaultError> {
        let claim = vault.assets_for_shares(vault.balance_of(owner), Rounding::Down)?;
        Ok(claim.min(vault.liquid_assets()?))
    }

    fn max_redeem(&self, vault: &dyn VaultView, owner: &Address) -> Result<Shares, VaultError> {
        let payable = vault.shares_for_assets(vault.liquid_assets()?, Rounding::Down)?;
        Ok(vault.balance_of(owner).min(payable))
    }

    fn on_withdraw(
        &self,
        vault: &dyn VaultView,
        _sender: &Address,
        assets: Assets,
        _receiver: &Address,
        _owner: &Address,
    ) -> Result<Shares, VaultError> {
        self.preview_withdraw(vault, assets)
    }

    fn on_redeem(
        &self,
        vault: &dyn VaultView,
        _sender: &Address,
        shares: Shares,
        _receiver: &Address,
        _owner: &Address,
    ) -> Result<Assets, VaultError> {
        self.preview_redeem(vault, shares)
    }

    fn label(&self) -> &'static str {
        "WithdrawController"
    }
}
