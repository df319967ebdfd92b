//! # Policy Hooks
//!
//! The vault does the bookkeeping; policies decide who may do what and how
//! much. There are four independent slots:
//!
//! | Slot     | Trait              | Default                        |
//! |----------|--------------------|--------------------------------|
//! | deposit  | [`DepositPolicy`]  | [`DepositController`]          |
//! | withdraw | [`WithdrawPolicy`] | [`WithdrawController`]         |
//! | transfer | [`TransferPolicy`] | [`BlockedTransferController`]  |
//! | rate     | [`RatePolicy`]     | `LinearKinkRatePolicy`         |
//!
//! Each slot holds an `Option<Arc<dyn Trait>>`. An empty slot is not
//! "permissive": it disables the operation outright.
//!
//! Hooks receive the vault as `&dyn VaultView`. That view has no mutating
//! methods, so a hook cannot re-enter the vault in the middle of an
//! operation.
//!
//! A hook vetoes by returning zero from an `on_*` call. The vault turns
//! that into `VaultError::OperationNotAllowed`.

mod deposit;
mod lender;
mod transfer;
mod withdraw;

pub use deposit::DepositController;
pub use lender::{AllowAllLenderVerifier, LenderVerifier, WhitelistLenderVerifier};
pub use transfer::{AllowAllTransferController, BlockedTransferController};
pub use withdraw::WithdrawController;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use aloc_protocol::{Address, Assets, BasisPoints, Rounding, Shares};

use crate::line_of_credit::{VaultError, VaultView};

/// Identifies a policy slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Deposit,
    Withdraw,
    Transfer,
    InterestRate,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Deposit => write!(f, "deposit"),
            PolicyKind::Withdraw => write!(f, "withdraw"),
            PolicyKind::Transfer => write!(f, "transfer"),
            PolicyKind::InterestRate => write!(f, "interest rate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Eligibility and limits for deposits and mints.
pub trait DepositPolicy: Send + Sync {
    /// Largest deposit `receiver` may make right now.
    fn max_deposit(&self, vault: &dyn VaultView, receiver: &Address) -> Result<Assets, VaultError>;

    /// Largest mint `receiver` may make right now.
    fn max_mint(&self, vault: &dyn VaultView, receiver: &Address) -> Result<Shares, VaultError>;

    fn preview_deposit(&self, vault: &dyn VaultView, assets: Assets) -> Result<Shares, VaultError> {
        vault.shares_for_assets(assets, Rounding::Down)
    }

    fn preview_mint(&self, vault: &dyn VaultView, shares: Shares) -> Result<Assets, VaultError> {
        vault.assets_for_shares(shares, Rounding::Up)
    }

    /// Shares to mint for a deposit of `assets`. Zero vetoes the deposit.
    fn on_deposit(
        &self,
        vault: &dyn VaultView,
        sender: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares, VaultError>;

    /// Assets to charge for minting `shares`. Zero vetoes the mint.
    fn on_mint(
        &self,
        vault: &dyn VaultView,
        sender: &Address,
        shares: Shares,
        receiver: &Address,
    ) -> Result<Assets, VaultError>;

    /// Stable name recorded in snapshots.
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Eligibility and limits for withdrawals and redemptions.
pub trait WithdrawPolicy: Send + Sync {
    fn max_withdraw(&self, vault: &dyn VaultView, owner: &Address) -> Result<Assets, VaultError>;

    fn max_redeem(&self, vault: &dyn VaultView, owner: &Address) -> Result<Shares, VaultError>;

    fn preview_withdraw(&self, vault: &dyn VaultView, assets: Assets) -> Result<Shares, VaultError> {
        vault.shares_for_assets(assets, Rounding::Up)
    }

    fn preview_redeem(&self, vault: &dyn VaultView, shares: Shares) -> Result<Assets, VaultError> {
        vault.assets_for_shares(shares, Rounding::Down)
    }

    /// Shares to burn for withdrawing `assets`. Zero vetoes the withdrawal.
    fn on_withdraw(
        &self,
        vault: &dyn VaultView,
        sender: &Address,
        assets: Assets,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Shares, VaultError>;

    /// Assets to pay out for redeeming `shares`. Zero vetoes the redemption.
    fn on_redeem(
        &self,
        vault: &dyn VaultView,
        sender: &Address,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Assets, VaultError>;

    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Whether a share transfer may happen.
pub trait TransferPolicy: Send + Sync {
    fn can_transfer(
        &self,
        vault: &dyn VaultView,
        sender: &Address,
        recipient: &Address,
        shares: Shares,
    ) -> bool;

    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Annual borrow rate as a function of utilization.
pub trait RatePolicy: Send + Sync {
    fn interest_rate(&self, utilization: BasisPoints) -> BasisPoints;

    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// The four policy slots of a vault.
#[derive(Clone, Default)]
pub struct Policies {
    pub deposit: Option<Arc<dyn DepositPolicy>>,
    pub withdraw: Option<Arc<dyn WithdrawPolicy>>,
    pub transfer: Option<Arc<dyn TransferPolicy>>,
    pub rate: Option<Arc<dyn RatePolicy>>,
}

impl Policies {
    /// Labels of the installed policies, for persistence and diagnostics.
    pub fn labels(&self) -> PolicyLabels {
        PolicyLabels {
            deposit: self.deposit.as_ref().map(|p| p.label().to_string()),
            withdraw: self.withdraw.as_ref().map(|p| p.label().to_string()),
            transfer: self.transfer.as_ref().map(|p| p.label().to_string()),
            rate: self.rate.as_ref().map(|p| p.label().to_string()),
        }
    }
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.labels(), f)
    }
}

/// What sat in each slot, by label. Policies themselves are not
/// serializable and are re-injected on restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLabels {
    pub deposit: Option<String>,
    pub withdraw: Option<String>,
    pub transfer: Option<String>,
    pub rate: Option<String>,
}

/// Whether two slot values refer to the same policy instance.
pub(crate) fn same_policy<T: ?Sized>(current: &Option<Arc<T>>, new: &Option<Arc<T>>) -> bool {
    match (current, new) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
