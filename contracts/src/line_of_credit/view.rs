//! The read-only face of a vault, as seen by policies.

use serde::{Deserialize, Serialize};
use std::fmt;

use aloc_protocol::{Address, Assets, Rounding, Shares, Timestamp};

use super::error::VaultError;

/// Observable phase of a vault. Derived on every read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultStatus {
    /// Accepting deposits and borrows.
    Open,
    /// Total assets reached the max size. Borrows still work.
    Full,
    /// Past the end time. Only exits and repayments work.
    Closed,
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultStatus::Open => write!(f, "Open"),
            VaultStatus::Full => write!(f, "Full"),
            VaultStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Read-only queries over a vault, with accrual applied up to now.
///
/// Nothing here can mutate the vault.
pub trait VaultView {
    fn address(&self) -> &Address;

    /// Current time according to the vault's clock.
    fn now(&self) -> Timestamp;

    fn end_time(&self) -> Timestamp;

    fn max_size(&self) -> Assets;

    fn status(&self) -> Result<VaultStatus, VaultError>;

    fn total_assets(&self) -> Result<Assets, VaultError>;

    fn liquid_assets(&self) -> Result<Assets, VaultError>;

    fn total_supply(&self) -> Shares;

    fn balance_of(&self, owner: &Address) -> Shares;

    /// Shares worth `assets`, rounded as requested. 1:1 while no shares exist.
    fn shares_for_assets(&self, assets: Assets, rounding: Rounding) -> Result<Shares, VaultError>;

    /// Assets worth `shares`, rounded as requested. 1:1 while no shares exist.
    fn assets_for_shares(&self, shares: Shares, rounding: Rounding) -> Result<Assets, VaultError>;
}
