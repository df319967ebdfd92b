//! Share transfer policies.
//!
//! Shares are a registered claim on a specific vault, not a freely traded
//! token, so the default is to refuse every transfer.

use aloc_protocol::{Address, Shares};

use super::TransferPolicy;
use crate::line_of_credit::VaultView;

/// Refuses every transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockedTransferController;

impl TransferPolicy for BlockedTransferController {
    fn can_transfer(
        &self,
        _vault: &dyn VaultView,
        _sender: &Address,
        _recipient: &Address,
        _shares: Shares,
    ) -> bool {
        false
    }

    fn label(&self) -> &'static str {
        "BlockedTransferController"
    }
}

/// Permits every transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllTransferController;

impl TransferPolicy for AllowAllTransferController {
    fn can_transfer(
        &self,
        _vault: &dyn VaultView,
        _sender: &Address,
        _recipient: &Address,
        _shares: Shares,
    ) -> bool {
        true
    }

    fn label(&self) -> &'static str {
        "AllowAllTransferController"
    }
}
