//! Vault events.
//!
//! Every mutating operation records what moved, for off-chain indexing.
//! Events accumulate in the vault until drained with `take_events`.

use serde::{Deserialize, Serialize};

use aloc_protocol::{Address, Assets, Shares, Timestamp};

use crate::policy::PolicyKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum VaultEvent {
    Deposit {
        sender: Address,
        owner: Address,
        assets: Assets,
        shares: Shares,
    },
    Withdraw {
        sender: Address,
        receiver: Address,
        owner: Address,
        assets: Assets,
        shares: Shares,
    },
    Borrowed {
        amount: Assets,
    },
    Repaid {
        amount: Assets,
    },
    FeePaid {
        treasury: Address,
        amount: Assets,
    },
    SharesTransferred {
        from: Address,
        to: Address,
        shares: Shares,
    },
    Approval {
        owner: Address,
        spender: Address,
        shares: Shares,
    },
    MaxSizeChanged {
        max_size: Assets,
    },
    PolicyChanged {
        kind: PolicyKind,
        /// Label of the new policy, or `None` if the slot was cleared.
        policy: Option<String>,
    },
}

impl VaultEvent {
    /// Short name, for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::Deposit { .. } => "Deposit",
            VaultEvent::Withdraw { .. } => "Withdraw",
            VaultEvent::Borrowed { .. } => "Borrowed",
            VaultEvent::Repaid { .. } => "Repaid",
            VaultEvent::FeePaid { .. } => "FeePaid",
            VaultEvent::SharesTransferred { .. } => "Transfer",
            VaultEvent::Approval { .. } => "Approval",
            VaultEvent::MaxSizeChanged { .. } => "MaxSizeChanged",
            VaultEvent::PolicyChanged { .. } => "PolicyChanged",
        }
    }
}

/// An event stamped with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub event: VaultEvent,
}
