//! Durable vault state.
//!
//! A [`VaultSnapshot`] carries everything needed to rebuild a vault except
//! its collaborators and policies, which are live objects. Policy labels
//! are kept so a restore can tell when it is wiring up something different
//! from what was running before.
//!
//! ## Layout History
//!
//! | Version | Change                                                   |
//! |---------|----------------------------------------------------------|
//! | 1       | terms, ledger, share table                               |
//! | 2       | per-window fee rate in the ledger, policy labels         |
//!
//! A version 1 record upgrades with a zero fee rate for its open window:
//! version 1 charged no fee between materializations, and the next
//! materialization picks up the live rate.

use serde::{Deserialize, Serialize};

use aloc_protocol::storage::{Envelope, SchemaError, VersionedRecord};
use aloc_protocol::{Assets, BasisPoints, Timestamp};

use super::ledger::VaultLedger;
use super::shares::ShareRegistry;
use super::VaultTerms;
use crate::policy::PolicyLabels;

/// Current on-disk layout version of [`VaultSnapshot`].
pub const VAULT_SNAPSHOT_VERSION: u16 = 2;

/// Everything durable about a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub terms: VaultTerms,
    pub ledger: VaultLedger,
    pub shares: ShareRegistry,
    pub policy_labels: PolicyLabels,
}

impl VersionedRecord for VaultSnapshot {
    const RECORD: &'static str = "vault";
    const CURRENT_VERSION: u16 = VAULT_SNAPSHOT_VERSION;

    fn upgrade(envelope: &Envelope) -> Result<Self, SchemaError> {
        match envelope.version {
            1 => {
                let legacy: VaultSnapshotV1 = envelope.payload()?;
                Ok(legacy.into())
            }
            found => Err(SchemaError::UnsupportedVersion {
                record: Self::RECORD,
                found,
                current: Self::CURRENT_VERSION,
            }),
        }
    }
}

// -- Version 1 --------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerV1 {
    deposited_liquidity: Assets,
    borrowed_principal: Assets,
    accrued_interest: Assets,
    unpaid_fee: Assets,
    last_update_time: Timestamp,
    max_size: Assets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultSnapshotV1 {
    terms: VaultTerms,
    ledger: LedgerV1,
    shares: ShareRegistry,
}

impl From<VaultSnapshotV1> for VaultSnapshot {
    fn from(v1: VaultSnapshotV1) -> Self {
        let l = v1.ledger;
        VaultSnapshot {
            terms: v1.terms,
            ledger: VaultLedger {
                deposited_liquidity: l.deposited_liquidity,
                borrowed_principal: l.borrowed_principal,
                accrued_interest: l.accrued_interest,
                unpaid_fee: l.unpaid_fee,
                last_update_time: l.last_update_time,
                last_protocol_fee_rate: BasisPoints::ZERO,
                max_size: l.max_size,
            },
            shares: v1.shares,
            policy_labels: PolicyLabels::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use aloc_protocol::storage::{decode_record, encode_record};
    use aloc_protocol::{Address, Shares};

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn terms() -> VaultTerms {
        VaultTerms {
            address: addr("vault"),
            name: "Line of Credit".into(),
            symbol: "LOC".into(),
            decimals: 6,
            borrower: addr("borrower"),
            manager: addr("manager"),
            controller_admin: addr("admin"),
            start_time: 1_000,
            end_time: 1_000 + 31_536_000,
        }
    }

    fn shares_with_lender() -> ShareRegistry {
        let mut shares = ShareRegistry::default();
        shares.mint(&addr("lender"), Shares::from(500u64)).unwrap();
        shares
    }

    #[test]
    fn current_version_decodes_unchanged() {
        let mut ledger = VaultLedger::new(1_000, Assets::from(10_000u64), BasisPoints(100));
        ledger.deposited_liquidity = Assets::from(500u64);
        let snapshot = VaultSnapshot {
            terms: terms(),
            ledger,
            shares: shares_with_lender(),
            policy_labels: PolicyLabels {
                rate: Some("LinearKinkRatePolicy".into()),
                ..PolicyLabels::default()
            },
        };

        let bytes = encode_record(&snapshot).unwrap();
        let decoded: VaultSnapshot = decode_record(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn version_one_upgrades_with_zero_fee_rate() {
        let legacy = VaultSnapshotV1 {
            terms: terms(),
            ledger: LedgerV1 {
                deposited_liquidity: Assets::from(400u64),
                borrowed_principal: Assets::from(100u64),
                accrued_interest: Assets::from(7u64),
                unpaid_fee: Assets::from(2u64),
                last_update_time: 5_000,
                max_size: Assets::from(10_000u64),
            },
            shares: shares_with_lender(),
        };
        let envelope = Envelope {
            version: 1,
            payload: bincode::serialize(&legacy).unwrap(),
        };
        let bytes = bincode::serialize(&envelope).unwrap();

        let upgraded: VaultSnapshot = decode_record(&bytes).unwrap();
        assert_eq!(upgraded.ledger.borrowed_principal, Assets::from(100u64));
        assert_eq!(upgraded.ledger.accrued_interest, Assets::from(7u64));
        assert_eq!(upgraded.ledger.last_update_time, 5_000);
        assert_eq!(upgraded.ledger.last_protocol_fee_rate, BasisPoints::ZERO);
        assert_eq!(upgraded.policy_labels, PolicyLabels::default());
        assert_eq!(upgraded.shares.balance_of(&addr("lender")), Shares::from(500u64));
    }

    #[test]
    fn future_version_is_rejected() {
        let envelope = Envelope {
            version: VAULT_SNAPSHOT_VERSION + 1,
            payload: Vec::new(),
        };
        let bytes = bincode::serialize(&envelope).unwrap();
        let err = decode_record::<VaultSnapshot>(&bytes).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedVersion { found: 3, .. }));
    }
}
