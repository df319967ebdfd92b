//! # Protocol Configuration Contract
//!
//! One `ProtocolConfig` is shared by every vault in a deployment. It owns
//! the protocol fee rate and the treasury that collects it. Vaults hold an
//! `Arc<dyn ProtocolConfigSource>` and read both values each time they
//! materialize accrual, so a fee change reaches every vault at its next
//! update without any of them caching it.
//!
//! Only the default admin may change the configuration, and every setter
//! refuses a no-op change. The fee rate has no upper bound: vaults cap the
//! unpaid fee at their liquidity plus debt.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use aloc_protocol::{Address, BasisPoints};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when updating the protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolConfigError {
    /// The caller does not hold the default admin role.
    #[error("{0} is missing the default admin role")]
    Unauthorized(Address),

    #[error("New fee needs to be different")]
    FeeUnchanged,

    #[error("New protocol treasury address needs to be different")]
    TreasuryUnchanged,

    #[error("New protocol admin address needs to be different")]
    AdminUnchanged,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Read-only view of the protocol configuration, as consumed by vaults.
pub trait ProtocolConfigSource: Send + Sync {
    /// Current protocol fee rate, annualized.
    fn protocol_fee_rate(&self) -> BasisPoints;

    /// Where collected fees are sent.
    fn protocol_treasury(&self) -> Address;
}

/// Events recorded by [`ProtocolConfig`] setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ProtocolConfigEvent {
    ProtocolFeeRateChanged { fee_rate: BasisPoints },
    ProtocolTreasuryChanged { treasury: Address },
    ProtocolAdminChanged { admin: Address },
}

impl ProtocolConfigEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolConfigEvent::ProtocolFeeRateChanged { .. } => "ProtocolFeeRateChanged",
            ProtocolConfigEvent::ProtocolTreasuryChanged { .. } => "ProtocolTreasuryChanged",
            ProtocolConfigEvent::ProtocolAdminChanged { .. } => "ProtocolAdminChanged",
        }
    }
}

/// Persisted configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfigParams {
    pub default_admin: Address,
    pub protocol_admin: Address,
    pub protocol_treasury: Address,
    pub protocol_fee_rate: BasisPoints,
}

#[derive(Debug)]
struct State {
    params: ProtocolConfigParams,
    events: Vec<ProtocolConfigEvent>,
}

/// The protocol-wide configuration contract.
#[derive(Debug)]
pub struct ProtocolConfig {
    state: RwLock<State>,
}

impl ProtocolConfig {
    pub fn new(params: ProtocolConfigParams) -> Self {
        Self {
            state: RwLock::new(State {
                params,
                events: Vec::new(),
            }),
        }
    }

    /// Returns a copy of the current values.
    pub fn params(&self) -> ProtocolConfigParams {
        self.state.read().params.clone()
    }

    pub fn protocol_admin(&self) -> Address {
        self.state.read().params.protocol_admin.clone()
    }

    pub fn default_admin(&self) -> Address {
        self.state.read().params.default_admin.clone()
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&self) -> Vec<ProtocolConfigEvent> {
        std::mem::take(&mut self.state.write().events)
    }

    fn write_authorized(
        &self,
        caller: &Address,
    ) -> Result<parking_lot::RwLockWriteGuard<'_, State>, ProtocolConfigError> {
        let state = self.state.write();
        if &state.params.default_admin != caller {
            return Err(ProtocolConfigError::Unauthorized(caller.clone()));
        }
        Ok(state)
    }

    pub fn set_protocol_fee_rate(
        &self,
        caller: &Address,
        fee_rate: BasisPoints,
    ) -> Result<(), ProtocolConfigError> {
        let mut state = self.write_authorized(caller)?;
        if state.params.protocol_fee_rate == fee_rate {
            return Err(ProtocolConfigError::FeeUnchanged);
        }
        state.params.protocol_fee_rate = fee_rate;
        state
            .events
            .push(ProtocolConfigEvent::ProtocolFeeRateChanged { fee_rate });
        info!(%fee_rate, "protocol fee rate changed");
        Ok(())
    }

    pub fn set_protocol_treasury(
        &self,
        caller: &Address,
        treasury: Address,
    ) -> Result<(), ProtocolConfigError> {
        let mut state = self.write_authorized(caller)?;
        if state.params.protocol_treasury == treasury {
            return Err(ProtocolConfigError::TreasuryUnchanged);
        }
        state.params.protocol_treasury = treasury.clone();
        info!(%treasury, "protocol treasury changed");
        state
            .events
            .push(ProtocolConfigEvent::ProtocolTreasuryChanged { treasury });
        Ok(())
    }

    pub fn set_protocol_admin(
        &self,
        caller: &Address,
        admin: Address,
    ) -> Result<(), ProtocolConfigError> {
        let mut state = self.write_authorized(caller)?;
        if state.params.protocol_admin == admin {
            return Err(ProtocolConfigError::AdminUnchanged);
        }
        state.params.protocol_admin = admin.clone();
        info!(%admin, "protocol admin changed");
        state
            .events
            .push(ProtocolConfigEvent::ProtocolAdminChanged { admin });
        Ok(())
    }
}

impl ProtocolConfigSource for ProtocolConfig {
    fn protocol_fee_rate(&self) -> BasisPoints {
        self.state.read().params.protocol_fee_rate
    }

    fn protocol_treasury(&self) -> Address {
        self.state.read().params.protocol_treasury.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn config() -> ProtocolConfig {
        ProtocolConfig::new(ProtocolConfigParams {
            default_admin: addr("admin"),
            protocol_admin: addr("protocol"),
            protocol_treasury: addr("treasury"),
            protocol_fee_rate: BasisPoints(0),
        })
    }

    #[test]
    fn changes_fee() {
        let config = config();
        config.set_protocol_fee_rate(&addr("admin"), BasisPoints(100)).unwrap();
        assert_eq!(config.protocol_fee_rate(), BasisPoints(100));
        assert_eq!(
            config.take_events(),
            vec![ProtocolConfigEvent::ProtocolFeeRateChanged {
                fee_rate: BasisPoints(100)
            }]
        );
    }

    #[test]
    fn rejects_same_fee() {
        let config = config();
        config.set_protocol_fee_rate(&addr("admin"), BasisPoints(100)).unwrap();
        let err = config
            .set_protocol_fee_rate(&addr("admin"), BasisPoints(100))
            .unwrap_err();
        assert_eq!(err.to_string(), "New fee needs to be different");
    }

    #[test]
    fn only_default_admin_changes_fee() {
        let config = config();
        let err = config
            .set_protocol_fee_rate(&addr("protocol"), BasisPoints(100))
            .unwrap_err();
        assert_eq!(err, ProtocolConfigError::Unauthorized(addr("protocol")));
        assert_eq!(config.protocol_fee_rate(), BasisPoints(0));
    }

    #[test]
    fn accepts_fee_above_100_percent() {
        let config = config();
        config.set_protocol_fee_rate(&addr("admin"), BasisPoints(20_000)).unwrap();
        assert_eq!(config.protocol_fee_rate(), BasisPoints(20_000));
    }

    #[test]
    fn changes_treasury() {
        let config = config();
        config
            .set_protocol_treasury(&addr("admin"), addr("vault-treasury"))
            .unwrap();
        assert_eq!(config.protocol_treasury(), addr("vault-treasury"));
        assert_eq!(
            config.set_protocol_treasury(&addr("admin"), addr("vault-treasury")),
            Err(ProtocolConfigError::TreasuryUnchanged)
        );
    }

    #[test]
    fn changes_protocol_admin() {
        let config = config();
        config.set_protocol_admin(&addr("admin"), addr("ops")).unwrap();
        assert_eq!(config.protocol_admin(), addr("ops"));
        assert_eq!(
            config.set_protocol_admin(&addr("admin"), addr("ops")),
            Err(ProtocolConfigError::AdminUnchanged)
        );
        assert_eq!(config.take_events().len(), 1);
    }
}
