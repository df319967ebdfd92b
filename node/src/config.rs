//! # Vault Configuration
//!
//! The node hosts exactly one vault, described by a JSON document. The file
//! covers everything needed to stand the vault up from nothing: its terms,
//! the asset it lends, the rate curve, the protocol fee, who may lend, and
//! the opening token balances.
//!
//! The configuration only matters on first start. Once a snapshot exists
//! in the data directory, terms and balances come from the snapshot and
//! the file supplies only the policies, which are never persisted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use aloc_contracts::interest_rate::InterestRateCurve;
use aloc_contracts::{LineOfCreditConfig, ProtocolConfigParams};
use aloc_protocol::config::{DEFAULT_ASSET_DECIMALS, SECONDS_PER_YEAR};
use aloc_protocol::{Address, Assets, BasisPoints};

/// File name `init` writes and `run` looks for in the data directory.
pub const CONFIG_FILE_NAME: &str = "vault.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub vault: VaultSection,
    pub asset: AssetSection,
    pub interest_rate: InterestRateCurve,
    pub protocol: ProtocolSection,
    /// Lenders admitted by the deposit policy. `None` admits anyone.
    #[serde(default)]
    pub lenders: Option<Vec<Address>>,
    /// Asset balances minted on first start.
    #[serde(default)]
    pub genesis_balances: BTreeMap<Address, Assets>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSection {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub borrower: Address,
    pub manager: Address,
    pub controller_admin: Address,
    /// Seconds until the vault closes.
    pub duration: u64,
    pub max_size: Assets,
    /// Install the permissive share transfer policy instead of the
    /// blocking default.
    #[serde(default)]
    pub transferable_shares: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSection {
    pub symbol: String,
    pub decimals: u8,
    pub minter: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSection {
    pub admin: Address,
    pub treasury: Address,
    pub fee_rate: BasisPoints,
}

impl NodeConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to encode config")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.vault.duration > 0, "vault duration must be positive");
        anyhow::ensure!(
            self.vault.address != self.vault.borrower,
            "vault address cannot be the borrower"
        );
        Ok(())
    }

    pub fn line_of_credit(&self) -> LineOfCreditConfig {
        LineOfCreditConfig {
            address: self.vault.address.clone(),
            name: self.vault.name.clone(),
            symbol: self.vault.symbol.clone(),
            borrower: self.vault.borrower.clone(),
            manager: self.vault.manager.clone(),
            controller_admin: self.vault.controller_admin.clone(),
            duration: self.vault.duration,
            max_size: self.vault.max_size,
        }
    }

    pub fn protocol_params(&self) -> ProtocolConfigParams {
        ProtocolConfigParams {
            default_admin: self.protocol.admin.clone(),
            protocol_admin: self.protocol.admin.clone(),
            protocol_treasury: self.protocol.treasury.clone(),
            protocol_fee_rate: self.protocol.fee_rate,
        }
    }

    /// A one-year USDC line with a 10M ceiling and two funded lenders.
    pub fn example() -> Result<Self> {
        let usdc = |whole: u64| Assets::from(u128::from(whole) * 1_000_000);
        let addr = |s: &str| Address::new(s).context("invalid example address");
        Ok(NodeConfig {
            vault: VaultSection {
                address: addr("aloc:vault")?,
                name: "Automated Line of Credit".into(),
                symbol: "ALOC".into(),
                borrower: addr("aloc:borrower")?,
                manager: addr("aloc:manager")?,
                controller_admin: addr("aloc:controller-admin")?,
                duration: SECONDS_PER_YEAR,
                max_size: usdc(10_000_000),
                transferable_shares: false,
            },
            asset: AssetSection {
                symbol: "USDC".into(),
                decimals: DEFAULT_ASSET_DECIMALS,
                minter: addr("aloc:minter")?,
            },
            interest_rate: InterestRateCurve {
                min_rate: BasisPoints(200),
                min_threshold: BasisPoints(2_000),
                optimum_rate: BasisPoints(400),
                optimum_threshold: BasisPoints(8_500),
                max_rate: BasisPoints(800),
                max_threshold: BasisPoints(9_500),
            },
            protocol: ProtocolSection {
                admin: addr("aloc:protocol-admin")?,
                treasury: addr("aloc:treasury")?,
                fee_rate: BasisPoints(100),
            },
            lenders: None,
            genesis_balances: BTreeMap::from([
                (addr("aloc:alice")?, usdc(1_000_000)),
                (addr("aloc:bob")?, usdc(1_000_000)),
                (addr("aloc:borrower")?, usdc(100_000)),
            ]),
        })
    }
}
