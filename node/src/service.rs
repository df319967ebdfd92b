//! # Vault Service
//!
//! Owns the hosted vault and everything around it: the asset token, the
//! protocol configuration, the database and the metrics. API handlers
//! never touch the vault directly; they go through [`VaultService::execute`]
//! for mutations and [`VaultService::read`] for queries.
//!
//! The vault sits behind a single mutex, so operations are serialized.
//! After every successful mutation the vault snapshot and the token ledger
//! are written to sled in one transaction. If that write fails the vault and
//! the token are rolled back, so memory never runs ahead of the database.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use aloc_contracts::interest_rate::LinearKinkRatePolicy;
use aloc_contracts::policy::{
    AllowAllLenderVerifier, AllowAllTransferController, BlockedTransferController,
    DepositController, LenderVerifier, Policies, WhitelistLenderVerifier, WithdrawController,
};
use aloc_contracts::protocol_config::ProtocolConfigError;
use aloc_contracts::{
    Collaborators, LineOfCredit, ProtocolConfig, ProtocolConfigParams, VaultError, VaultSnapshot,
};
use aloc_protocol::storage::{AlocDb, DbError};
use aloc_protocol::token::TokenSnapshot;
use aloc_protocol::{Address, AssetToken, Assets, BasisPoints, Clock, InMemoryToken};

use crate::config::NodeConfig;
use crate::metrics::SharedMetrics;

const PROTOCOL_PARAMS_KEY: &str = "protocol_params";

/// Failures surfaced to API callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Protocol(#[from] ProtocolConfigError),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),

    #[error("encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Where the service keeps its durable state.
pub trait VaultStore: Send + Sync {
    fn load_vault(&self, vault: &Address) -> Result<Option<VaultSnapshot>, DbError>;

    fn load_token(&self, symbol: &str) -> Result<Option<TokenSnapshot>, DbError>;

    fn load_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, DbError>;

    /// Writes the vault and its token ledger atomically.
    fn save_vault(
        &self,
        vault: &Address,
        snapshot: &VaultSnapshot,
        token_symbol: &str,
        token: &TokenSnapshot,
    ) -> Result<(), DbError>;

    fn save_metadata(&self, key: &str, value: &[u8]) -> Result<(), DbError>;
}

impl VaultStore for AlocDb {
    fn load_vault(&self, vault: &Address) -> Result<Option<VaultSnapshot>, DbError> {
        self.get_vault(vault)
    }

    fn load_token(&self, symbol: &str) -> Result<Option<TokenSnapshot>, DbError> {
        self.get_token(symbol)
    }

    fn load_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.get_metadata(key)
    }

    fn save_vault(
        &self,
        vault: &Address,
        snapshot: &VaultSnapshot,
        token_symbol: &str,
        token: &TokenSnapshot,
    ) -> Result<(), DbError> {
        self.put_vault(vault, snapshot, token_symbol, token)
    }

    fn save_metadata(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        self.put_metadata(key, value)
    }
}

pub struct VaultService {
    vault: Mutex<LineOfCredit>,
    token: Arc<InMemoryToken>,
    protocol: Arc<ProtocolConfig>,
    store: Arc<dyn VaultStore>,
    metrics: SharedMetrics,
}

impl VaultService {
    /// Restores the vault from `db` if it was persisted before, otherwise
    /// creates it from `config` and mints the genesis balances.
    pub fn open(
        config: &NodeConfig,
        store: Arc<dyn VaultStore>,
        clock: Arc<dyn Clock>,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        let protocol_params = match store.load_metadata(PROTOCOL_PARAMS_KEY)? {
            Some(bytes) => serde_json::from_slice::<ProtocolConfigParams>(&bytes)
                .context("stored protocol parameters are corrupt")?,
            None => config.protocol_params(),
        };
        let protocol = Arc::new(ProtocolConfig::new(protocol_params));
        let policies = build_policies(config)?;

        let stored = store
            .load_vault(&config.vault.address)
            .context("failed to load vault snapshot")?;

        let (vault, token) = match stored {
            Some(snapshot) => {
                let token_snapshot = store
                    .load_token(&config.asset.symbol)?
                    .unwrap_or_default();
                let token = Arc::new(InMemoryToken::from_snapshot(
                    config.asset.symbol.clone(),
                    config.asset.decimals,
                    config.asset.minter.clone(),
                    token_snapshot,
                ));
                let collaborators = collaborators(&token, &protocol, &clock);
                info!(vault = %snapshot.terms.address, "vault restored from database");
                (LineOfCredit::restore(snapshot, policies, collaborators), token)
            }
            None => {
                let token = Arc::new(InMemoryToken::new(
                    config.asset.symbol.clone(),
                    config.asset.decimals,
                    config.asset.minter.clone(),
                ));
                for (holder, amount) in &config.genesis_balances {
                    token
                        .mint(&config.asset.minter, holder, *amount)
                        .with_context(|| format!("failed to mint genesis balance for {holder}"))?;
                }
                let collaborators = collaborators(&token, &protocol, &clock);
                let vault = LineOfCredit::new(config.line_of_credit(), policies, collaborators)
                    .context("failed to create vault")?;
                info!(vault = %config.vault.address, "vault created");
                (vault, token)
            }
        };

        let service = Self {
            vault: Mutex::new(vault),
            token,
            protocol,
            store,
            metrics,
        };
        {
            let vault = service.vault.lock();
            service.persist(&vault)?;
            service.metrics.observe(&vault);
        }
        Ok(service)
    }

    /// Runs a read-only query against the vault.
    pub fn read<T>(&self, f: impl FnOnce(&LineOfCredit) -> T) -> T {
        let vault = self.vault.lock();
        f(&*vault)
    }

    pub fn token(&self) -> &InMemoryToken {
        &self.token
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    /// Runs a mutation, then persists, counts events and refreshes metrics.
    /// A failed write rolls the vault and the token back to where they were
    /// before the mutation.
    pub fn execute<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut LineOfCredit) -> Result<T, VaultError>,
    ) -> Result<T, ServiceError> {
        let mut vault = self.vault.lock();
        let vault_before = vault.snapshot();
        let token_before = self.token.snapshot();
        match f(&mut *vault) {
            Ok(value) => {
                let events = vault.take_events();
                if let Err(err) = self.persist(&vault) {
                    vault.revert_to(vault_before);
                    self.token.restore(token_before);
                    self.count_storage_failure(op);
                    return Err(err.into());
                }
                for record in events {
                    self.metrics
                        .events_total
                        .with_label_values(&[record.event.name()])
                        .inc();
                }
                self.metrics.operations_total.with_label_values(&[op]).inc();
                self.metrics.observe(&vault);
                Ok(value)
            }
            Err(err) => {
                self.metrics
                    .rejected_operations_total
                    .with_label_values(&[op, err.category().as_str()])
                    .inc();
                Err(err.into())
            }
        }
    }

    /// Sets `owner`'s asset allowance for `spender` (the vault when `None`)
    /// and persists the token ledger along with it.
    pub fn approve_asset(
        &self,
        owner: &Address,
        spender: Option<&Address>,
        amount: Assets,
    ) -> Result<(), ServiceError> {
        let vault = self.vault.lock();
        let spender = spender.unwrap_or(vault.address());
        let token_before = self.token.snapshot();
        self.token
            .approve(owner, spender, amount)
            .map_err(VaultError::from)?;
        if let Err(err) = self.persist(&vault) {
            self.token.restore(token_before);
            self.count_storage_failure("approve_asset");
            return Err(err.into());
        }
        self.metrics
            .operations_total
            .with_label_values(&["approve_asset"])
            .inc();
        Ok(())
    }

    /// Changes the protocol fee rate and stores the new parameters.
    pub fn set_protocol_fee_rate(
        &self,
        caller: &Address,
        fee_rate: BasisPoints,
    ) -> Result<(), ServiceError> {
        // Held so the change cannot interleave with a vault operation.
        let vault = self.vault.lock();
        let previous = self.protocol.params().protocol_fee_rate;
        if let Err(err) = self.protocol.set_protocol_fee_rate(caller, fee_rate) {
            let category = match err {
                ProtocolConfigError::Unauthorized(_) => "authorization",
                _ => "input_validation",
            };
            self.metrics
                .rejected_operations_total
                .with_label_values(&["set_protocol_fee_rate", category])
                .inc();
            return Err(err.into());
        }
        let events = self.protocol.take_events();
        let stored = serde_json::to_vec(&self.protocol.params())
            .map_err(ServiceError::from)
            .and_then(|params| {
                self.store
                    .save_metadata(PROTOCOL_PARAMS_KEY, &params)
                    .map_err(ServiceError::from)
            });
        if let Err(err) = stored {
            warn!(error = %err, "failed to store protocol parameters, restoring previous fee rate");
            self.protocol.set_protocol_fee_rate(caller, previous)?;
            self.protocol.take_events();
            self.count_storage_failure("set_protocol_fee_rate");
            return Err(err);
        }
        for event in events {
            self.metrics
                .events_total
                .with_label_values(&[event.name()])
                .inc();
        }
        self.metrics
            .operations_total
            .with_label_values(&["set_protocol_fee_rate"])
            .inc();
        self.metrics.observe(&vault);
        Ok(())
    }

    fn count_storage_failure(&self, op: &str) {
        self.metrics
            .rejected_operations_total
            .with_label_values(&[op, "storage"])
            .inc();
    }

    fn persist(&self, vault: &LineOfCredit) -> Result<(), DbError> {
        let result = self.store.save_vault(
            vault.address(),
            &vault.snapshot(),
            &self.token.symbol(),
            &self.token.snapshot(),
        );
        if let Err(err) = &result {
            warn!(vault = %vault.address(), error = %err, "failed to persist vault");
        }
        result
    }
}

fn collaborators(
    token: &Arc<InMemoryToken>,
    protocol: &Arc<ProtocolConfig>,
    clock: &Arc<dyn Clock>,
) -> Collaborators {
    Collaborators {
        asset: token.clone(),
        protocol: protocol.clone(),
        clock: clock.clone(),
    }
}

fn build_policies(config: &NodeConfig) -> Result<Policies> {
    let verifier: Arc<dyn LenderVerifier> = match &config.lenders {
        Some(lenders) => Arc::new(WhitelistLenderVerifier::with_lenders(
            config.vault.manager.clone(),
            lenders.iter().cloned(),
        )),
        None => Arc::new(AllowAllLenderVerifier),
    };
    let rate = LinearKinkRatePolicy::new(config.interest_rate).context("invalid interest rate curve")?;
    Ok(Policies {
        deposit: Some(Arc::new(DepositController::new(verifier))),
        withdraw: Some(Arc::new(WithdrawController)),
        transfer: if config.vault.transferable_shares {
            Some(Arc::new(AllowAllTransferController))
        } else {
            Some(Arc::new(BlockedTransferController))
        },
        rate: Some(Arc::new(rate)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aloc_protocol::{Assets, ManualClock};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn open(db: Arc<AlocDb>, clock: Arc<ManualClock>) -> VaultService {
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().unwrap());
        VaultService::open(&NodeConfig::example().unwrap(), db, clock, metrics).unwrap()
    }

    /// Delegates to a temporary database but can be told to fail writes.
    struct FlakyStore {
        db: AlocDb,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                db: AlocDb::open_temporary().unwrap(),
                failing: AtomicBool::new(false),
            }
        }

        fn check(&self) -> Result<(), DbError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DbError::Aborted);
            }
            Ok(())
        }
    }

    impl VaultStore for FlakyStore {
        fn load_vault(&self, vault: &Address) -> Result<Option<VaultSnapshot>, DbError> {
            self.db.load_vault(vault)
        }

        fn load_token(&self, symbol: &str) -> Result<Option<TokenSnapshot>, DbError> {
            self.db.load_token(symbol)
        }

        fn load_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
            self.db.load_metadata(key)
        }

        fn save_vault(
            &self,
            vault: &Address,
            snapshot: &VaultSnapshot,
            token_symbol: &str,
            token: &TokenSnapshot,
        ) -> Result<(), DbError> {
            self.check()?;
            self.db.save_vault(vault, snapshot, token_symbol, token)
        }

        fn save_metadata(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
            self.check()?;
            self.db.save_metadata(key, value)
        }
    }

    fn open_flaky() -> (VaultService, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::new());
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().unwrap());
        let service = VaultService::open(
            &NodeConfig::example().unwrap(),
            store.clone(),
            Arc::new(ManualClock::new(1_000)),
            metrics,
        )
        .unwrap();
        (service, store)
    }

    #[test]
    fn failed_write_rolls_back_the_mutation() {
        let (service, store) = open_flaky();
        let (alice, vault) = (addr("aloc:alice"), addr("aloc:vault"));
        let amount = Assets::from(500_000_000u64);
        service.approve_asset(&alice, None, amount).unwrap();
        let vault_before = service.read(|v| v.snapshot());
        let token_before = service.token().snapshot();

        store.failing.store(true, Ordering::SeqCst);
        let err = service
            .execute("deposit", |v| v.deposit(&alice, amount, &alice))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(DbError::Aborted)));
        assert_eq!(service.read(|v| v.snapshot()), vault_before);
        assert_eq!(service.token().snapshot(), token_before);
        assert!(service.token().balance_of(&vault).is_zero());
        let text = service.metrics.encode().unwrap();
        assert!(text.contains("category=\"storage\""));

        store.failing.store(false, Ordering::SeqCst);
        service
            .execute("deposit", |v| v.deposit(&alice, amount, &alice))
            .unwrap();
        assert_eq!(service.token().balance_of(&vault), amount);
        let stored = store.db.load_vault(&vault).unwrap().unwrap();
        assert_eq!(stored, service.read(|v| v.snapshot()));
    }

    #[test]
    fn failed_write_keeps_previous_approval_and_fee_rate() {
        let (service, store) = open_flaky();
        let (alice, vault) = (addr("aloc:alice"), addr("aloc:vault"));
        let admin = addr("aloc:protocol-admin");
        let rate_before = service.protocol().params().protocol_fee_rate;

        store.failing.store(true, Ordering::SeqCst);
        assert!(service
            .approve_asset(&alice, None, Assets::from(7u64))
            .is_err());
        assert!(service.token().allowance(&alice, &vault).is_zero());

        let err = service
            .set_protocol_fee_rate(&admin, BasisPoints(rate_before.0 + 100))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(service.protocol().params().protocol_fee_rate, rate_before);
        assert!(service.protocol().take_events().is_empty());
    }

    #[test]
    fn genesis_balances_are_minted_once() {
        let db = Arc::new(AlocDb::open_temporary().unwrap());
        let clock = Arc::new(ManualClock::new(1_000));
        let service = open(db.clone(), clock.clone());
        let alice = addr("aloc:alice");
        assert_eq!(service.token().balance_of(&alice), Assets::from(1_000_000_000_000u64));

        drop(service);
        let service = open(db, clock);
        assert_eq!(service.token().balance_of(&alice), Assets::from(1_000_000_000_000u64));
    }

    #[test]
    fn mutations_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let (alice, vault) = (addr("aloc:alice"), addr("aloc:vault"));
        {
            let db = Arc::new(AlocDb::open(dir.path()).unwrap());
            let service = open(db, clock.clone());
            let amount = Assets::from(500_000_000u64);
            service.token().approve(&alice, &vault, amount).unwrap();
            service
                .execute("deposit", |v| v.deposit(&alice, amount, &alice))
                .unwrap();
        }
        let db = Arc::new(AlocDb::open(dir.path()).unwrap());
        let service = open(db, clock);
        assert_eq!(
            service.read(|v| v.ledger().deposited_liquidity),
            Assets::from(500_000_000u64)
        );
        assert_eq!(service.token().balance_of(&vault), Assets::from(500_000_000u64));
    }

    #[test]
    fn rejected_operations_are_not_persisted() {
        let db = Arc::new(AlocDb::open_temporary().unwrap());
        let service = open(db, Arc::new(ManualClock::new(1_000)));
        let err = service
            .execute("borrow", |v| v.borrow(&addr("aloc:alice"), Assets::from(1u64)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Vault(VaultError::NotBorrower)));
        let text = service.metrics.encode().unwrap();
        assert!(text.contains("category=\"authorization\""));
    }

    #[test]
    fn fee_rate_change_is_stored() {
        let db = Arc::new(AlocDb::open_temporary().unwrap());
        let clock = Arc::new(ManualClock::new(1_000));
        let service = open(db.clone(), clock.clone());
        service
            .set_protocol_fee_rate(&addr("aloc:protocol-admin"), BasisPoints(250))
            .unwrap();
        drop(service);

        let service = open(db, clock);
        assert_eq!(
            service.protocol().params().protocol_fee_rate,
            BasisPoints(250)
        );
    }
}
