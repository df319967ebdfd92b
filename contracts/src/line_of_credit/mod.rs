//! # Automated Line of Credit
//!
//! A share-based lending vault with exactly one borrower. Lenders deposit
//! a single asset and receive shares; the borrower draws against the pooled
//! liquidity and pays interest at a rate that depends on utilization; the
//! protocol skims an annual fee off the top.
//!
//! ## Operation Anatomy
//!
//! Every mutating call runs the same pipeline:
//!
//! 1. **Validate**: zero amounts, the vault as receiver/owner, the end
//!    time, caller roles.
//! 2. **Consult policy**: the relevant hook prices or vetoes the call.
//! 3. **Stage**: clone the ledger and share table, materialize accrual up
//!    to now, then apply every bookkeeping change to the clone.
//! 4. **Transfer**: pull incoming tokens first, then push outgoing tokens
//!    (payouts, then the fee sweep).
//! 5. **Commit**: swap the staged state in and record events.
//!
//! Anything that fails before step 5 leaves the vault exactly as it was.
//! The only transfer after the incoming pull is an outgoing one backed by
//! the vault's own balance, which the liquidity invariant guarantees.
//!
//! ## Fee Sweep
//!
//! After an operation's own liquidity movement, whatever fee is owed is
//! paid to the treasury, limited by liquidity. Running the sweep last means
//! a deposit into a fully lent-out vault settles the fee out of the fresh
//! liquidity immediately. A fee larger than liquidity stays partly unpaid
//! and is retried on the next call.

mod error;
mod events;
mod ledger;
mod shares;
mod snapshot;
mod view;

pub use error::{ErrorCategory, Role, VaultError};
pub use events::{EventRecord, VaultEvent};
pub use ledger::{Accrual, VaultLedger};
pub use shares::ShareRegistry;
pub use snapshot::{VaultSnapshot, VAULT_SNAPSHOT_VERSION};
pub use view::{VaultStatus, VaultView};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use aloc_protocol::{
    mul_div, Address, AssetToken, Assets, BasisPoints, Clock, MathError, Rounding, Shares,
    Timestamp,
};

use crate::policy::{
    same_policy, DepositPolicy, Policies, PolicyKind, RatePolicy, TransferPolicy, WithdrawPolicy,
};
use crate::protocol_config::ProtocolConfigSource;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parameters for a new vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOfCreditConfig {
    /// Address the vault custodies assets under.
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub borrower: Address,
    pub manager: Address,
    pub controller_admin: Address,
    /// Seconds from creation until the vault closes.
    pub duration: u64,
    pub max_size: Assets,
}

/// Immutable terms fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTerms {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    /// Share decimals, equal to the asset's.
    pub decimals: u8,
    pub borrower: Address,
    pub manager: Address,
    pub controller_admin: Address,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// External services a vault talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub asset: Arc<dyn AssetToken>,
    pub protocol: Arc<dyn ProtocolConfigSource>,
    pub clock: Arc<dyn Clock>,
}

/// Ledger and share table, staged and committed together.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VaultState {
    ledger: VaultLedger,
    shares: ShareRegistry,
}

/// A single line-of-credit vault.
pub struct LineOfCredit {
    terms: VaultTerms,
    state: VaultState,
    policies: Policies,
    collaborators: Collaborators,
    events: Vec<EventRecord>,
}

impl std::fmt::Debug for LineOfCredit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineOfCredit")
            .field("terms", &self.terms)
            .field("ledger", &self.state.ledger)
            .field("total_supply", &self.state.shares.total_supply())
            .field("policies", &self.policies)
            .finish()
    }
}

impl LineOfCredit {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Creates a vault that closes `config.duration` seconds from now.
    pub fn new(
        config: LineOfCreditConfig,
        policies: Policies,
        collaborators: Collaborators,
    ) -> Result<Self, VaultError> {
        if config.duration == 0 {
            return Err(VaultError::ZeroDuration);
        }
        let now = collaborators.clock.now();
        let end_time = now
            .checked_add(config.duration)
            .ok_or(MathError::Overflow)?;
        let terms = VaultTerms {
            address: config.address,
            name: config.name,
            symbol: config.symbol,
            decimals: collaborators.asset.decimals(),
            borrower: config.borrower,
            manager: config.manager,
            controller_admin: config.controller_admin,
            start_time: now,
            end_time,
        };
        let ledger = VaultLedger::new(
            now,
            config.max_size,
            collaborators.protocol.protocol_fee_rate(),
        );
        info!(
            vault = %terms.address,
            borrower = %terms.borrower,
            end_time,
            max_size = %ledger.max_size,
            "line of credit created"
        );
        Ok(Self {
            terms,
            state: VaultState {
                ledger,
                shares: ShareRegistry::default(),
            },
            policies,
            collaborators,
            events: Vec::new(),
        })
    }

    /// Rebuilds a vault from a snapshot. Policies are not persisted and
    /// must be supplied again; a label mismatch is logged, not rejected.
    pub fn restore(
        snapshot: VaultSnapshot,
        policies: Policies,
        collaborators: Collaborators,
    ) -> Self {
        let labels = policies.labels();
        if labels != snapshot.policy_labels {
            warn!(
                vault = %snapshot.terms.address,
                persisted = ?snapshot.policy_labels,
                supplied = ?labels,
                "restored vault with different policies"
            );
        }
        Self {
            terms: snapshot.terms,
            state: VaultState {
                ledger: snapshot.ledger,
                shares: snapshot.shares,
            },
            policies,
            collaborators,
            events: Vec::new(),
        }
    }

    /// Captures the durable state.
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            terms: self.terms.clone(),
            ledger: self.state.ledger.clone(),
            shares: self.state.shares.clone(),
            policy_labels: self.policies.labels(),
        }
    }

    /// Rolls the durable state back to `snapshot` and drops any events
    /// not yet taken. Installed policies are kept.
    pub fn revert_to(&mut self, snapshot: VaultSnapshot) {
        self.terms = snapshot.terms;
        self.state = VaultState {
            ledger: snapshot.ledger,
            shares: snapshot.shares,
        };
        self.events.clear();
        debug!(vault = %self.terms.address, "vault reverted to snapshot");
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposits `assets` from `caller` and mints shares to `receiver`.
    pub fn deposit(
        &mut self,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares, VaultError> {
        let result = self.try_deposit(caller, assets, receiver);
        self.logged("deposit", result)
    }

    fn try_deposit(
        &mut self,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares, VaultError> {
        let now = self.now();
        self.ensure_not_vault_receiver(receiver)?;
        if assets.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.ensure_before_end(now)?;
        let policy = self.deposit_policy()?;
        let shares = policy.on_deposit(&*self, caller, assets, receiver)?;
        if shares.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.execute_deposit(now, caller, receiver, assets, shares)?;
        Ok(shares)
    }

    /// Mints exactly `shares` to `receiver`, charging `caller` whatever
    /// the deposit policy prices them at.
    pub fn mint(
        &mut self,
        caller: &Address,
        shares: Shares,
        receiver: &Address,
    ) -> Result<Assets, VaultError> {
        let result = self.try_mint(caller, shares, receiver);
        self.logged("mint", result)
    }

    fn try_mint(
        &mut self,
        caller: &Address,
        shares: Shares,
        receiver: &Address,
    ) -> Result<Assets, VaultError> {
        let now = self.now();
        self.ensure_not_vault_receiver(receiver)?;
        if shares.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.ensure_before_end(now)?;
        let policy = self.deposit_policy()?;
        let assets = policy.on_mint(&*self, caller, shares, receiver)?;
        if assets.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.execute_deposit(now, caller, receiver, assets, shares)?;
        Ok(assets)
    }

    fn execute_deposit(
        &mut self,
        now: Timestamp,
        caller: &Address,
        receiver: &Address,
        assets: Assets,
        shares: Shares,
    ) -> Result<(), VaultError> {
        let mut next = self.stage(now)?;
        let resulting = next.ledger.total_assets()?.checked_add(assets)?;
        if resulting > next.ledger.max_size {
            return Err(VaultError::MaxSizeExceeded {
                max_size: next.ledger.max_size,
                resulting,
            });
        }
        next.ledger.deposited_liquidity = next.ledger.deposited_liquidity.checked_add(assets)?;
        next.shares.mint(receiver, shares)?;
        let fee = next.ledger.take_fee_payment()?;

        let vault = &self.terms.address;
        self.collaborators
            .asset
            .transfer_from(vault, caller, vault, assets)?;
        let mut events = vec![VaultEvent::Deposit {
            sender: caller.clone(),
            owner: receiver.clone(),
            assets,
            shares,
        }];
        self.pay_fee(fee, &mut events)?;
        self.commit(now, next, events);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Withdrawals
    // -----------------------------------------------------------------------

    /// Withdraws exactly `assets` to `receiver`, burning `owner`'s shares.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Shares, VaultError> {
        let result = self.try_withdraw(caller, assets, receiver, owner);
        self.logged("withdraw", result)
    }

    fn try_withdraw(
        &mut self,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Shares, VaultError> {
        let now = self.now();
        self.ensure_not_vault_receiver(receiver)?;
        self.ensure_not_vault_owner(owner)?;
        if assets.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        let policy = self.withdraw_policy()?;
        let shares = policy.on_withdraw(&*self, caller, assets, receiver, owner)?;
        if shares.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.execute_withdraw(now, caller, receiver, owner, assets, shares)?;
        Ok(shares)
    }

    /// Burns exactly `shares` of `owner`'s and pays the assets to `receiver`.
    pub fn redeem(
        &mut self,
        caller: &Address,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Assets, VaultError> {
        let result = self.try_redeem(caller, shares, receiver, owner);
        self.logged("redeem", result)
    }

    fn try_redeem(
        &mut self,
        caller: &Address,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Assets, VaultError> {
        let now = self.now();
        self.ensure_not_vault_receiver(receiver)?;
        self.ensure_not_vault_owner(owner)?;
        if shares.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        let policy = self.withdraw_policy()?;
        let assets = policy.on_redeem(&*self, caller, shares, receiver, owner)?;
        if assets.is_zero() {
            return Err(VaultError::OperationNotAllowed);
        }
        self.execute_withdraw(now, caller, receiver, owner, assets, shares)?;
        Ok(assets)
    }

    fn execute_withdraw(
        &mut self,
        now: Timestamp,
        caller: &Address,
        receiver: &Address,
        owner: &Address,
        assets: Assets,
        shares: Shares,
    ) -> Result<(), VaultError> {
        let mut next = self.stage(now)?;
        let available = next.ledger.liquid_assets();
        if assets > available {
            return Err(VaultError::InsufficientLiquidity {
                available,
                requested: assets,
            });
        }
        if caller != owner {
            next.shares
                .spend_allowance(owner, caller, shares, |allowance, requested| {
                    VaultError::SharesNotApproved {
                        allowance,
                        requested,
                    }
                })?;
        }
        next.shares.burn(owner, shares)?;
        next.ledger.deposited_liquidity = next.ledger.deposited_liquidity.checked_sub(assets)?;
        let fee = next.ledger.take_fee_payment()?;

        self.collaborators
            .asset
            .transfer(&self.terms.address, receiver, assets)?;
        let mut events = vec![VaultEvent::Withdraw {
            sender: caller.clone(),
            receiver: receiver.clone(),
            owner: owner.clone(),
            assets,
            shares,
        }];
        self.pay_fee(fee, &mut events)?;
        self.commit(now, next, events);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Borrowing
    // -----------------------------------------------------------------------

    /// Draws `amount` of liquidity to the borrower.
    pub fn borrow(&mut self, caller: &Address, amount: Assets) -> Result<(), VaultError> {
        let result = self.try_borrow(caller, amount);
        self.logged("borrow", result)
    }

    fn try_borrow(&mut self, caller: &Address, amount: Assets) -> Result<(), VaultError> {
        let now = self.now();
        self.ensure_borrower(caller)?;
        if amount.is_zero() {
            return Err(VaultError::ZeroBorrow);
        }
        self.ensure_before_end(now)?;

        let mut next = self.stage(now)?;
        let available = next.ledger.liquid_assets();
        if amount > available {
            return Err(VaultError::BorrowExceedsLiquidity {
                available,
                requested: amount,
            });
        }
        next.ledger.apply_borrow(amount)?;
        let fee = next.ledger.take_fee_payment()?;

        self.collaborators
            .asset
            .transfer(&self.terms.address, &self.terms.borrower, amount)?;
        let mut events = vec![VaultEvent::Borrowed { amount }];
        self.pay_fee(fee, &mut events)?;
        self.commit(now, next, events);
        Ok(())
    }

    /// Repays `amount`, interest first. Allowed after the end time.
    pub fn repay(&mut self, caller: &Address, amount: Assets) -> Result<(), VaultError> {
        let result = self.try_repay(caller, amount);
        self.logged("repay", result)
    }

    fn try_repay(&mut self, caller: &Address, amount: Assets) -> Result<(), VaultError> {
        let now = self.now();
        self.ensure_borrower(caller)?;
        if amount.is_zero() {
            return Err(VaultError::ZeroRepayment);
        }
        let next = self.stage(now)?;
        let debt = next.ledger.total_debt()?;
        if amount > debt {
            return Err(VaultError::RepaymentExceedsDebt {
                debt,
                requested: amount,
            });
        }
        self.execute_repay(now, next, amount)
    }

    /// Repays the whole debt as of now. Returns the amount repaid.
    pub fn repay_in_full(&mut self, caller: &Address) -> Result<Assets, VaultError> {
        let result = self.try_repay_in_full(caller);
        self.logged("repay_in_full", result)
    }

    fn try_repay_in_full(&mut self, caller: &Address) -> Result<Assets, VaultError> {
        let now = self.now();
        self.ensure_borrower(caller)?;
        let next = self.stage(now)?;
        let debt = next.ledger.total_debt()?;
        if debt.is_zero() {
            return Err(VaultError::ZeroRepayment);
        }
        self.execute_repay(now, next, debt)?;
        Ok(debt)
    }

    fn execute_repay(
        &mut self,
        now: Timestamp,
        mut next: VaultState,
        amount: Assets,
    ) -> Result<(), VaultError> {
        next.ledger.apply_repayment(amount)?;
        let fee = next.ledger.take_fee_payment()?;

        let vault = &self.terms.address;
        self.collaborators
            .asset
            .transfer_from(vault, &self.terms.borrower, vault, amount)?;
        let mut events = vec![VaultEvent::Repaid { amount }];
        self.pay_fee(fee, &mut events)?;
        self.commit(now, next, events);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fees
    // -----------------------------------------------------------------------

    /// Materializes accrual and pays whatever fee liquidity allows.
    /// Anyone may call it. Returns the amount paid.
    pub fn update_and_pay_fee(&mut self) -> Result<Assets, VaultError> {
        let result = self.materialize();
        self.logged("update_and_pay_fee", result)
    }

    fn materialize(&mut self) -> Result<Assets, VaultError> {
        let now = self.now();
        let mut next = self.stage(now)?;
        let fee = next.ledger.take_fee_payment()?;
        let mut events = Vec::new();
        self.pay_fee(fee, &mut events)?;
        self.commit(now, next, events);
        Ok(fee)
    }

    // -----------------------------------------------------------------------
    // Share transfers
    // -----------------------------------------------------------------------

    /// Sets `spender`'s allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: &Address, spender: &Address, shares: Shares) {
        let now = self.now();
        self.state.shares.approve(owner, spender, shares);
        self.record(
            now,
            VaultEvent::Approval {
                owner: owner.clone(),
                spender: spender.clone(),
                shares,
            },
        );
    }

    /// Moves `caller`'s shares to `to`, if the transfer policy permits.
    pub fn transfer(&mut self, caller: &Address, to: &Address, shares: Shares) -> Result<(), VaultError> {
        let result = self.move_shares(caller, caller, to, shares);
        self.logged("transfer", result)
    }

    /// Moves `from`'s shares to `to` using `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        shares: Shares,
    ) -> Result<(), VaultError> {
        let result = self.move_shares(caller, from, to, shares);
        self.logged("transfer_from", result)
    }

    fn move_shares(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        shares: Shares,
    ) -> Result<(), VaultError> {
        let now = self.now();
        let policy = self.transfer_policy()?;
        if !policy.can_transfer(&*self, from, to, shares) {
            return Err(VaultError::TransferNotPermitted);
        }
        let mut registry = self.state.shares.clone();
        if caller != from {
            registry.spend_allowance(from, caller, shares, |allowance, requested| {
                VaultError::InsufficientShareAllowance {
                    allowance,
                    requested,
                }
            })?;
        }
        registry.transfer(from, to, shares)?;
        self.state.shares = registry;
        self.record(
            now,
            VaultEvent::SharesTransferred {
                from: from.clone(),
                to: to.clone(),
                shares,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Changes the ceiling on total assets. Manager only.
    pub fn set_max_size(&mut self, caller: &Address, max_size: Assets) -> Result<(), VaultError> {
        self.ensure_role(caller, Role::Manager)?;
        if self.state.ledger.max_size == max_size {
            return Err(VaultError::MaxSizeUnchanged);
        }
        let now = self.now();
        self.state.ledger.max_size = max_size;
        self.record(now, VaultEvent::MaxSizeChanged { max_size });
        Ok(())
    }

    pub fn set_deposit_policy(
        &mut self,
        caller: &Address,
        policy: Option<Arc<dyn DepositPolicy>>,
    ) -> Result<(), VaultError> {
        self.ensure_role(caller, Role::ControllerAdmin)?;
        if same_policy(&self.policies.deposit, &policy) {
            return Err(VaultError::PolicyUnchanged(PolicyKind::Deposit));
        }
        let label = policy.as_ref().map(|p| p.label().to_string());
        self.policies.deposit = policy;
        self.policy_changed(PolicyKind::Deposit, label);
        Ok(())
    }

    pub fn set_withdraw_policy(
        &mut self,
        caller: &Address,
        policy: Option<Arc<dyn WithdrawPolicy>>,
    ) -> Result<(), VaultError> {
        self.ensure_role(caller, Role::ControllerAdmin)?;
        if same_policy(&self.policies.withdraw, &policy) {
            return Err(VaultError::PolicyUnchanged(PolicyKind::Withdraw));
        }
        let label = policy.as_ref().map(|p| p.label().to_string());
        self.policies.withdraw = policy;
        self.policy_changed(PolicyKind::Withdraw, label);
        Ok(())
    }

    pub fn set_transfer_policy(
        &mut self,
        caller: &Address,
        policy: Option<Arc<dyn TransferPolicy>>,
    ) -> Result<(), VaultError> {
        self.ensure_role(caller, Role::ControllerAdmin)?;
        if same_policy(&self.policies.transfer, &policy) {
            return Err(VaultError::PolicyUnchanged(PolicyKind::Transfer));
        }
        let label = policy.as_ref().map(|p| p.label().to_string());
        self.policies.transfer = policy;
        self.policy_changed(PolicyKind::Transfer, label);
        Ok(())
    }

    /// Swaps the rate curve. Interest up to now is materialized at the old
    /// rate first, so the new curve only prices time after the swap.
    pub fn set_rate_policy(
        &mut self,
        caller: &Address,
        policy: Option<Arc<dyn RatePolicy>>,
    ) -> Result<(), VaultError> {
        self.ensure_role(caller, Role::ControllerAdmin)?;
        if same_policy(&self.policies.rate, &policy) {
            return Err(VaultError::PolicyUnchanged(PolicyKind::InterestRate));
        }
        if self.policies.rate.is_some() {
            self.materialize()?;
        }
        let label = policy.as_ref().map(|p| p.label().to_string());
        self.policies.rate = policy;
        self.policy_changed(PolicyKind::InterestRate, label);
        Ok(())
    }

    fn policy_changed(&mut self, kind: PolicyKind, policy: Option<String>) {
        let now = self.now();
        self.record(now, VaultEvent::PolicyChanged { kind, policy });
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn now(&self) -> Timestamp {
        self.collaborators.clock.now()
    }

    pub fn terms(&self) -> &VaultTerms {
        &self.terms
    }

    pub fn address(&self) -> &Address {
        &self.terms.address
    }

    pub fn name(&self) -> &str {
        &self.terms.name
    }

    pub fn symbol(&self) -> &str {
        &self.terms.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.terms.decimals
    }

    pub fn borrower(&self) -> &Address {
        &self.terms.borrower
    }

    pub fn end_time(&self) -> Timestamp {
        self.terms.end_time
    }

    pub fn max_size(&self) -> Assets {
        self.state.ledger.max_size
    }

    /// The ledger as of the last materialization, without pending accrual.
    pub fn ledger(&self) -> &VaultLedger {
        &self.state.ledger
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn asset(&self) -> &Arc<dyn AssetToken> {
        &self.collaborators.asset
    }

    pub fn total_supply(&self) -> Shares {
        self.state.shares.total_supply()
    }

    pub fn balance_of(&self, owner: &Address) -> Shares {
        self.state.shares.balance_of(owner)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Shares {
        self.state.shares.allowance(owner, spender)
    }

    pub fn status(&self) -> Result<VaultStatus, VaultError> {
        if self.now() >= self.terms.end_time {
            return Ok(VaultStatus::Closed);
        }
        if self.total_assets()? >= self.state.ledger.max_size {
            return Ok(VaultStatus::Full);
        }
        Ok(VaultStatus::Open)
    }

    /// Liquidity plus debt minus fees, as of now.
    pub fn total_assets(&self) -> Result<Assets, VaultError> {
        Ok(self.current_ledger()?.total_assets()?)
    }

    /// Principal plus interest, as of now.
    pub fn total_debt(&self) -> Result<Assets, VaultError> {
        Ok(self.current_ledger()?.total_debt()?)
    }

    /// Liquidity that is not owed to the treasury, as of now.
    pub fn liquid_assets(&self) -> Result<Assets, VaultError> {
        Ok(self.current_ledger()?.liquid_assets())
    }

    /// Fee owed as of now, materialized or not.
    pub fn get_fee(&self) -> Result<Assets, VaultError> {
        Ok(self.current_ledger()?.unpaid_fee)
    }

    /// Interest accrued since the last materialization.
    pub fn unincluded_interest(&self) -> Result<Assets, VaultError> {
        let ledger = &self.state.ledger;
        let now = self.now();
        let rate = self.window_rate(ledger, now)?;
        Ok(ledger.accrual(now, rate)?.interest)
    }

    /// Utilization as of the last materialization.
    pub fn utilization(&self) -> Result<BasisPoints, VaultError> {
        Ok(self.state.ledger.utilization()?)
    }

    /// Rate the curve gives at the current utilization.
    pub fn interest_rate(&self) -> Result<BasisPoints, VaultError> {
        let policy = self
            .policies
            .rate
            .as_ref()
            .ok_or(VaultError::PolicyNotConfigured(PolicyKind::InterestRate))?;
        Ok(policy.interest_rate(self.utilization()?))
    }

    pub fn convert_to_shares(&self, assets: Assets) -> Result<Shares, VaultError> {
        self.shares_for_assets(assets, Rounding::Down)
    }

    pub fn convert_to_assets(&self, shares: Shares) -> Result<Assets, VaultError> {
        self.assets_for_shares(shares, Rounding::Down)
    }

    /// Shares a deposit of `assets` would mint now. Fails once closed.
    pub fn preview_deposit(&self, assets: Assets) -> Result<Shares, VaultError> {
        self.ensure_before_end(self.now())?;
        match &self.policies.deposit {
            Some(policy) => policy.preview_deposit(self, assets),
            None => self.shares_for_assets(assets, Rounding::Down),
        }
    }

    /// Assets minting `shares` would cost now. Fails once closed.
    pub fn preview_mint(&self, shares: Shares) -> Result<Assets, VaultError> {
        self.ensure_before_end(self.now())?;
        match &self.policies.deposit {
            Some(policy) => policy.preview_mint(self, shares),
            None => self.assets_for_shares(shares, Rounding::Up),
        }
    }

    /// Shares withdrawing `assets` would burn now.
    pub fn preview_withdraw(&self, assets: Assets) -> Result<Shares, VaultError> {
        match &self.policies.withdraw {
            Some(policy) => policy.preview_withdraw(self, assets),
            None => self.shares_for_assets(assets, Rounding::Up),
        }
    }

    /// Assets redeeming `shares` would pay now.
    pub fn preview_redeem(&self, shares: Shares) -> Result<Assets, VaultError> {
        match &self.policies.withdraw {
            Some(policy) => policy.preview_redeem(self, shares),
            None => self.assets_for_shares(shares, Rounding::Down),
        }
    }

    pub fn max_deposit(&self, receiver: &Address) -> Result<Assets, VaultError> {
        match &self.policies.deposit {
            Some(policy) if self.status()? != VaultStatus::Closed => {
                policy.max_deposit(self, receiver)
            }
            _ => Ok(Assets::ZERO),
        }
    }

    pub fn max_mint(&self, receiver: &Address) -> Result<Shares, VaultError> {
        match &self.policies.deposit {
            Some(policy) if self.status()? != VaultStatus::Closed => {
                policy.max_mint(self, receiver)
            }
            _ => Ok(Shares::ZERO),
        }
    }

    pub fn max_withdraw(&self, owner: &Address) -> Result<Assets, VaultError> {
        match &self.policies.withdraw {
            Some(policy) => policy.max_withdraw(self, owner),
            None => Ok(Assets::ZERO),
        }
    }

    pub fn max_redeem(&self, owner: &Address) -> Result<Shares, VaultError> {
        match &self.policies.withdraw {
            Some(policy) => policy.max_redeem(self, owner),
            None => Ok(Shares::ZERO),
        }
    }

    pub fn shares_for_assets(&self, assets: Assets, rounding: Rounding) -> Result<Shares, VaultError> {
        let supply = self.total_supply();
        if supply.is_zero() {
            return Ok(Shares::from_asset_units(assets));
        }
        let total_assets = self.total_assets()?;
        Ok(Shares::new(mul_div(
            assets.raw(),
            supply.raw(),
            total_assets.raw(),
            rounding,
        )?))
    }

    pub fn assets_for_shares(&self, shares: Shares, rounding: Rounding) -> Result<Assets, VaultError> {
        let supply = self.total_supply();
        if supply.is_zero() {
            return Ok(Assets::from_share_units(shares));
        }
        let total_assets = self.total_assets()?;
        Ok(Assets::new(mul_div(
            shares.raw(),
            total_assets.raw(),
            supply.raw(),
            rounding,
        )?))
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Rate for the window that ends at `now`, evaluated at the utilization
    /// recorded when the window opened. Not needed, and not required to be
    /// configured, when nothing is borrowed or no time has passed.
    fn window_rate(&self, ledger: &VaultLedger, now: Timestamp) -> Result<BasisPoints, VaultError> {
        if !ledger.needs_rate(now) {
            return Ok(BasisPoints::ZERO);
        }
        let policy = self
            .policies
            .rate
            .as_ref()
            .ok_or(VaultError::PolicyNotConfigured(PolicyKind::InterestRate))?;
        Ok(policy.interest_rate(ledger.utilization()?))
    }

    /// The ledger with accrual applied up to now and the fee rate snapshot
    /// refreshed.
    fn current_ledger(&self) -> Result<VaultLedger, VaultError> {
        let now = self.now();
        let mut ledger = self.state.ledger.clone();
        let rate = self.window_rate(&ledger, now)?;
        let accrual = ledger.accrual(now, rate)?;
        ledger.apply_accrual(
            &accrual,
            now,
            self.collaborators.protocol.protocol_fee_rate(),
        )?;
        Ok(ledger)
    }

    /// A working copy of the state, with accrual materialized at `now`.
    fn stage(&self, now: Timestamp) -> Result<VaultState, VaultError> {
        let ledger = self.current_ledger()?;
        debug!(
            vault = %self.terms.address,
            now,
            accrued_interest = %ledger.accrued_interest,
            unpaid_fee = %ledger.unpaid_fee,
            "accrual materialized"
        );
        Ok(VaultState {
            ledger,
            shares: self.state.shares.clone(),
        })
    }

    fn pay_fee(&self, amount: Assets, events: &mut Vec<VaultEvent>) -> Result<(), VaultError> {
        if amount.is_zero() {
            return Ok(());
        }
        let treasury = self.collaborators.protocol.protocol_treasury();
        self.collaborators
            .asset
            .transfer(&self.terms.address, &treasury, amount)?;
        events.push(VaultEvent::FeePaid { treasury, amount });
        Ok(())
    }

    fn commit(&mut self, now: Timestamp, next: VaultState, events: Vec<VaultEvent>) {
        self.state = next;
        for event in events {
            self.record(now, event);
        }
    }

    fn record(&mut self, timestamp: Timestamp, event: VaultEvent) {
        info!(vault = %self.terms.address, event = event.name(), ?event, "vault event");
        self.events.push(EventRecord { timestamp, event });
    }

    fn logged<T>(&self, op: &'static str, result: Result<T, VaultError>) -> Result<T, VaultError> {
        if let Err(err) = &result {
            warn!(
                vault = %self.terms.address,
                op,
                category = err.category().as_str(),
                error = %err,
                "operation rejected"
            );
        }
        result
    }

    fn deposit_policy(&self) -> Result<Arc<dyn DepositPolicy>, VaultError> {
        self.policies
            .deposit
            .clone()
            .ok_or(VaultError::PolicyNotConfigured(PolicyKind::Deposit))
    }

    fn withdraw_policy(&self) -> Result<Arc<dyn WithdrawPolicy>, VaultError> {
        self.policies
            .withdraw
            .clone()
            .ok_or(VaultError::PolicyNotConfigured(PolicyKind::Withdraw))
    }

    fn transfer_policy(&self) -> Result<Arc<dyn TransferPolicy>, VaultError> {
        self.policies
            .transfer
            .clone()
            .ok_or(VaultError::PolicyNotConfigured(PolicyKind::Transfer))
    }

    fn ensure_before_end(&self, now: Timestamp) -> Result<(), VaultError> {
        if now >= self.terms.end_time {
            return Err(VaultError::PortfolioClosed {
                end_time: self.terms.end_time,
                now,
            });
        }
        Ok(())
    }

    fn ensure_not_vault_receiver(&self, receiver: &Address) -> Result<(), VaultError> {
        if receiver == &self.terms.address {
            return Err(VaultError::ReceiverIsVault);
        }
        Ok(())
    }

    fn ensure_not_vault_owner(&self, owner: &Address) -> Result<(), VaultError> {
        if owner == &self.terms.address {
            return Err(VaultError::OwnerIsVault);
        }
        Ok(())
    }

    fn ensure_borrower(&self, caller: &Address) -> Result<(), VaultError> {
        if caller != &self.terms.borrower {
            return Err(VaultError::NotBorrower);
        }
        Ok(())
    }

    fn ensure_role(&self, caller: &Address, role: Role) -> Result<(), VaultError> {
        let holder = match role {
            Role::Manager => &self.terms.manager,
            Role::ControllerAdmin => &self.terms.controller_admin,
            Role::Borrower => &self.terms.borrower,
        };
        if caller != holder {
            return Err(VaultError::Unauthorized {
                caller: caller.clone(),
                role,
            });
        }
        Ok(())
    }
}

impl VaultView for LineOfCredit {
    fn address(&self) -> &Address {
        &self.terms.address
    }

    fn now(&self) -> Timestamp {
        self.collaborators.clock.now()
    }

    fn end_time(&self) -> Timestamp {
        self.terms.end_time
    }

    fn max_size(&self) -> Assets {
        self.state.ledger.max_size
    }

    fn status(&self) -> Result<VaultStatus, VaultError> {
        LineOfCredit::status(self)
    }

    fn total_assets(&self) -> Result<Assets, VaultError> {
        LineOfCredit::total_assets(self)
    }

    fn liquid_assets(&self) -> Result<Assets, VaultError> {
        LineOfCredit::liquid_assets(self)
    }

    fn total_supply(&self) -> Shares {
        self.state.shares.total_supply()
    }

    fn balance_of(&self, owner: &Address) -> Shares {
        self.state.shares.balance_of(owner)
    }

    fn shares_for_assets(&self, assets: Assets, rounding: Rounding) -> Result<Shares, VaultError> {
        LineOfCredit::shares_for_assets(self, assets, rounding)
    }

    fn assets_for_shares(&self, shares: Shares, rounding: Rounding) -> Result<Assets, VaultError> {
        LineOfCredit::assets_for_shares(self, shares, rounding)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
