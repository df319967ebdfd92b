//! Integration tests for policy hooks and vault administration.
//!
//! Covers lender whitelisting, share transfer gating, swapping and
//! clearing policies, and the interest rate curve as seen through a live
//! vault.

mod common;

use std::sync::Arc;

use aloc_contracts::interest_rate::{CurveError, InterestRateCurve, LinearKinkRatePolicy};
use aloc_contracts::line_of_credit::Role;
use aloc_contracts::policy::{
    AllowAllTransferController, DepositController, DepositPolicy, RatePolicy, TransferPolicy,
    WhitelistLenderVerifier,
};
use aloc_contracts::{PolicyKind, VaultError, VaultEvent};
use aloc_protocol::{BasisPoints, Shares};
use common::*;

fn whitelist_harness() -> (Harness, Arc<WhitelistLenderVerifier>) {
    let verifier = Arc::new(WhitelistLenderVerifier::with_lenders(
        addr("manager"),
        [addr("alice")],
    ));
    let mut policies = default_policies();
    policies.deposit = Some(Arc::new(DepositController::new(verifier.clone())));
    (harness_with(0, policies), verifier)
}

// ---------------------------------------------------------------------------
// Lender Whitelist
// ---------------------------------------------------------------------------

#[test]
fn only_whitelisted_lenders_can_deposit() {
    let (mut h, _) = whitelist_harness();
    h.fund("alice", usdc(100));
    h.fund("mallory", usdc(100));

    h.vault.deposit(&addr("alice"), usdc(100), &addr("alice")).unwrap();
    assert_eq!(
        h.vault
            .deposit(&addr("mallory"), usdc(100), &addr("mallory"))
            .unwrap_err(),
        VaultError::OperationNotAllowed
    );
    assert!(h.vault.max_deposit(&addr("mallory")).unwrap().is_zero());
    assert_eq!(h.balance("mallory"), usdc(100));
}

#[test]
fn eligibility_follows_the_share_receiver() {
    let (mut h, _) = whitelist_harness();
    h.fund("alice", usdc(200));
    h.fund("carol", usdc(100));

    assert_eq!(
        h.vault
            .deposit(&addr("alice"), usdc(100), &addr("mallory"))
            .unwrap_err(),
        VaultError::OperationNotAllowed
    );
    assert_eq!(
        h.vault
            .mint(&addr("alice"), Shares::from(100_000_000u64), &addr("mallory"))
            .unwrap_err(),
        VaultError::OperationNotAllowed
    );
    assert!(h.vault.balance_of(&addr("mallory")).is_zero());
    assert_eq!(h.balance("alice"), usdc(200));

    // An unlisted payer may fund a listed lender's position.
    let shares = h
        .vault
        .deposit(&addr("carol"), usdc(100), &addr("alice"))
        .unwrap();
    assert_eq!(h.vault.balance_of(&addr("alice")), shares);
    assert!(h.balance("carol").is_zero());
}

#[test]
fn manager_can_extend_whitelist() {
    let (mut h, verifier) = whitelist_harness();
    h.fund("bob", usdc(100));

    let err = verifier
        .set_allowed(&addr("bob"), &addr("bob"), true)
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized { role: Role::Manager, .. }));

    verifier.set_allowed(&addr("manager"), &addr("bob"), true).unwrap();
    assert_eq!(h.vault.max_deposit(&addr("bob")).unwrap(), usdc(10_000_000));
    h.vault.mint(&addr("bob"), Shares::from(100_000_000u64), &addr("bob")).unwrap();
    assert_eq!(h.vault.balance_of(&addr("bob")), Shares::from(100_000_000u64));
}

// ---------------------------------------------------------------------------
// Share Transfers
// ---------------------------------------------------------------------------

#[test]
fn shares_are_not_transferable_by_default() {
    let mut h = harness(0);
    h.deposit("alice", usdc(100));
    let err = h
        .vault
        .transfer(&addr("alice"), &addr("bob"), Shares::from(1u64))
        .unwrap_err();
    assert_eq!(err, VaultError::TransferNotPermitted);
    assert_eq!(h.vault.balance_of(&addr("alice")), Shares::from(100_000_000u64));
}

#[test]
fn permissive_transfer_policy_moves_shares() {
    let mut h = harness(0);
    h.deposit("alice", usdc(100));
    let transfer: Arc<dyn TransferPolicy> = Arc::new(AllowAllTransferController);
    h.vault.set_transfer_policy(&addr("admin"), Some(transfer)).unwrap();
    let (alice, bob, carol) = (addr("alice"), addr("bob"), addr("carol"));

    h.vault.transfer(&alice, &bob, Shares::from(40_000_000u64)).unwrap();
    assert_eq!(h.vault.balance_of(&bob), Shares::from(40_000_000u64));

    let err = h
        .vault
        .transfer_from(&carol, &alice, &carol, Shares::from(1u64))
        .unwrap_err();
    assert!(matches!(err, VaultError::InsufficientShareAllowance { .. }));

    h.vault.approve(&alice, &carol, Shares::from(10_000_000u64));
    h.vault
        .transfer_from(&carol, &alice, &carol, Shares::from(10_000_000u64))
        .unwrap();
    assert_eq!(h.vault.balance_of(&alice), Shares::from(50_000_000u64));
    assert!(h.vault.allowance(&alice, &carol).is_zero());
    assert_eq!(h.vault.total_supply(), Shares::from(100_000_000u64));
}

#[test]
fn empty_transfer_slot_disables_transfers() {
    let mut h = harness(0);
    h.deposit("alice", usdc(100));
    h.vault.set_transfer_policy(&addr("admin"), None).unwrap();
    assert_eq!(
        h.vault
            .transfer(&addr("alice"), &addr("bob"), Shares::from(1u64))
            .unwrap_err(),
        VaultError::PolicyNotConfigured(PolicyKind::Transfer)
    );
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn clearing_deposit_policy_blocks_deposits() {
    let mut h = harness(0);
    h.vault.set_deposit_policy(&addr("admin"), None).unwrap();
    h.fund("alice", usdc(1));

    assert!(h.vault.max_deposit(&addr("alice")).unwrap().is_zero());
    assert_eq!(
        h.vault
            .deposit(&addr("alice"), usdc(1), &addr("alice"))
            .unwrap_err(),
        VaultError::PolicyNotConfigured(PolicyKind::Deposit)
    );
    assert_eq!(
        h.vault.set_deposit_policy(&addr("admin"), None).unwrap_err(),
        VaultError::PolicyUnchanged(PolicyKind::Deposit)
    );
}

#[test]
fn clearing_withdraw_policy_blocks_exits() {
    let mut h = harness(0);
    h.deposit("alice", usdc(10));
    h.vault.set_withdraw_policy(&addr("admin"), None).unwrap();
    let alice = addr("alice");

    assert!(h.vault.max_withdraw(&alice).unwrap().is_zero());
    assert!(h.vault.max_redeem(&alice).unwrap().is_zero());
    assert_eq!(
        h.vault.withdraw(&alice, usdc(1), &alice, &alice).unwrap_err(),
        VaultError::PolicyNotConfigured(PolicyKind::Withdraw)
    );
}

#[test]
fn policy_changes_are_recorded() {
    let mut h = harness(0);
    let deposit: Arc<dyn DepositPolicy> = Arc::new(DepositController::new(Arc::new(
        WhitelistLenderVerifier::new(addr("manager")),
    )));
    h.vault.set_deposit_policy(&addr("admin"), Some(deposit)).unwrap();

    let events = h.vault.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].event,
        VaultEvent::PolicyChanged {
            kind: PolicyKind::Deposit,
            policy: Some("DepositController".into()),
        }
    );
}

#[test]
fn max_size_changes_need_manager_and_a_new_value() {
    let mut h = harness(0);
    assert_eq!(
        h.vault
            .set_max_size(&addr("manager"), usdc(10_000_000))
            .unwrap_err(),
        VaultError::MaxSizeUnchanged
    );
    h.vault.set_max_size(&addr("manager"), usdc(5)).unwrap();
    assert_eq!(h.vault.max_size(), usdc(5));
    assert_eq!(
        h.vault.take_events()[0].event,
        VaultEvent::MaxSizeChanged { max_size: usdc(5) }
    );
}

// ---------------------------------------------------------------------------
// Interest Rate Curve
// ---------------------------------------------------------------------------

#[test]
fn inverted_curve_is_accepted_and_descends() {
    let inverted = InterestRateCurve {
        min_rate: BasisPoints(800),
        optimum_rate: BasisPoints(400),
        max_rate: BasisPoints(200),
        ..standard_curve()
    };
    let policy = LinearKinkRatePolicy::new(inverted).unwrap();

    assert_eq!(policy.interest_rate(BasisPoints(0)), BasisPoints(800));
    assert_eq!(policy.interest_rate(BasisPoints(8_500)), BasisPoints(400));
    assert_eq!(policy.interest_rate(BasisPoints(10_000)), BasisPoints(200));
    assert!(policy.interest_rate(BasisPoints(5_000)) > policy.interest_rate(BasisPoints(9_000)));
}

#[test]
fn misordered_thresholds_are_rejected() {
    let below = InterestRateCurve {
        optimum_threshold: BasisPoints(1_000),
        ..standard_curve()
    };
    assert_eq!(
        LinearKinkRatePolicy::new(below).unwrap_err(),
        CurveError::OptimumBelowMin
    );

    let above = InterestRateCurve {
        optimum_threshold: BasisPoints(9_600),
        ..standard_curve()
    };
    assert_eq!(
        LinearKinkRatePolicy::new(above).unwrap_err(),
        CurveError::OptimumAboveMax
    );
}

#[test]
fn swapped_curve_prices_only_later_windows() {
    let mut h = harness(0);
    h.deposit("alice", usdc(1_000_000));
    h.vault.borrow(&addr("borrower"), usdc(1_000_000)).unwrap();
    h.advance(YEAR / 2);

    let cheap = InterestRateCurve {
        max_rate: BasisPoints(400),
        ..standard_curve()
    };
    let rate: Arc<dyn RatePolicy> = Arc::new(LinearKinkRatePolicy::new(cheap).unwrap());
    h.vault.set_rate_policy(&addr("admin"), Some(rate)).unwrap();
    h.advance(YEAR / 2);

    // Half a year at 8%, half a year at 4%.
    assert_eq!(
        h.vault.total_debt().unwrap(),
        usdc(1_000_000).checked_add(usdc(60_000)).unwrap()
    );
    assert_eq!(h.vault.unincluded_interest().unwrap(), usdc(20_000));
}
