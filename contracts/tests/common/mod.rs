//! Shared harness for the vault integration tests.
//!
//! Builds a one-year USDC line of credit with a 10M max size, the standard
//! 2% / 4% / 8% kinked curve and the default controllers, driven by a
//! manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use aloc_contracts::interest_rate::{InterestRateCurve, LinearKinkRatePolicy};
use aloc_contracts::policy::{
    AllowAllLenderVerifier, BlockedTransferController, DepositController, Policies,
    WithdrawController,
};
use aloc_contracts::{
    Collaborators, LineOfCredit, LineOfCreditConfig, ProtocolConfig, ProtocolConfigParams,
};
use aloc_protocol::config::SECONDS_PER_YEAR;
use aloc_protocol::{Address, AssetToken, Assets, BasisPoints, InMemoryToken, ManualClock, Timestamp};

pub const START: Timestamp = 1_700_000_000;
pub const YEAR: u64 = SECONDS_PER_YEAR;

pub fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

/// Whole USDC in base units.
pub fn usdc(v: u64) -> Assets {
    Assets::from(v * 1_000_000)
}

pub fn standard_curve() -> InterestRateCurve {
    InterestRateCurve {
        min_rate: BasisPoints(200),
        min_threshold: BasisPoints(2_000),
        optimum_rate: BasisPoints(400),
        optimum_threshold: BasisPoints(8_500),
        max_rate: BasisPoints(800),
        max_threshold: BasisPoints(9_500),
    }
}

pub fn default_policies() -> Policies {
    Policies {
        deposit: Some(Arc::new(DepositController::new(Arc::new(AllowAllLenderVerifier)))),
        withdraw: Some(Arc::new(WithdrawController)),
        transfer: Some(Arc::new(BlockedTransferController)),
        rate: Some(Arc::new(LinearKinkRatePolicy::new(standard_curve()).unwrap())),
    }
}

pub struct Harness {
    pub vault: LineOfCredit,
    pub token: Arc<InMemoryToken>,
    pub clock: Arc<ManualClock>,
    pub protocol: Arc<ProtocolConfig>,
}

/// A harness with the default policies and a protocol fee of `fee_bps`.
pub fn harness(fee_bps: u32) -> Harness {
    harness_with(fee_bps, default_policies())
}

pub fn harness_with(fee_bps: u32, policies: Policies) -> Harness {
    let token = Arc::new(InMemoryToken::new("USDC", 6, addr("minter")));
    let clock = Arc::new(ManualClock::new(START));
    let protocol = Arc::new(
        ProtocolConfig::new(ProtocolConfigParams {
            default_admin: addr("protocol-admin"),
            protocol_admin: addr("protocol-admin"),
            protocol_treasury: addr("treasury"),
            protocol_fee_rate: BasisPoints(fee_bps),
        }),
    );
    let config = LineOfCreditConfig {
        address: addr("vault"),
        name: "Automated Line of Credit".into(),
        symbol: "ALOC".into(),
        borrower: addr("borrower"),
        manager: addr("manager"),
        controller_admin: addr("admin"),
        duration: YEAR,
        max_size: usdc(10_000_000),
    };
    let vault = LineOfCredit::new(
        config,
        policies,
        Collaborators {
            asset: token.clone(),
            protocol: protocol.clone(),
            clock: clock.clone(),
        },
    )
    .unwrap();
    Harness {
        vault,
        token,
        clock,
        protocol,
    }
}

impl Harness {
    /// Mints `amount` to `who` and approves the vault for it.
    pub fn fund(&self, who: &str, amount: Assets) {
        let owner = addr(who);
        self.token.mint(&addr("minter"), &owner, amount).unwrap();
        let allowance = self.token.allowance(&owner, &addr("vault"));
        self.token
            .approve(&owner, &addr("vault"), allowance.checked_add(amount).unwrap())
            .unwrap();
    }

    /// Funds `who` and deposits `amount` for their own shares.
    pub fn deposit(&mut self, who: &str, amount: Assets) {
        self.fund(who, amount);
        self.vault.deposit(&addr(who), amount, &addr(who)).unwrap();
    }

    pub fn advance(&self, seconds: u64) {
        self.clock.advance(seconds);
    }

    pub fn balance(&self, who: &str) -> Assets {
        self.token.balance_of(&addr(who))
    }

    /// The ledger's liquidity always matches what the vault actually holds.
    pub fn assert_conserved(&self) {
        assert_eq!(
            self.vault.ledger().deposited_liquidity,
            self.token.balance_of(&addr("vault")),
            "ledger liquidity diverged from token balance"
        );
    }
}
