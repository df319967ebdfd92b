//! # Vault Ledger & Accrual
//!
//! The ledger holds four quantities that must stay consistent with each
//! other and with the token balance of the vault:
//!
//! - `deposited_liquidity`: asset units held and not lent out.
//! - `borrowed_principal`: principal outstanding, no interest.
//! - `accrued_interest`: interest materialized at `last_update_time`, unpaid.
//! - `unpaid_fee`: protocol fee materialized and not yet swept.
//!
//! Interest and fee accrue continuously but are only written down when an
//! operation materializes them. Between materializations they are implied
//! by `now - last_update_time`. [`VaultLedger::accrual`] computes that
//! implied delta without touching the ledger, which is how read-only views
//! see up-to-date numbers.
//!
//! Invariant: `unpaid_fee <= deposited_liquidity + total_debt`. Accrual caps
//! the fee there, and every other mutation preserves it.

use serde::{Deserialize, Serialize};

use aloc_protocol::config::{ACCRUAL_DENOMINATOR, BASIS_PRECISION};
use aloc_protocol::{mul_div, Assets, BasisPoints, MathError, Rounding, Timestamp, U256};

/// The accounting record of a single vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultLedger {
    pub deposited_liquidity: Assets,
    pub borrowed_principal: Assets,
    pub accrued_interest: Assets,
    pub unpaid_fee: Assets,
    pub last_update_time: Timestamp,
    /// Fee rate applied to the window that started at `last_update_time`.
    pub last_protocol_fee_rate: BasisPoints,
    pub max_size: Assets,
}

/// Interest and fee implied by the time elapsed since the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Seconds covered by this window.
    pub elapsed: u64,
    /// Interest accrued over the window.
    pub interest: Assets,
    /// Total unpaid fee at the end of the window (not the delta).
    pub unpaid_fee: Assets,
}

impl VaultLedger {
    pub fn new(now: Timestamp, max_size: Assets, fee_rate: BasisPoints) -> Self {
        Self {
            deposited_liquidity: Assets::ZERO,
            borrowed_principal: Assets::ZERO,
            accrued_interest: Assets::ZERO,
            unpaid_fee: Assets::ZERO,
            last_update_time: now,
            last_protocol_fee_rate: fee_rate,
            max_size,
        }
    }

    // -- Derived quantities -------------------------------------------------

    /// Principal plus materialized interest.
    pub fn total_debt(&self) -> Result<Assets, MathError> {
        self.borrowed_principal.checked_add(self.accrued_interest)
    }

    /// Liquidity plus debt minus the unpaid fee, floored at zero.
    pub fn total_assets(&self) -> Result<Assets, MathError> {
        Ok(self
            .deposited_liquidity
            .checked_add(self.total_debt()?)?
            .saturating_sub(self.unpaid_fee))
    }

    /// Liquidity not reserved for the unpaid fee.
    pub fn liquid_assets(&self) -> Assets {
        self.deposited_liquidity.saturating_sub(self.unpaid_fee)
    }

    /// Share of the pool lent out as principal, in basis points.
    ///
    /// Counts principal only, not accrued interest. The denominator
    /// reserves the materialized fee; when the fee eats all of the
    /// liquidity the result pins at 100%.
    pub fn utilization(&self) -> Result<BasisPoints, MathError> {
        if self.borrowed_principal.is_zero() {
            return Ok(BasisPoints::ZERO);
        }
        let available = self.deposited_liquidity.saturating_sub(self.unpaid_fee);
        let pool = self.borrowed_principal.checked_add(available)?;
        let ratio = mul_div(
            self.borrowed_principal.raw(),
            U256::from(BASIS_PRECISION),
            pool.raw(),
            Rounding::Down,
        )?;
        Ok(BasisPoints(ratio.low_u32().min(BASIS_PRECISION)))
    }

    /// Seconds since the last materialization. Never negative, even if a
    /// caller passes a stale `now`.
    pub fn elapsed(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_update_time)
    }

    /// Whether accruing up to `now` requires an interest rate.
    pub fn needs_rate(&self, now: Timestamp) -> bool {
        !self.borrowed_principal.is_zero() && self.elapsed(now) > 0
    }

    // -- Accrual ------------------------------------------------------------

    /// Computes the window `last_update_time..now` at `rate`, without
    /// mutating anything.
    ///
    /// Interest is simple, prorated per second, and rounds down. The fee is
    /// charged on everything the vault is worth before this window's fee:
    /// liquidity plus debt (including the window's interest) minus the fee
    /// already owed. It is charged at the rate snapshotted at the start of
    /// the window and capped at liquidity plus debt.
    pub fn accrual(&self, now: Timestamp, rate: BasisPoints) -> Result<Accrual, MathError> {
        let elapsed = self.elapsed(now);
        if elapsed == 0 {
            return Ok(Accrual {
                elapsed,
                interest: Assets::ZERO,
                unpaid_fee: self.unpaid_fee,
            });
        }

        let seconds = U256::from(elapsed);
        let denominator = U256::from(ACCRUAL_DENOMINATOR);

        let rate_time = rate
            .as_u256()
            .checked_mul(seconds)
            .ok_or(MathError::Overflow)?;
        let interest = Assets::new(mul_div(
            self.borrowed_principal.raw(),
            rate_time,
            denominator,
            Rounding::Down,
        )?);

        let gross = self
            .deposited_liquidity
            .checked_add(self.total_debt()?)?
            .checked_add(interest)?;
        let fee_base = gross.saturating_sub(self.unpaid_fee);
        let fee_time = self
            .last_protocol_fee_rate
            .as_u256()
            .checked_mul(seconds)
            .ok_or(MathError::Overflow)?;
        let new_fee = Assets::new(mul_div(fee_base.raw(), fee_time, denominator, Rounding::Down)?);
        let unpaid_fee = self.unpaid_fee.checked_add(new_fee)?.min(gross);

        Ok(Accrual {
            elapsed,
            interest,
            unpaid_fee,
        })
    }

    /// Writes an accrual window into the ledger and opens the next one at
    /// `next_fee_rate`.
    pub fn apply_accrual(
        &mut self,
        accrual: &Accrual,
        now: Timestamp,
        next_fee_rate: BasisPoints,
    ) -> Result<(), MathError> {
        self.accrued_interest = self.accrued_interest.checked_add(accrual.interest)?;
        self.unpaid_fee = accrual.unpaid_fee;
        self.last_update_time = self.last_update_time.max(now);
        self.last_protocol_fee_rate = next_fee_rate;
        Ok(())
    }

    // -- Mutations ----------------------------------------------------------

    /// Moves as much of the unpaid fee as liquidity allows out of the
    /// ledger. Returns the amount to send to the treasury.
    pub fn take_fee_payment(&mut self) -> Result<Assets, MathError> {
        let amount = self.unpaid_fee.min(self.deposited_liquidity);
        self.unpaid_fee = self.unpaid_fee.checked_sub(amount)?;
        self.deposited_liquidity = self.deposited_liquidity.checked_sub(amount)?;
        Ok(amount)
    }

    /// Books a repayment: interest first, then principal.
    pub fn apply_repayment(&mut self, amount: Assets) -> Result<(), MathError> {
        let to_interest = amount.min(self.accrued_interest);
        let to_principal = amount.checked_sub(to_interest)?;
        self.accrued_interest = self.accrued_interest.checked_sub(to_interest)?;
        self.borrowed_principal = self.borrowed_principal.checked_sub(to_principal)?;
        self.deposited_liquidity = self.deposited_liquidity.checked_add(amount)?;
        Ok(())
    }

    /// Books a drawdown.
    pub fn apply_borrow(&mut self, amount: Assets) -> Result<(), MathError> {
        self.deposited_liquidity = self.deposited_liquidity.checked_sub(amount)?;
        self.borrowed_principal = self.borrowed_principal.checked_add(amount)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use aloc_protocol::config::SECONDS_PER_YEAR;

    const START: Timestamp = 1_700_000_000;

    fn usdc(v: u64) -> Assets {
        Assets::from(v * 1_000_000)
    }

    fn ledger() -> VaultLedger {
        VaultLedger::new(START, usdc(10_000_000), BasisPoints::ZERO)
    }

    #[test]
    fn fresh_ledger_is_empty() {
        let l = ledger();
        assert_eq!(l.total_assets().unwrap(), Assets::ZERO);
        assert_eq!(l.utilization().unwrap(), BasisPoints::ZERO);
        assert!(!l.needs_rate(START + 100));
    }

    #[test]
    fn interest_for_a_year() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(1_000_000);
        l.apply_borrow(usdc(1_000_000)).unwrap();
        let accrual = l.accrual(START + SECONDS_PER_YEAR, BasisPoints(500)).unwrap();
        assert_eq!(accrual.interest, usdc(50_000));
        assert_eq!(accrual.unpaid_fee, Assets::ZERO);
    }

    #[test]
    fn zero_elapsed_accrues_nothing() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(10);
        l.apply_borrow(usdc(10)).unwrap();
        let accrual = l.accrual(START, BasisPoints(500)).unwrap();
        assert_eq!(accrual.interest, Assets::ZERO);
        assert_eq!(accrual.elapsed, 0);
    }

    #[test]
    fn fee_for_half_a_year() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(1_000_000);
        l.last_protocol_fee_rate = BasisPoints(1000);
        let accrual = l
            .accrual(START + SECONDS_PER_YEAR / 2, BasisPoints::ZERO)
            .unwrap();
        assert_eq!(accrual.unpaid_fee, usdc(50_000));
    }

    #[test]
    fn fee_is_capped_at_gross_assets() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(1_000);
        l.last_protocol_fee_rate = BasisPoints(10_000);
        let accrual = l
            .accrual(START + 20 * SECONDS_PER_YEAR, BasisPoints::ZERO)
            .unwrap();
        assert_eq!(accrual.unpaid_fee, usdc(1_000));
        l.apply_accrual(&accrual, START + 20 * SECONDS_PER_YEAR, BasisPoints(10_000))
            .unwrap();
        assert_eq!(l.total_assets().unwrap(), Assets::ZERO);
    }

    #[test]
    fn fee_base_includes_window_interest() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(1_000_000);
        l.apply_borrow(usdc(1_000_000)).unwrap();
        l.last_protocol_fee_rate = BasisPoints(1000);
        let accrual = l.accrual(START + SECONDS_PER_YEAR, BasisPoints(500)).unwrap();
        // (1_000_000 + 50_000) / 10
        assert_eq!(accrual.unpaid_fee, usdc(105_000));
    }

    #[test]
    fn apply_accrual_refreshes_rate_snapshot() {
        let mut l = ledger();
        let accrual = l.accrual(START + 10, BasisPoints::ZERO).unwrap();
        l.apply_accrual(&accrual, START + 10, BasisPoints(300)).unwrap();
        assert_eq!(l.last_update_time, START + 10);
        assert_eq!(l.last_protocol_fee_rate, BasisPoints(300));
    }

    #[test]
    fn utilization_excludes_interest() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(1_000_000);
        l.apply_borrow(usdc(500_000)).unwrap();
        l.accrued_interest = usdc(100_000);
        assert_eq!(l.utilization().unwrap(), BasisPoints(5000));
    }

    #[test]
    fn utilization_pins_at_100_percent_when_fee_exceeds_liquidity() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(10);
        l.apply_borrow(usdc(5)).unwrap();
        l.unpaid_fee = usdc(8);
        assert_eq!(l.utilization().unwrap(), BasisPoints(10_000));
    }

    #[test]
    fn repayment_pays_interest_first() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(100);
        l.apply_borrow(usdc(100)).unwrap();
        l.accrued_interest = usdc(10);
        l.apply_repayment(usdc(15)).unwrap();
        assert_eq!(l.accrued_interest, Assets::ZERO);
        assert_eq!(l.borrowed_principal, usdc(95));
        assert_eq!(l.deposited_liquidity, usdc(15));
    }

    #[test]
    fn fee_payment_is_bounded_by_liquidity() {
        let mut l = ledger();
        l.deposited_liquidity = usdc(3);
        l.unpaid_fee = usdc(5);
        assert_eq!(l.take_fee_payment().unwrap(), usdc(3));
        assert_eq!(l.unpaid_fee, usdc(2));
        assert_eq!(l.deposited_liquidity, Assets::ZERO);
    }

    #[test]
    fn total_assets_floors_at_zero() {
        let mut l = ledger();
        l.unpaid_fee = usdc(1);
        assert_eq!(l.total_assets().unwrap(), Assets::ZERO);
        assert_eq!(l.liquid_assets(), Assets::ZERO);
    }
}
