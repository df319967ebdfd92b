//! # Protocol Configuration & Constants
//!
//! Every magic number in the line of credit lives here. If you're
//! hardcoding a constant somewhere else, you're doing it wrong and you owe
//! the team coffee.
//!
//! Most of these are baked into the accounting formulas. Changing them on
//! a live vault silently reprices every share, so don't.

// ---------------------------------------------------------------------------
// Ratios & Time
// ---------------------------------------------------------------------------

/// Denominator for every basis-point ratio. 10_000 bps = 100%.
pub const BASIS_PRECISION: u32 = 10_000;

/// Seconds in the accrual year. Interest and fees are quoted as annual
/// rates and prorated per second against this. No leap years: 365 days,
/// same as every on-chain money market.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// The product `SECONDS_PER_YEAR * BASIS_PRECISION`, the denominator of
/// every time-weighted accrual.
pub const ACCRUAL_DENOMINATOR: u64 = SECONDS_PER_YEAR * BASIS_PRECISION as u64;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Decimals of the reference asset (USDC). Shares inherit the decimals of
/// whatever asset the vault is deployed with.
pub const DEFAULT_ASSET_DECIMALS: u8 = 6;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 9741;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./aloc-data";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_is_365_days() {
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
    }

    #[test]
    fn accrual_denominator_matches_parts() {
        assert_eq!(ACCRUAL_DENOMINATOR, 315_360_000_000);
    }

    #[test]
    fn ports_do_not_collide() {
        assert_ne!(DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    }
}
