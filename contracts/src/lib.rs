//! # ALOC Contracts
//!
//! The lending logic of the Automated Line of Credit:
//!
//! - **Line of Credit**: the vault itself. Lenders deposit one asset for
//!   shares, a single borrower draws and repays, interest and the protocol
//!   fee accrue per second.
//! - **Interest Rate**: the three-segment kinked curve that prices a
//!   borrow from utilization.
//! - **Policies**: pluggable hooks deciding who may deposit, withdraw or
//!   transfer shares, and at what price.
//! - **Protocol Config**: the shared fee rate and treasury every vault
//!   reads from.
//!
//! ## Design Principles
//!
//! 1. All money is `U256` fixed point with an explicit rounding direction
//!    on every division. We use `checked_add` and `checked_sub` everywhere,
//!    because wrapping arithmetic and money do not mix.
//! 2. An operation either completes or leaves the vault exactly as it
//!    was. State is staged on a copy and committed after the token moves.
//! 3. Policies see the vault through a read-only view and cannot re-enter.
//! 4. Every persisted type is serializable (serde) and versioned.

pub mod interest_rate;
pub mod line_of_credit;
pub mod policy;
pub mod protocol_config;

pub use interest_rate::{CurveError, InterestRateCurve, LinearKinkRatePolicy};
pub use line_of_credit::{
    Collaborators, EventRecord, LineOfCredit, LineOfCreditConfig, VaultError, VaultEvent,
    VaultSnapshot, VaultStatus, VaultTerms, VaultView,
};
pub use policy::{Policies, PolicyKind};
pub use protocol_config::{ProtocolConfig, ProtocolConfigParams, ProtocolConfigSource};
