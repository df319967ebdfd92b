//! Errors raised by vault operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use aloc_protocol::{Address, Assets, MathError, Shares, Timestamp, TokenError};

use crate::policy::PolicyKind;

/// Privileged roles on a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sets the max size and curates the lender whitelist.
    Manager,
    /// Installs and removes policies.
    ControllerAdmin,
    /// The one address allowed to borrow and repay.
    Borrower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "MANAGER_ROLE"),
            Role::ControllerAdmin => write!(f, "CONTROLLER_ADMIN_ROLE"),
            Role::Borrower => write!(f, "BORROWER"),
        }
    }
}

/// Coarse classification of a [`VaultError`], used for API error codes and
/// metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    InputValidation,
    Authorization,
    PolicyVeto,
    Liquidity,
    Temporal,
    Collaborator,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::InputValidation => "input_validation",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::PolicyVeto => "policy_veto",
            ErrorCategory::Liquidity => "liquidity",
            ErrorCategory::Temporal => "temporal",
            ErrorCategory::Collaborator => "collaborator",
        }
    }
}

/// Errors that can occur during vault operations.
///
/// Every error aborts the whole operation. No ledger field, share balance
/// or token balance changes when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    // -- Input validation ---------------------------------------------------
    #[error("Cannot have zero duration")]
    ZeroDuration,

    #[error("Cannot borrow zero assets")]
    ZeroBorrow,

    #[error("Repayment amount must be greater than 0")]
    ZeroRepayment,

    #[error("Portfolio cannot be the receiver")]
    ReceiverIsVault,

    #[error("Portfolio cannot be the owner")]
    OwnerIsVault,

    #[error("New max size needs to be different")]
    MaxSizeUnchanged,

    #[error("New {0} controller needs to be different")]
    PolicyUnchanged(PolicyKind),

    // -- Authorization ------------------------------------------------------
    #[error("Caller is not the borrower")]
    NotBorrower,

    /// The caller lacks a role required for an admin operation.
    #[error("{caller} is missing role {role}")]
    Unauthorized {
        /// Who called.
        caller: Address,
        /// The role they needed.
        role: Role,
    },

    /// A third party tried to burn more of the owner's shares than approved.
    #[error("Caller not approved to burn given amount of shares")]
    SharesNotApproved {
        /// Remaining allowance.
        allowance: Shares,
        /// Shares that would be burned.
        requested: Shares,
    },

    /// A third party tried to move more of the owner's shares than approved.
    #[error("insufficient share allowance: allowance {allowance}, requested {requested}")]
    InsufficientShareAllowance {
        /// Remaining allowance.
        allowance: Shares,
        /// Shares that would be moved.
        requested: Shares,
    },

    // -- Policy -------------------------------------------------------------
    /// A policy vetoed the operation, or the amount was zero.
    #[error("Operation not allowed")]
    OperationNotAllowed,

    /// The slot for this operation is empty, which disables it.
    #[error("{0} controller not configured")]
    PolicyNotConfigured(PolicyKind),

    #[error("This transfer not permitted")]
    TransferNotPermitted,

    // -- Liquidity & solvency -----------------------------------------------
    /// A withdrawal or redemption would pay out more than the vault holds
    /// after reserving the unpaid fee.
    #[error("Operation exceeds portfolio liquidity")]
    InsufficientLiquidity {
        /// Liquid assets available.
        available: Assets,
        /// Assets requested.
        requested: Assets,
    },

    /// A borrow exceeds the vault's liquid assets.
    #[error("Amount exceeds portfolio balance")]
    BorrowExceedsLiquidity {
        /// Liquid assets available.
        available: Assets,
        /// Amount requested.
        requested: Assets,
    },

    #[error("Amount must be less than total debt")]
    RepaymentExceedsDebt {
        /// Outstanding debt including interest.
        debt: Assets,
        /// Amount offered.
        requested: Assets,
    },

    #[error("Operation would cause portfolio to exceed max size")]
    MaxSizeExceeded {
        /// Configured ceiling.
        max_size: Assets,
        /// Total assets the operation would produce.
        resulting: Assets,
    },

    #[error("burn amount exceeds balance: balance {balance}, requested {requested}")]
    InsufficientShares {
        /// Shares held.
        balance: Shares,
        /// Shares requested.
        requested: Shares,
    },

    // -- Temporal -----------------------------------------------------------
    #[error("Portfolio end date has elapsed")]
    PortfolioClosed {
        /// When the vault closed.
        end_time: Timestamp,
        /// When the call was made.
        now: Timestamp,
    },

    // -- Collaborators ------------------------------------------------------
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

impl VaultError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VaultError::ZeroDuration
            | VaultError::ZeroBorrow
            | VaultError::ZeroRepayment
            | VaultError::ReceiverIsVault
            | VaultError::OwnerIsVault
            | VaultError::MaxSizeUnchanged
            | VaultError::PolicyUnchanged(_) => ErrorCategory::InputValidation,
            VaultError::NotBorrower
            | VaultError::Unauthorized { .. }
            | VaultError::SharesNotApproved { .. }
            | VaultError::InsufficientShareAllowance { .. } => ErrorCategory::Authorization,
            VaultError::OperationNotAllowed
            | VaultError::PolicyNotConfigured(_)
            | VaultError::TransferNotPermitted => ErrorCategory::PolicyVeto,
            VaultError::InsufficientLiquidity { .. }
            | VaultError::BorrowExceedsLiquidity { .. }
            | VaultError::RepaymentExceedsDebt { .. }
            | VaultError::MaxSizeExceeded { .. }
            | VaultError::InsufficientShares { .. } => ErrorCategory::Liquidity,
            VaultError::PortfolioClosed { .. } => ErrorCategory::Temporal,
            VaultError::Token(_) | VaultError::Math(_) => ErrorCategory::Collaborator,
        }
    }
}
