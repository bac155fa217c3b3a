//! Error Types for the vUSD Protocol
//!
//! Typed errors carrying enough context to explain a rejected operation.
//! Every failing operation returns one of these and leaves all state
//! untouched; there is no internal retry.

use crate::types::Address;

/// Result type alias for vUSD operations
pub type VusdResult<T> = Result<T, VusdError>;

/// Main error enum for all vUSD protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VusdError {
    // ============ Vault Errors ============
    /// No vault exists for the given owner
    VaultNotFound { owner: Address },

    /// Owner already has a non-terminal vault
    VaultAlreadyExists { owner: Address },

    /// Vault exists but is closed or liquidated
    VaultNotActive { owner: Address },

    /// Cannot close a vault that still carries debt
    VaultHasOutstandingDebt { remaining_debt: u64 },

    // ============ Collateral Ratio Errors ============
    /// Borrowing would leave the vault under the required ratio
    InsufficientCollateralRatio {
        current_ratio: u128,
        required_ratio: u128,
    },

    /// Withdrawal would leave the vault under the required ratio
    WithdrawalWouldBreachMCR {
        current_ratio: u128,
        required_ratio: u128,
    },

    /// Recovery mode forbids borrows and withdrawals that lower the TCR
    TcrWouldDecrease { current_tcr: u128, new_tcr: u128 },

    // ============ Amount Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// Resulting debt is positive but below the minimum
    BelowMinimumDebt { debt: u64, minimum: u64 },

    /// Partial repayment would leave dust debt
    DebtBelowMinimumAfterRepay { remaining: u64, minimum: u64 },

    /// Repayment larger than the outstanding debt
    ExcessRepayment { amount: u64, debt: u64 },

    /// Insufficient balance for operation
    InsufficientBalance { available: u64, requested: u64 },

    // ============ Authorization Errors ============
    /// Caller is not authorized for this operation
    Unauthorized { expected: Address, actual: Address },

    /// Only protocol admin can perform this action
    AdminOnly,

    // ============ Oracle Errors ============
    /// Oracle price is older than the freshness threshold
    StalePriceFeed {
        publish_time: u64,
        now: u64,
        max_age: u64,
    },

    /// Price is zero or outside the accepted range
    InvalidPrice { price: u64 },

    /// Oracle price deviation too large
    OraclePriceDeviation {
        old_price: u64,
        new_price: u64,
        max_deviation_bps: u64,
    },

    // ============ Stability Pool Errors ============
    /// Requested more than the depositor's effective balance
    InsufficientPoolBalance { available: u64, required: u64 },

    /// Deposit not found for user
    DepositNotFound { depositor: Address },

    /// No rewards to claim
    NoRewardsToClaim,

    // ============ Liquidation Errors ============
    /// Vault is not liquidatable
    NotLiquidatable { owner: Address, ratio: u128 },

    /// Debt must be redistributed but no other vault carries stake
    NoVaultsForRedistribution,

    /// Surplus claim not found
    SurplusNotFound { owner: Address },

    // ============ Redemption Errors ============
    /// No vault could absorb any part of the redemption
    NothingToRedeem,

    // ============ Token Errors ============
    /// Token conservation violated (inputs != outputs)
    ConservationViolated { inputs: u64, outputs: u64 },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Input Validation Errors ============
    /// Invalid input parameter
    InvalidInput { param: &'static str, reason: &'static str },

    // ============ State Errors ============
    /// Protocol is paused
    ProtocolPaused,
}

impl VusdError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::VaultNotFound { .. } => "E001_VAULT_NOT_FOUND",
            Self::VaultAlreadyExists { .. } => "E002_VAULT_EXISTS",
            Self::VaultNotActive { .. } => "E003_VAULT_INACTIVE",
            Self::VaultHasOutstandingDebt { .. } => "E004_VAULT_HAS_DEBT",
            Self::InsufficientCollateralRatio { .. } => "E010_INSUFFICIENT_CR",
            Self::WithdrawalWouldBreachMCR { .. } => "E011_WITHDRAW_BREACHES_MCR",
            Self::TcrWouldDecrease { .. } => "E012_TCR_WOULD_DECREASE",
            Self::ZeroAmount => "E020_ZERO_AMOUNT",
            Self::BelowMinimumDebt { .. } => "E021_BELOW_MIN_DEBT",
            Self::DebtBelowMinimumAfterRepay { .. } => "E022_REPAY_LEAVES_DUST",
            Self::ExcessRepayment { .. } => "E023_EXCESS_REPAYMENT",
            Self::InsufficientBalance { .. } => "E024_INSUFFICIENT_BALANCE",
            Self::Unauthorized { .. } => "E030_UNAUTHORIZED",
            Self::AdminOnly => "E031_ADMIN_ONLY",
            Self::StalePriceFeed { .. } => "E040_STALE_PRICE",
            Self::InvalidPrice { .. } => "E041_INVALID_PRICE",
            Self::OraclePriceDeviation { .. } => "E042_ORACLE_DEVIATION",
            Self::InsufficientPoolBalance { .. } => "E050_POOL_INSUFFICIENT",
            Self::DepositNotFound { .. } => "E051_DEPOSIT_NOT_FOUND",
            Self::NoRewardsToClaim => "E052_NO_REWARDS",
            Self::NotLiquidatable { .. } => "E060_NOT_LIQUIDATABLE",
            Self::NoVaultsForRedistribution => "E061_NO_REDISTRIBUTION_TARGET",
            Self::SurplusNotFound { .. } => "E062_SURPLUS_NOT_FOUND",
            Self::NothingToRedeem => "E070_NOTHING_TO_REDEEM",
            Self::ConservationViolated { .. } => "E080_CONSERVATION",
            Self::Overflow => "E090_OVERFLOW",
            Self::Underflow => "E091_UNDERFLOW",
            Self::DivisionByZero => "E092_DIV_ZERO",
            Self::InvalidInput { .. } => "E100_INVALID_INPUT",
            Self::ProtocolPaused => "E110_PAUSED",
        }
    }

    /// Returns true if this error is recoverable (caller can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InsufficientCollateralRatio { .. } => true, // Add more collateral
            Self::WithdrawalWouldBreachMCR { .. } => true,    // Withdraw less
            Self::InsufficientBalance { .. } => true,         // Get more funds
            Self::InsufficientPoolBalance { .. } => true,     // Withdraw less
            Self::BelowMinimumDebt { .. } => true,            // Increase amount
            Self::DebtBelowMinimumAfterRepay { .. } => true,  // Repay in full
            Self::StalePriceFeed { .. } => true,              // Refresh price
            _ => false,
        }
    }
}
