//! Protocol Constants
//!
//! All magic numbers and default configuration values for the vUSD protocol.
//! Ratios and rates are 18-decimal fixed point (`1e18 == 100%`); token
//! amounts are in base units of their asset.
//!
//! # Network Configuration
//!
//! The `mainnet` feature is the network switch propagated to every crate.
//! Numeric defaults are identical on both networks; runtime overrides go
//! through [`crate::config::ProtocolConfig`].

/// Synthetic asset metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "vUSD";
    /// Token symbol
    pub const SYMBOL: &str = "vUSD";
    /// Decimal places
    pub const DECIMALS: u8 = 6;
    /// One unit with decimals (1 vUSD = 1_000_000 base units)
    pub const ONE: u64 = 1_000_000;
}

/// Collateral asset metadata
pub mod collateral {
    /// Decimal places of the collateral base unit
    pub const DECIMALS: u8 = 9;
    /// One whole collateral unit in base units
    pub const ONE: u64 = 1_000_000_000;
}

/// Collateralization ratios (18-decimal fixed point)
pub mod ratios {
    /// Minimum Collateral Ratio (110%). Below this a vault can be liquidated.
    pub const MCR: u128 = 1_100_000_000_000_000_000;

    /// Critical Collateral Ratio (150%). The system is in Recovery Mode
    /// while TCR is below this.
    pub const CCR: u128 = 1_500_000_000_000_000_000;

    /// 100%
    pub const ONE_HUNDRED_PERCENT: u128 = super::precision::DECIMAL_PRECISION;
}

/// Fee configuration (18-decimal fixed point)
pub mod fees {
    /// Borrowing fee floor (0.5%)
    pub const BORROWING_FEE_FLOOR: u128 = 5_000_000_000_000_000;

    /// Borrowing fee cap (5%)
    pub const BORROWING_FEE_CAP: u128 = 50_000_000_000_000_000;

    /// Redemption fee floor (0.5%)
    pub const REDEMPTION_FEE_FLOOR: u128 = 5_000_000_000_000_000;

    /// Ceiling for the base rate itself (100%)
    pub const MAX_BASE_RATE: u128 = 1_000_000_000_000_000_000;

    /// Base rate step divisor: each event adds `fraction_of_debt / BETA`
    pub const BETA: u128 = 2;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Debt limits
pub mod limits {
    use super::token::ONE;

    /// Minimum non-zero debt for an active vault (200 vUSD)
    pub const MIN_DEBT: u64 = 200 * ONE;

    /// Liquidation reserve escrowed on first borrow (50 vUSD)
    pub const LIQUIDATION_RESERVE: u64 = 50 * ONE;

    /// Helper to check if running in mainnet mode
    #[cfg(feature = "mainnet")]
    pub const IS_MAINNET: bool = true;
    #[cfg(not(feature = "mainnet"))]
    pub const IS_MAINNET: bool = false;
}

/// Oracle configuration
pub mod oracle {
    /// Maximum price age in seconds before the feed is considered stale
    pub const MAX_PRICE_AGE_SECS: u64 = 60;

    /// Maximum allowed price deviation per operator update (25%)
    pub const MAX_PRICE_DEVIATION_BPS: u64 = 2_500;

    /// Price precision (USD per whole collateral unit, 6 decimals)
    pub const PRICE_DECIMALS: u8 = 6;

    /// One USD in price units
    pub const PRICE_ONE: u64 = 1_000_000;

    /// Lowest accepted price ($0.01)
    pub const MIN_PRICE: u64 = 10_000;

    /// Highest accepted price ($10,000,000)
    pub const MAX_PRICE: u64 = 10_000_000 * PRICE_ONE;
}

/// Stability Pool configuration
pub mod stability_pool {
    /// Initial value of the running product P (1e18)
    pub const P_BASE: u128 = 1_000_000_000_000_000_000;

    /// When P would drop below this, it is rescaled by `SCALE_FACTOR`
    /// and the scale counter advances.
    pub const SCALE_FACTOR: u128 = 1_000_000_000;
}

/// Liquidation configuration
pub mod liquidation {
    /// Default stability pool surplus floor, in basis points over face value
    pub const SP_MIN_SURPLUS_BPS: u64 = 0;

    /// Maximum vaults in one batch liquidation
    pub const MAX_BATCH_SIZE: usize = 50;
}

/// Time-related constants
pub mod time {
    /// Seconds per minute
    pub const SECONDS_PER_MINUTE: u64 = 60;

    /// Base rate half-life (12 hours)
    pub const BASE_RATE_HALF_LIFE_SECS: u64 = 43_200;

    /// Per-minute decay factor giving a 12 hour half-life: 0.5^(1/720)
    pub const MINUTE_DECAY_FACTOR: u128 = 999_037_758_833_783_000;

    /// Decay exponent cap (one year of minutes)
    pub const MAX_DECAY_MINUTES: u64 = 525_600;
}

/// Precision constants
pub mod precision {
    /// High precision for internal calculations
    pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000; // 1e18
}
