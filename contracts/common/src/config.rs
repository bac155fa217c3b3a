//! Runtime protocol configuration
//!
//! Defaults come from [`crate::constants`]. A deployment can override them
//! with a CBOR-encoded [`ProtocolConfig`]; every config is validated before
//! a protocol instance accepts it.

#[cfg(feature = "std")]
use crate::Vec;
use serde::{Deserialize, Serialize};

use crate::constants::{limits, liquidation, oracle, ratios};
use crate::errors::{VusdError, VusdResult};
use crate::types::Address;

/// Tunable protocol parameters and the well-known accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Minimum collateral ratio (1e18 = 100%)
    pub mcr: u128,
    /// Critical collateral ratio (1e18 = 100%)
    pub ccr: u128,
    /// Minimum non-zero vault debt
    pub min_debt: u64,
    /// Reserve escrowed on first borrow
    pub liquidation_reserve: u64,
    /// Oldest acceptable price, in seconds
    pub max_price_age_secs: u64,
    /// Margin the stability pool's seized collateral must clear over the
    /// debt it absorbs, in basis points
    pub sp_min_surplus_bps: u64,
    /// Admin allowed to pause and unpause
    pub admin: Address,
    /// Account holding escrowed liquidation reserves
    pub gas_pool: Address,
    /// Account holding stability pool deposits
    pub stability_pool_account: Address,
}

impl ProtocolConfig {
    /// Default parameters with the given accounts
    pub fn new(admin: Address, gas_pool: Address, stability_pool_account: Address) -> Self {
        Self {
            admin,
            gas_pool,
            stability_pool_account,
            ..Default::default()
        }
    }

    /// Check parameter sanity
    pub fn validate(&self) -> VusdResult<()> {
        if self.mcr < ratios::ONE_HUNDRED_PERCENT {
            return Err(VusdError::InvalidInput {
                param: "mcr",
                reason: "must be at least 100%",
            });
        }
        if self.ccr <= self.mcr {
            return Err(VusdError::InvalidInput {
                param: "ccr",
                reason: "must exceed mcr",
            });
        }
        if self.min_debt <= self.liquidation_reserve {
            return Err(VusdError::InvalidInput {
                param: "min_debt",
                reason: "must exceed liquidation reserve",
            });
        }
        if self.max_price_age_secs == 0 {
            return Err(VusdError::InvalidInput {
                param: "max_price_age_secs",
                reason: "must be positive",
            });
        }

        let zero = [0u8; 32];
        if self.admin == zero || self.gas_pool == zero || self.stability_pool_account == zero {
            return Err(VusdError::InvalidInput {
                param: "account",
                reason: "zero address",
            });
        }
        if self.gas_pool == self.stability_pool_account {
            return Err(VusdError::InvalidInput {
                param: "gas_pool",
                reason: "must differ from stability pool account",
            });
        }
        Ok(())
    }

    /// Decode and validate a CBOR-encoded config
    #[cfg(feature = "std")]
    pub fn from_cbor(bytes: &[u8]) -> VusdResult<Self> {
        let config: Self = ciborium::de::from_reader(bytes).map_err(|_| VusdError::InvalidInput {
            param: "config",
            reason: "malformed CBOR",
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Encode as CBOR
    #[cfg(feature = "std")]
    pub fn to_cbor(&self) -> VusdResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out).map_err(|_| VusdError::InvalidInput {
            param: "config",
            reason: "CBOR encoding failed",
        })?;
        Ok(out)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            mcr: ratios::MCR,
            ccr: ratios::CCR,
            min_debt: limits::MIN_DEBT,
            liquidation_reserve: limits::LIQUIDATION_RESERVE,
            max_price_age_secs: oracle::MAX_PRICE_AGE_SECS,
            sp_min_surplus_bps: liquidation::SP_MIN_SURPLUS_BPS,
            admin: [0u8; 32],
            gas_pool: [0u8; 32],
            stability_pool_account: [0u8; 32],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProtocolConfig {
        ProtocolConfig::new([1u8; 32], [2u8; 32], [3u8; 32])
    }

    #[test]
    fn test_defaults_validate() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_debt, 200_000_000);
        assert_eq!(config.liquidation_reserve, 50_000_000);
    }

    #[test]
    fn test_default_accounts_rejected() {
        assert!(ProtocolConfig::default().validate().is_err());
    }

    #[test]
    fn test_ratio_ordering_enforced() {
        let mut config = test_config();
        config.ccr = config.mcr;
        assert!(matches!(
            config.validate(),
            Err(VusdError::InvalidInput { param: "ccr", .. })
        ));

        let mut config = test_config();
        config.mcr = ratios::ONE_HUNDRED_PERCENT - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_debt_must_exceed_reserve() {
        let mut config = test_config();
        config.min_debt = config.liquidation_reserve;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cbor_round_trip() {
        let mut config = test_config();
        config.sp_min_surplus_bps = 500;
        let bytes = config.to_cbor().unwrap();
        assert_eq!(ProtocolConfig::from_cbor(&bytes).unwrap(), config);
    }

    #[test]
    fn test_cbor_rejects_garbage_and_invalid() {
        assert!(ProtocolConfig::from_cbor(&[0xff, 0x01]).is_err());

        let mut config = test_config();
        config.ccr = 0;
        let bytes = config.to_cbor().unwrap();
        assert!(ProtocolConfig::from_cbor(&bytes).is_err());
    }
}
