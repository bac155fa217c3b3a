//! Price Oracle Contract
//!
//! Collateral/USD price feed for the vUSD protocol, run by a trusted
//! operator. Updates are bounded by a sane price range and a maximum
//! per-update deviation; the admin can reseed the price outright when the
//! feed has to be recovered after a large move.
//!
//! The oracle does not judge freshness itself. It reports the publish time
//! and the protocol rejects prices older than its configured threshold.

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use vusd_common::{
    constants::oracle::MAX_PRICE_DEVIATION_BPS,
    errors::{VusdError, VusdResult},
    events::{EventLog, VusdEvent},
    oracle::{deviation_bps, validate_price, PriceFeed},
    types::{Address, PriceData},
};

// ============ Oracle State ============

/// Oracle contract state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleState {
    /// Current price data
    pub price: PriceData,
    /// Authorized operator (can update price)
    pub operator: Address,
    /// Admin (can change operator and reseed)
    pub admin: Address,
    /// Maximum move accepted from the operator in one update
    pub max_deviation_bps: u64,
}

impl OracleState {
    /// Create new oracle state with initial price
    pub fn new(admin: Address, operator: Address, initial_price: u64, publish_time: u64) -> Self {
        Self {
            price: PriceData::new(initial_price, publish_time),
            operator,
            admin,
            max_deviation_bps: MAX_PRICE_DEVIATION_BPS,
        }
    }

    /// Default price for testing ($200)
    pub const DEFAULT_PRICE: u64 = 200_000_000;
}

// ============ Oracle ============

/// Operator-updated price feed, shareable across threads
#[derive(Debug)]
pub struct PriceOracle {
    state: RwLock<OracleState>,
    events: Mutex<EventLog>,
}

impl PriceOracle {
    /// Create an oracle seeded with `initial_price`
    pub fn new(admin: Address, operator: Address, initial_price: u64, publish_time: u64) -> VusdResult<Self> {
        if admin == [0u8; 32] || operator == [0u8; 32] {
            return Err(VusdError::InvalidInput {
                param: "address",
                reason: "zero address",
            });
        }
        validate_price(initial_price)?;

        Ok(Self {
            state: RwLock::new(OracleState::new(admin, operator, initial_price, publish_time)),
            events: Mutex::new(EventLog::new()),
        })
    }

    /// Operator price update
    pub fn update_price(&self, signer: &Address, new_price: u64, publish_time: u64) -> VusdResult<()> {
        let mut state = self.state.write();

        // 1. Only operator can update price
        if *signer != state.operator {
            return Err(VusdError::Unauthorized {
                expected: state.operator,
                actual: *signer,
            });
        }

        // 2. Price must be positive and in range
        validate_price(new_price)?;

        // 3. Publish time must not go backwards
        if publish_time < state.price.publish_time {
            return Err(VusdError::InvalidInput {
                param: "publish_time",
                reason: "older than current price",
            });
        }

        // 4. Check price deviation (prevent manipulation)
        let old_price = state.price.price;
        if deviation_bps(old_price, new_price) > state.max_deviation_bps {
            return Err(VusdError::OraclePriceDeviation {
                old_price,
                new_price,
                max_deviation_bps: state.max_deviation_bps,
            });
        }

        // 5. Commit and emit
        state.price = PriceData::new(new_price, publish_time);
        self.events.lock().emit(VusdEvent::PriceUpdated {
            old_price,
            new_price,
            timestamp: publish_time,
        });
        Ok(())
    }

    /// Admin reseed, bypassing the deviation bound
    pub fn reset_price(&self, signer: &Address, new_price: u64, publish_time: u64) -> VusdResult<()> {
        let mut state = self.state.write();

        if *signer != state.admin {
            return Err(VusdError::AdminOnly);
        }
        validate_price(new_price)?;

        let old_price = state.price.price;
        state.price = PriceData::new(new_price, publish_time);
        self.events.lock().emit(VusdEvent::PriceUpdated {
            old_price,
            new_price,
            timestamp: publish_time,
        });
        Ok(())
    }

    /// Admin operator rotation
    pub fn set_operator(&self, signer: &Address, new_operator: &Address, now: u64) -> VusdResult<()> {
        let mut state = self.state.write();

        // 1. Only admin can change operator
        if *signer != state.admin {
            return Err(VusdError::AdminOnly);
        }

        // 2. New operator must be different and non-zero
        if *new_operator == state.operator {
            return Err(VusdError::InvalidInput {
                param: "operator",
                reason: "same as current",
            });
        }
        if *new_operator == [0u8; 32] {
            return Err(VusdError::InvalidInput {
                param: "operator",
                reason: "zero address",
            });
        }

        let old_operator = state.operator;
        state.operator = *new_operator;
        self.events.lock().emit(VusdEvent::OracleOperatorChanged {
            old_operator,
            new_operator: *new_operator,
            timestamp: now,
        });
        Ok(())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> OracleState {
        self.state.read().clone()
    }

    /// Take every event emitted so far
    pub fn drain_events(&self) -> Vec<VusdEvent> {
        self.events.lock().drain()
    }
}

impl PriceFeed for PriceOracle {
    fn get_price(&self) -> VusdResult<PriceData> {
        Ok(self.state.read().price)
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use vusd_common::oracle::fresh_price;

    const ADMIN: Address = [1u8; 32];
    const OPERATOR: Address = [2u8; 32];
    const PRICE_200: u64 = 200_000_000;

    fn create_test_oracle() -> PriceOracle {
        PriceOracle::new(ADMIN, OPERATOR, PRICE_200, 100).unwrap()
    }

    #[test]
    fn test_update_price_success() {
        let oracle = create_test_oracle();
        oracle.update_price(&OPERATOR, 210_000_000, 110).unwrap();

        let data = oracle.get_price().unwrap();
        assert_eq!(data.price, 210_000_000);
        assert_eq!(data.publish_time, 110);
        assert_eq!(oracle.drain_events().len(), 1);
    }

    #[test]
    fn test_update_price_too_large_deviation() {
        let oracle = create_test_oracle();
        // 50% drop exceeds the 25% bound
        let result = oracle.update_price(&OPERATOR, 100_000_000, 110);
        assert!(matches!(result, Err(VusdError::OraclePriceDeviation { .. })));
        assert_eq!(oracle.get_price().unwrap().price, PRICE_200);
    }

    #[test]
    fn test_update_price_unauthorized() {
        let oracle = create_test_oracle();
        let result = oracle.update_price(&[99u8; 32], PRICE_200, 110);
        assert!(matches!(result, Err(VusdError::Unauthorized { .. })));
    }

    #[test]
    fn test_update_price_rejects_zero_and_backwards_time() {
        let oracle = create_test_oracle();
        assert!(matches!(
            oracle.update_price(&OPERATOR, 0, 110),
            Err(VusdError::InvalidPrice { .. })
        ));
        assert!(matches!(
            oracle.update_price(&OPERATOR, PRICE_200, 99),
            Err(VusdError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_admin_reset_bypasses_deviation() {
        let oracle = create_test_oracle();
        assert_eq!(
            oracle.reset_price(&OPERATOR, 50_000_000, 120),
            Err(VusdError::AdminOnly)
        );
        oracle.reset_price(&ADMIN, 50_000_000, 120).unwrap();
        assert_eq!(oracle.get_price().unwrap().price, 50_000_000);
    }

    #[test]
    fn test_set_operator() {
        let oracle = create_test_oracle();
        let new_operator = [3u8; 32];

        assert_eq!(
            oracle.set_operator(&OPERATOR, &new_operator, 100),
            Err(VusdError::AdminOnly)
        );
        oracle.set_operator(&ADMIN, &new_operator, 100).unwrap();

        assert!(oracle.update_price(&OPERATOR, PRICE_200, 110).is_err());
        assert!(oracle.update_price(&new_operator, PRICE_200, 110).is_ok());
    }

    #[test]
    fn test_price_staleness() {
        let oracle = create_test_oracle();

        assert_eq!(fresh_price(&oracle, 160, 60).unwrap(), PRICE_200);
        assert!(matches!(
            fresh_price(&oracle, 161, 60),
            Err(VusdError::StalePriceFeed { .. })
        ));
    }

    #[test]
    fn test_new_rejects_zero_addresses() {
        assert!(PriceOracle::new([0u8; 32], OPERATOR, PRICE_200, 0).is_err());
        assert!(PriceOracle::new(ADMIN, OPERATOR, 0, 0).is_err());
    }
}
