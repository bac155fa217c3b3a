//! Oracle Module
//!
//! The price feed seam between the protocol core and whatever supplies the
//! collateral price. The core only asks for the latest `(price, publish_time)`
//! and rejects it when it is older than the configured freshness threshold.

use alloc::sync::Arc;

use crate::constants::{fees::BPS_DENOMINATOR, oracle};
use crate::errors::{VusdError, VusdResult};
use crate::types::PriceData;

/// Source of the current collateral price
pub trait PriceFeed {
    /// Latest price and the time it was published
    fn get_price(&self) -> VusdResult<PriceData>;
}

impl<T: PriceFeed + ?Sized> PriceFeed for &T {
    fn get_price(&self) -> VusdResult<PriceData> {
        (**self).get_price()
    }
}

impl<T: PriceFeed + ?Sized> PriceFeed for Arc<T> {
    fn get_price(&self) -> VusdResult<PriceData> {
        (**self).get_price()
    }
}

/// Read the feed and fail `StalePriceFeed` if the price is too old
pub fn fresh_price<F: PriceFeed + ?Sized>(feed: &F, now: u64, max_age: u64) -> VusdResult<u64> {
    let data = feed.get_price()?;
    if data.is_stale(now, max_age) {
        return Err(VusdError::StalePriceFeed {
            publish_time: data.publish_time,
            now,
            max_age,
        });
    }
    validate_price(data.price)?;
    Ok(data.price)
}

/// Reject zero and out-of-range prices
pub fn validate_price(price: u64) -> VusdResult<()> {
    if !(oracle::MIN_PRICE..=oracle::MAX_PRICE).contains(&price) {
        return Err(VusdError::InvalidPrice { price });
    }
    Ok(())
}

/// Absolute change from `old` to `new` in basis points of `old`
pub fn deviation_bps(old: u64, new: u64) -> u64 {
    if old == 0 {
        return u64::MAX;
    }
    let diff = old.abs_diff(new) as u128;
    let bps = diff * BPS_DENOMINATOR as u128 / old as u128;
    bps.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFeed(PriceData);

    impl PriceFeed for FixedFeed {
        fn get_price(&self) -> VusdResult<PriceData> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_fresh_price_accepts_recent() {
        let feed = FixedFeed(PriceData::new(200_000_000, 1_000));
        assert_eq!(fresh_price(&feed, 1_030, 60).unwrap(), 200_000_000);
    }

    #[test]
    fn test_fresh_price_rejects_stale() {
        let feed = FixedFeed(PriceData::new(200_000_000, 1_000));
        let err = fresh_price(&feed, 1_061, 60).unwrap_err();
        assert_eq!(
            err,
            VusdError::StalePriceFeed {
                publish_time: 1_000,
                now: 1_061,
                max_age: 60
            }
        );
    }

    #[test]
    fn test_fresh_price_through_arc() {
        let feed: Arc<dyn PriceFeed> = Arc::new(FixedFeed(PriceData::new(150_000_000, 5)));
        assert_eq!(fresh_price(&feed, 5, 60).unwrap(), 150_000_000);
    }

    #[test]
    fn test_validate_price_range() {
        assert!(validate_price(0).is_err());
        assert!(validate_price(oracle::MIN_PRICE).is_ok());
        assert!(validate_price(oracle::MAX_PRICE + 1).is_err());
    }

    #[test]
    fn test_deviation_bps() {
        assert_eq!(deviation_bps(100, 110), 1_000);
        assert_eq!(deviation_bps(100, 90), 1_000);
        assert_eq!(deviation_bps(100, 100), 0);
        assert_eq!(deviation_bps(0, 1), u64::MAX);
    }
}
