//! One-time fee model
//!
//! A base rate that decays toward zero with a 12 hour half-life and steps up
//! on every issuance or redemption in proportion to the share of total debt
//! moved. Borrowers pay `amount * clamp(base + 0.5%, 0.5%, 5%)` once; the
//! debt never accrues further.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{fees, precision::DECIMAL_PRECISION, time};
use crate::errors::{VusdError, VusdResult};
use crate::math::{dec_mul, dec_pow, mul_div};

/// Base rate and the time it was last brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FeeModel {
    /// Base rate (1e18 = 100%)
    pub base_rate: u128,
    /// Minute-aligned time of the last fee operation
    pub last_fee_operation_time: u64,
}

impl FeeModel {
    pub fn new(now: u64) -> Self {
        Self {
            base_rate: 0,
            last_fee_operation_time: now,
        }
    }

    /// Whole minutes since the last fee operation, capped at one year
    pub fn minutes_passed(&self, now: u64) -> u64 {
        (now.saturating_sub(self.last_fee_operation_time) / time::SECONDS_PER_MINUTE)
            .min(time::MAX_DECAY_MINUTES)
    }

    /// Base rate after decay up to `now`
    pub fn decayed_base_rate(&self, now: u64) -> VusdResult<u128> {
        let factor = dec_pow(time::MINUTE_DECAY_FACTOR, self.minutes_passed(now))?;
        dec_mul(self.base_rate, factor)
    }

    /// Borrowing rate at `now`: decayed base rate plus the floor, capped
    pub fn borrowing_rate(&self, now: u64) -> VusdResult<u128> {
        let rate = self
            .decayed_base_rate(now)?
            .checked_add(fees::BORROWING_FEE_FLOOR)
            .ok_or(VusdError::Overflow)?;
        Ok(rate.clamp(fees::BORROWING_FEE_FLOOR, fees::BORROWING_FEE_CAP))
    }

    /// One-time fee charged on a borrow of `amount`
    pub fn borrowing_fee(&self, amount: u64, now: u64) -> VusdResult<u64> {
        let fee = mul_div(amount as u128, self.borrowing_rate(now)?, DECIMAL_PRECISION)?;
        u64::try_from(fee).map_err(|_| VusdError::Overflow)
    }

    /// Redemption rate for the current (already updated) base rate
    pub fn redemption_rate(&self) -> u128 {
        self.base_rate
            .saturating_add(fees::REDEMPTION_FEE_FLOOR)
            .min(DECIMAL_PRECISION)
    }

    /// Redemption fee on `collateral_drawn`, in collateral
    pub fn redemption_fee(&self, collateral_drawn: u64) -> VusdResult<u64> {
        let fee = mul_div(collateral_drawn as u128, self.redemption_rate(), DECIMAL_PRECISION)?;
        // A fee can never exceed what was drawn
        Ok(u64::try_from(fee).map_err(|_| VusdError::Overflow)?.min(collateral_drawn))
    }

    /// Decay to `now`, then step the base rate by `0.5 * amount / total_debt`
    ///
    /// `total_debt` is the system debt the moved amount is measured against;
    /// zero means the amount is the whole system and steps by the full half.
    pub fn record_fee_event(&mut self, amount: u64, total_debt: u64, now: u64) -> VusdResult<()> {
        let decayed = self.decayed_base_rate(now)?;

        let fraction = if total_debt == 0 {
            DECIMAL_PRECISION
        } else {
            mul_div(amount as u128, DECIMAL_PRECISION, total_debt as u128)?.min(DECIMAL_PRECISION)
        };
        let step = fraction / fees::BETA;

        self.base_rate = decayed
            .checked_add(step)
            .ok_or(VusdError::Overflow)?
            .min(fees::MAX_BASE_RATE);
        self.touch(now);
        Ok(())
    }

    /// Advance the fee clock by the whole minutes elapsed
    fn touch(&mut self, now: u64) {
        let minutes = now.saturating_sub(self.last_fee_operation_time) / time::SECONDS_PER_MINUTE;
        if minutes > 0 {
            self.last_fee_operation_time = self
                .last_fee_operation_time
                .saturating_add(minutes.saturating_mul(time::SECONDS_PER_MINUTE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_VUSD: u64 = 1_000_000;
    const PERCENT: u128 = DECIMAL_PRECISION / 100;

    #[test]
    fn test_fee_floor_with_zero_base_rate() {
        let model = FeeModel::new(0);
        // 1000 vUSD at 0.5% = 5 vUSD
        assert_eq!(model.borrowing_fee(1_000 * ONE_VUSD, 0).unwrap(), 5 * ONE_VUSD);
    }

    #[test]
    fn test_fee_cap() {
        let model = FeeModel {
            base_rate: 20 * PERCENT,
            last_fee_operation_time: 0,
        };
        // 1000 vUSD capped at 5% = 50 vUSD
        assert_eq!(model.borrowing_fee(1_000 * ONE_VUSD, 0).unwrap(), 50 * ONE_VUSD);
    }

    #[test]
    fn test_fee_between_floor_and_cap() {
        let model = FeeModel {
            base_rate: PERCENT,
            last_fee_operation_time: 0,
        };
        // 1% + 0.5% = 1.5%
        assert_eq!(model.borrowing_fee(1_000 * ONE_VUSD, 0).unwrap(), 15 * ONE_VUSD);
    }

    #[test]
    fn test_base_rate_half_life() {
        let model = FeeModel {
            base_rate: 4 * PERCENT,
            last_fee_operation_time: 0,
        };
        let decayed = model.decayed_base_rate(time::BASE_RATE_HALF_LIFE_SECS).unwrap();
        assert!(decayed.abs_diff(2 * PERCENT) < PERCENT / 1_000_000);

        // Less than a minute does not decay
        assert_eq!(model.decayed_base_rate(59).unwrap(), 4 * PERCENT);
    }

    #[test]
    fn test_step_proportional_to_fraction() {
        let mut model = FeeModel::new(0);
        // Moving 10% of total debt adds 5%
        model.record_fee_event(100, 1_000, 0).unwrap();
        assert_eq!(model.base_rate, 5 * PERCENT);
    }

    #[test]
    fn test_step_capped_at_max() {
        let mut model = FeeModel {
            base_rate: fees::MAX_BASE_RATE,
            last_fee_operation_time: 0,
        };
        model.record_fee_event(1_000, 1_000, 0).unwrap();
        assert_eq!(model.base_rate, fees::MAX_BASE_RATE);
    }

    #[test]
    fn test_clock_advances_in_whole_minutes() {
        let mut model = FeeModel::new(1_000);
        model.record_fee_event(1, 1_000, 1_150).unwrap();
        // 150s = 2 whole minutes
        assert_eq!(model.last_fee_operation_time, 1_120);

        model.record_fee_event(1, 1_000, 1_130).unwrap();
        assert_eq!(model.last_fee_operation_time, 1_120);
    }

    #[test]
    fn test_redemption_rate_and_fee() {
        let model = FeeModel {
            base_rate: PERCENT,
            last_fee_operation_time: 0,
        };
        assert_eq!(model.redemption_rate(), PERCENT + PERCENT / 2);
        assert_eq!(model.redemption_fee(1_000_000).unwrap(), 15_000);

        let saturated = FeeModel {
            base_rate: fees::MAX_BASE_RATE,
            last_fee_operation_time: 0,
        };
        assert_eq!(saturated.redemption_rate(), DECIMAL_PRECISION);
        assert_eq!(saturated.redemption_fee(1_000).unwrap(), 1_000);
    }
}
