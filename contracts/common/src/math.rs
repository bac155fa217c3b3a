//! Mathematical Utilities for the vUSD Protocol
//!
//! Checked fixed-point arithmetic and the financial formulas built on it.
//! Ratios are 18-decimal fixed point; `u128::MAX` stands for an infinite
//! collateral ratio.

use crate::constants::{collateral, fees, precision::DECIMAL_PRECISION, stability_pool};
use crate::errors::{VusdError, VusdResult};

/// `a * b / c` rounded down, without overflowing on the intermediate
/// product as long as `(a % c) * b` fits.
pub fn mul_div(a: u128, b: u128, c: u128) -> VusdResult<u128> {
    if c == 0 {
        return Err(VusdError::DivisionByZero);
    }
    let whole = (a / c).checked_mul(b).ok_or(VusdError::Overflow)?;
    let part = (a % c).checked_mul(b).ok_or(VusdError::Overflow)? / c;
    whole.checked_add(part).ok_or(VusdError::Overflow)
}

/// `a * b / c` rounded up
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> VusdResult<u128> {
    let floor = mul_div(a, b, c)?;
    // (a / c) * b * c divides evenly, so only the low part can leave a remainder
    let rem = (a % c).checked_mul(b).ok_or(VusdError::Overflow)? % c;
    if rem == 0 {
        Ok(floor)
    } else {
        floor.checked_add(1).ok_or(VusdError::Overflow)
    }
}

/// USD value (vUSD base units) of a collateral amount at `price`
///
/// value = collateral * price / 1e9
pub fn collateral_value(collateral_amount: u64, price: u64) -> VusdResult<u128> {
    mul_div(collateral_amount as u128, price as u128, collateral::ONE as u128)
}

/// Collateral worth `value` vUSD at `price`, rounded down
pub fn collateral_for_value(value: u128, price: u64) -> VusdResult<u64> {
    let amount = mul_div(value, collateral::ONE as u128, price as u128)?;
    u64::try_from(amount).map_err(|_| VusdError::Overflow)
}

/// Collateral worth `value` vUSD at `price`, rounded up
pub fn collateral_for_value_ceil(value: u128, price: u64) -> VusdResult<u64> {
    let amount = mul_div_ceil(value, collateral::ONE as u128, price as u128)?;
    u64::try_from(amount).map_err(|_| VusdError::Overflow)
}

/// Collateral ratio of a position
///
/// CR = collateral * price * 1e9 / debt, i.e. value / debt in 1e18 units.
/// Zero debt yields `u128::MAX`.
pub fn calculate_cr(collateral_amount: u64, debt: u64, price: u64) -> VusdResult<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }
    let raw = (collateral_amount as u128) * (price as u128);
    let scale = DECIMAL_PRECISION / collateral::ONE as u128;
    match mul_div(raw, scale, debt as u128) {
        Ok(cr) => Ok(cr),
        // Ratio too large to represent is as good as infinite
        Err(VusdError::Overflow) => Ok(u128::MAX),
        Err(e) => Err(e),
    }
}

/// Total collateral ratio for the entire system
pub fn calculate_tcr(total_collateral: u64, total_debt: u64, price: u64) -> VusdResult<u128> {
    calculate_cr(total_collateral, total_debt, price)
}

/// Recovery mode is a pure function of the current TCR
pub fn is_recovery_mode(tcr: u128, ccr: u128) -> bool {
    tcr < ccr
}

/// Ratio a vault must hold after borrowing or withdrawing
pub fn required_ratio(recovery_mode: bool, mcr: u128, ccr: u128) -> u128 {
    if recovery_mode {
        ccr
    } else {
        mcr
    }
}

/// Check if a vault is liquidatable
///
/// Normal mode: CR < MCR. Recovery mode: CR < CCR.
pub fn is_liquidatable(cr: u128, recovery_mode: bool, mcr: u128, ccr: u128) -> bool {
    cr < required_ratio(recovery_mode, mcr, ccr)
}

/// `amount * (10_000 + bps) / 10_000`, rounded up
pub fn add_bps_ceil(amount: u64, bps: u64) -> VusdResult<u128> {
    let denom = fees::BPS_DENOMINATOR as u128;
    let factor = denom.checked_add(bps as u128).ok_or(VusdError::Overflow)?;
    mul_div_ceil(amount as u128, factor, denom)
}

/// Fixed-point multiply of two 1e18 values, rounded half up
pub fn dec_mul(x: u128, y: u128) -> VusdResult<u128> {
    let prod = x.checked_mul(y).ok_or(VusdError::Overflow)?;
    Ok(prod
        .checked_add(DECIMAL_PRECISION / 2)
        .ok_or(VusdError::Overflow)?
        / DECIMAL_PRECISION)
}

/// `base ^ exponent` for a 1e18 base, by repeated squaring
///
/// Callers cap the exponent; `base` must be at most 1e18.
pub fn dec_pow(base: u128, exponent: u64) -> VusdResult<u128> {
    if exponent == 0 {
        return Ok(DECIMAL_PRECISION);
    }

    let mut y = DECIMAL_PRECISION;
    let mut x = base;
    let mut n = exponent;

    while n > 1 {
        if n % 2 == 0 {
            x = dec_mul(x, x)?;
            n /= 2;
        } else {
            y = dec_mul(x, y)?;
            x = dec_mul(x, x)?;
            n = (n - 1) / 2;
        }
    }

    dec_mul(x, y)
}

/// Calculate compounded deposit value in the stability pool
///
/// Zero if the epoch changed since the snapshot or P was rescaled more than
/// once; amounts below a billionth of the initial value are treated as zero.
pub fn calculate_compounded_deposit(
    initial_deposit: u64,
    snapshot_p: u128,
    current_p: u128,
    snapshot_scale: u64,
    current_scale: u64,
    snapshot_epoch: u64,
    current_epoch: u64,
) -> VusdResult<u64> {
    if initial_deposit == 0 || current_epoch > snapshot_epoch {
        return Ok(0);
    }
    if snapshot_p == 0 {
        return Err(VusdError::DivisionByZero);
    }

    let scale_diff = current_scale.saturating_sub(snapshot_scale);
    let compounded = match scale_diff {
        0 => mul_div(initial_deposit as u128, current_p, snapshot_p)?,
        1 => mul_div(initial_deposit as u128, current_p, snapshot_p)? / stability_pool::SCALE_FACTOR,
        _ => 0,
    };

    if compounded < initial_deposit as u128 / stability_pool::SCALE_FACTOR {
        return Ok(0);
    }

    u64::try_from(compounded).map_err(|_| VusdError::Overflow)
}

/// Calculate the collateral gain accrued on a stability deposit
///
/// `first_sum` is S at the snapshot's (epoch, scale), `second_sum` is S at
/// the following scale; gains from later scales are negligible. S carries
/// the same precision as P, so gain = deposit * ΔS / P_snapshot.
pub fn calculate_collateral_gain(
    initial_deposit: u64,
    snapshot_p: u128,
    snapshot_s: u128,
    first_sum: u128,
    second_sum: u128,
) -> VusdResult<u64> {
    if initial_deposit == 0 {
        return Ok(0);
    }
    if snapshot_p == 0 {
        return Err(VusdError::DivisionByZero);
    }

    let first_portion = first_sum.checked_sub(snapshot_s).ok_or(VusdError::Underflow)?;
    let second_portion = second_sum / stability_pool::SCALE_FACTOR;
    let sum_diff = first_portion
        .checked_add(second_portion)
        .ok_or(VusdError::Overflow)?;

    let gain = mul_div(sum_diff, initial_deposit as u128, snapshot_p)?;
    u64::try_from(gain).map_err(|_| VusdError::Overflow)
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> VusdResult<u64> {
    a.checked_add(b).ok_or(VusdError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> VusdResult<u64> {
    a.checked_sub(b).ok_or(VusdError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ratios, time};

    const SOL_PRICE_200: u64 = 200_000_000; // $200
    const ONE_SOL: u64 = 1_000_000_000;
    const ONE_VUSD: u64 = 1_000_000;

    #[test]
    fn test_cr_calculation() {
        // 10 SOL ($2000) backing 1000 vUSD = 200%
        let cr = calculate_cr(10 * ONE_SOL, 1_000 * ONE_VUSD, SOL_PRICE_200).unwrap();
        assert_eq!(cr, 2 * DECIMAL_PRECISION);

        // 10 SOL backing 2000 vUSD = 100%
        let cr = calculate_cr(10 * ONE_SOL, 2_000 * ONE_VUSD, SOL_PRICE_200).unwrap();
        assert_eq!(cr, DECIMAL_PRECISION);

        // 11 SOL backing 2000 vUSD = 110%, exactly MCR
        let cr = calculate_cr(11 * ONE_SOL, 2_000 * ONE_VUSD, SOL_PRICE_200).unwrap();
        assert_eq!(cr, ratios::MCR);
    }

    #[test]
    fn test_cr_zero_debt_is_infinite() {
        let cr = calculate_cr(ONE_SOL, 0, SOL_PRICE_200).unwrap();
        assert_eq!(cr, u128::MAX);
    }

    #[test]
    fn test_cr_saturates_on_huge_ratio() {
        let cr = calculate_cr(u64::MAX, 1, u64::MAX).unwrap();
        assert_eq!(cr, u128::MAX);
    }

    #[test]
    fn test_liquidatable() {
        let pct = |p: u128| p * DECIMAL_PRECISION / 100;

        // Normal mode
        assert!(is_liquidatable(pct(105), false, ratios::MCR, ratios::CCR));
        assert!(is_liquidatable(pct(109), false, ratios::MCR, ratios::CCR));
        assert!(!is_liquidatable(pct(110), false, ratios::MCR, ratios::CCR));
        assert!(!is_liquidatable(pct(140), false, ratios::MCR, ratios::CCR));

        // Recovery mode
        assert!(is_liquidatable(pct(140), true, ratios::MCR, ratios::CCR));
        assert!(is_liquidatable(pct(149), true, ratios::MCR, ratios::CCR));
        assert!(!is_liquidatable(pct(150), true, ratios::MCR, ratios::CCR));
    }

    #[test]
    fn test_recovery_mode() {
        assert!(!is_recovery_mode(2 * DECIMAL_PRECISION, ratios::CCR));
        assert!(!is_recovery_mode(ratios::CCR, ratios::CCR));
        assert!(is_recovery_mode(ratios::CCR - 1, ratios::CCR));
        assert!(!is_recovery_mode(u128::MAX, ratios::CCR));
    }

    #[test]
    fn test_collateral_value_round_trip() {
        let value = collateral_value(10 * ONE_SOL, SOL_PRICE_200).unwrap();
        assert_eq!(value, 2_000 * ONE_VUSD as u128);
        assert_eq!(collateral_for_value(value, SOL_PRICE_200).unwrap(), 10 * ONE_SOL);
    }

    #[test]
    fn test_collateral_for_value_rounding() {
        // $1 at $3/unit is 0.333.. units
        let floor = collateral_for_value(ONE_VUSD as u128, 3_000_000).unwrap();
        let ceil = collateral_for_value_ceil(ONE_VUSD as u128, 3_000_000).unwrap();
        assert_eq!(floor, 333_333_333);
        assert_eq!(ceil, 333_333_334);
        // Exact division does not round up
        assert_eq!(collateral_for_value_ceil(2_000 * ONE_VUSD as u128, SOL_PRICE_200).unwrap(), 10 * ONE_SOL);
    }

    #[test]
    fn test_mul_div_large_intermediate() {
        // a * b overflows u128 but the result does not
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 8).unwrap(), a / 2);
        assert_eq!(mul_div(1, 1, 0), Err(VusdError::DivisionByZero));
    }

    #[test]
    fn test_add_bps_ceil() {
        assert_eq!(add_bps_ceil(1_000, 0).unwrap(), 1_000);
        assert_eq!(add_bps_ceil(1_000, 1_000).unwrap(), 1_100);
        assert_eq!(add_bps_ceil(1, 1).unwrap(), 2);
    }

    #[test]
    fn test_dec_pow() {
        let half = DECIMAL_PRECISION / 2;
        assert_eq!(dec_pow(half, 0).unwrap(), DECIMAL_PRECISION);
        assert_eq!(dec_pow(half, 1).unwrap(), half);
        assert_eq!(dec_pow(half, 3).unwrap(), DECIMAL_PRECISION / 8);

        // 720 minutes of decay halves the rate (within rounding)
        let decayed = dec_pow(time::MINUTE_DECAY_FACTOR, 720).unwrap();
        let diff = decayed.abs_diff(half);
        assert!(diff < 1_000_000_000, "decay after 12h was {}", decayed);
    }

    #[test]
    fn test_compounded_deposit_same_scale() {
        // P halved since snapshot: deposit halves
        let value = calculate_compounded_deposit(
            1_000 * ONE_VUSD,
            DECIMAL_PRECISION,
            DECIMAL_PRECISION / 2,
            0,
            0,
            0,
            0,
        )
        .unwrap();
        assert_eq!(value, 500 * ONE_VUSD);
    }

    #[test]
    fn test_compounded_deposit_epoch_and_scale_changes() {
        let epoch_changed =
            calculate_compounded_deposit(1_000, DECIMAL_PRECISION, DECIMAL_PRECISION, 0, 0, 0, 1).unwrap();
        assert_eq!(epoch_changed, 0);

        let two_scales =
            calculate_compounded_deposit(1_000, DECIMAL_PRECISION, DECIMAL_PRECISION, 0, 2, 0, 0).unwrap();
        assert_eq!(two_scales, 0);

        // One scale change: P was multiplied by 1e9 once
        let one_scale = calculate_compounded_deposit(
            1_000 * ONE_VUSD,
            1_000_000_000,
            DECIMAL_PRECISION / 2,
            0,
            1,
            0,
            0,
        )
        .unwrap();
        assert_eq!(one_scale, 500 * ONE_VUSD);

        // Below a billionth of the initial value rounds to zero
        let dust = calculate_compounded_deposit(
            1_000 * ONE_VUSD,
            DECIMAL_PRECISION,
            DECIMAL_PRECISION / 2,
            0,
            1,
            0,
            0,
        )
        .unwrap();
        assert_eq!(dust, 0);
    }

    #[test]
    fn test_collateral_gain() {
        // S grew by 0.5 collateral unit per vUSD unit at P = 1
        let s = DECIMAL_PRECISION / 2;
        let gain = calculate_collateral_gain(1_000, DECIMAL_PRECISION, 0, s, 0).unwrap();
        assert_eq!(gain, 500);

        let none = calculate_collateral_gain(1_000, DECIMAL_PRECISION, s, s, 0).unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_safe_math() {
        assert_eq!(safe_add(1, 2).unwrap(), 3);
        assert_eq!(safe_add(u64::MAX, 1), Err(VusdError::Overflow));
        assert_eq!(safe_sub(1, 2), Err(VusdError::Underflow));
    }
}
