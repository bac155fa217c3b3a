//! Liquidation Planning
//!
//! Pure computation of how a liquidated vault's debt and collateral are
//! split. Nothing here mutates state; the vault manager applies the plan.
//!
//! ## Liquidation Flow
//!
//! ```text
//! CR < MCR (or < CCR in Recovery Mode)
//!                 │
//!                 ▼
//! ┌───────────────────────────────────────┐
//! │  STEP 1: Seize collateral             │
//! │  All of it, or only debt × MCR worth  │
//! │  in Recovery Mode when CR ≥ MCR       │
//! └───────────────┬───────────────────────┘
//!                 ▼
//! ┌───────────────────────────────────────┐
//! │  STEP 2: Offset against the pool      │
//! │  up to its balance, never paying      │
//! │  face value for less collateral value │
//! └───────────────┬───────────────────────┘
//!                 ▼
//! ┌───────────────────────────────────────┐
//! │  STEP 3: Redistribute the remainder   │
//! │  to every other staked vault          │
//! └───────────────┬───────────────────────┘
//!                 ▼
//! ┌───────────────────────────────────────┐
//! │  STEP 4: Reserve to the liquidator    │
//! └───────────────────────────────────────┘
//! ```

use crate::{
    constants::{fees::BPS_DENOMINATOR, precision::DECIMAL_PRECISION},
    errors::{VusdError, VusdResult},
    math::{
        add_bps_ceil, calculate_cr, collateral_for_value_ceil, collateral_value, is_liquidatable,
        mul_div, mul_div_ceil,
    },
    types::{LiquidationResult, SurplusClaim, Vault},
};

/// Market and pool conditions a liquidation is planned against
#[derive(Debug, Clone)]
pub struct LiquidationContext {
    /// Current collateral price (6 decimals)
    pub price: u64,
    /// Whether the system is in recovery mode
    pub recovery_mode: bool,
    /// vUSD available in the stability pool
    pub pool_deposits: u64,
    /// Minimum collateral ratio
    pub mcr: u128,
    /// Critical collateral ratio
    pub ccr: u128,
    /// Required margin of pool collateral value over debt offset
    pub sp_min_surplus_bps: u64,
    /// Current time
    pub now: u64,
}

/// A planned liquidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationPlan {
    /// Liquidation details
    pub result: LiquidationResult,
    /// Surplus claim created (if any)
    pub surplus_claim: Option<SurplusClaim>,
}

impl LiquidationPlan {
    /// Whether any debt or collateral goes to redistribution
    pub fn needs_redistribution(&self) -> bool {
        self.result.debt_redistributed > 0 || self.result.collateral_redistributed > 0
    }
}

/// Check if a vault can be liquidated
pub fn can_liquidate(vault: &Vault, ctx: &LiquidationContext) -> VusdResult<bool> {
    if !vault.is_active() || vault.debt == 0 {
        return Ok(false);
    }
    let cr = calculate_cr(vault.collateral, vault.debt, ctx.price)?;
    Ok(is_liquidatable(cr, ctx.recovery_mode, ctx.mcr, ctx.ccr))
}

/// Whether `collateral` is worth at least `debt_offset` plus the margin
fn meets_pool_floor(collateral: u64, debt_offset: u64, ctx: &LiquidationContext) -> VusdResult<bool> {
    let value = collateral_value(collateral, ctx.price)?;
    Ok(value >= add_bps_ceil(debt_offset, ctx.sp_min_surplus_bps)?)
}

/// Plan the liquidation of a vault whose pending rewards are already applied
pub fn plan_liquidation(vault: &Vault, ctx: &LiquidationContext) -> VusdResult<LiquidationPlan> {
    // 1. Verify vault can be liquidated
    let cr = calculate_cr(vault.collateral, vault.debt, ctx.price)?;
    if !can_liquidate(vault, ctx)? {
        return Err(VusdError::NotLiquidatable {
            owner: vault.owner,
            ratio: cr,
        });
    }

    let debt = vault.debt;
    let collateral = vault.collateral;

    // 2. Recovery mode with CR >= MCR seizes only debt * MCR worth
    let (seized, surplus) = if ctx.recovery_mode && cr >= ctx.mcr {
        let capped_value = mul_div_ceil(debt as u128, ctx.mcr, DECIMAL_PRECISION)?;
        let seized = collateral_for_value_ceil(capped_value, ctx.price)?.min(collateral);
        (seized, collateral - seized)
    } else {
        (collateral, 0)
    };

    // 3. Offset against the pool, proportional split first
    let mut debt_offset = debt.min(ctx.pool_deposits);
    let mut collateral_to_sp = if debt_offset == debt {
        seized
    } else {
        mul_div(seized as u128, debt_offset as u128, debt as u128)? as u64
    };

    // 4. The pool only absorbs what the seized collateral covers
    if debt_offset > 0 && !meets_pool_floor(collateral_to_sp, debt_offset, ctx)? {
        let seized_value = collateral_value(seized, ctx.price)?;
        let denom = BPS_DENOMINATOR as u128 + ctx.sp_min_surplus_bps as u128;
        let coverable = mul_div(seized_value, BPS_DENOMINATOR as u128, denom)?;
        debt_offset = (debt_offset as u128).min(coverable) as u64;
        collateral_to_sp = if debt_offset == 0 {
            0
        } else {
            let required = add_bps_ceil(debt_offset, ctx.sp_min_surplus_bps)?;
            collateral_for_value_ceil(required, ctx.price)?.min(seized)
        };
    }

    let result = LiquidationResult {
        owner: vault.owner,
        vault_id: vault.id,
        debt_offset,
        debt_redistributed: debt - debt_offset,
        collateral_to_sp,
        collateral_redistributed: seized - collateral_to_sp,
        collateral_surplus: surplus,
        gas_compensation: vault.liquidation_reserve,
    };

    let surplus_claim = if surplus > 0 {
        Some(SurplusClaim::new(vault.owner, surplus, vault.id, ctx.now))
    } else {
        None
    };

    Ok(LiquidationPlan {
        result,
        surplus_claim,
    })
}
