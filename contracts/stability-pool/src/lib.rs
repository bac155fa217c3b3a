//! Stability Pool Contract
//!
//! First line of defense for the vUSD system.
//! Users deposit vUSD, absorb liquidated debt and earn the seized collateral.
//!
//! ## Lazy compounding
//!
//! Liquidations never touch individual deposits. The pool keeps a running
//! product `P` (how much of a deposit survives each offset) and a running sum
//! `S` per (epoch, scale) (collateral earned per unit deposited, weighted by
//! `P` and held at `P`'s precision). A deposit stores only a snapshot of both; its current value and
//! pending gain are derived on read.
//!
//! - `P` is rescaled by 1e9 and `scale` advanced when it would lose
//!   precision.
//! - An offset that empties the pool, or a withdrawal that leaves it at
//!   zero, starts a new epoch with `P` back at its base value.
//!
//! Every mutation is split into a `prepare_*` step that validates and
//! computes the new state without touching `self`, and an infallible
//! `apply_*` step, so a caller can run external side effects in between and
//! drop the update if they fail.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vusd_common::{
    constants::{
        precision::DECIMAL_PRECISION,
        stability_pool::{P_BASE, SCALE_FACTOR},
    },
    errors::{VusdError, VusdResult},
    math::{calculate_collateral_gain, calculate_compounded_deposit, mul_div, safe_add, safe_sub},
    types::{Address, StabilityDeposit, StabilityPoolState},
};

// ============ Receipts & Updates ============

/// What a depositor operation did, for the caller to settle and report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolReceipt {
    /// vUSD moved into (deposit) or out of (withdraw) the pool
    pub amount: u64,
    /// Depositor's effective balance afterwards
    pub remaining_deposit: u64,
    /// Collateral gain paid out to the depositor
    pub collateral_gain: u64,
    /// Pool total afterwards
    pub pool_total: u64,
}

/// Staged depositor operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolUpdate {
    depositor: Address,
    state: StabilityPoolState,
    deposit: Option<StabilityDeposit>,
    pub receipt: PoolReceipt,
}

/// Result of absorbing liquidated debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OffsetOutcome {
    pub debt_offset: u64,
    pub collateral_gained: u64,
    pub new_pool_total: u64,
    pub epoch: u64,
    pub scale: u64,
}

/// Staged offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetUpdate {
    state: StabilityPoolState,
    sum_key: (u64, u64),
    sum_value: u128,
    pub outcome: OffsetOutcome,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolStats {
    pub total_deposits: u64,
    pub total_collateral: u64,
    pub depositor_count: u64,
    pub product_p: u128,
    pub current_epoch: u64,
    pub current_scale: u64,
}

// ============ Stability Pool ============

/// Pool aggregates plus the arena of deposit snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StabilityPool {
    state: StabilityPoolState,
    deposits: BTreeMap<Address, StabilityDeposit>,
    /// S per (epoch, scale)
    epoch_to_scale_to_sum: BTreeMap<(u64, u64), u128>,
}

impl StabilityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StabilityPoolState {
        &self.state
    }

    pub fn deposit_of(&self, depositor: &Address) -> Option<&StabilityDeposit> {
        self.deposits.get(depositor)
    }

    /// Iterate over all deposit records
    pub fn deposits(&self) -> impl Iterator<Item = &StabilityDeposit> {
        self.deposits.values()
    }

    /// S accumulated at `(epoch, scale)`
    pub fn sum_at(&self, epoch: u64, scale: u64) -> u128 {
        self.epoch_to_scale_to_sum
            .get(&(epoch, scale))
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_deposits: self.state.total_deposits,
            total_collateral: self.state.total_collateral,
            depositor_count: self.state.depositor_count,
            product_p: self.state.product_p,
            current_epoch: self.state.current_epoch,
            current_scale: self.state.current_scale,
        }
    }

    /// Current value of a deposit after all offsets since its snapshot
    pub fn effective_deposit(&self, depositor: &Address) -> VusdResult<u64> {
        let Some(deposit) = self.deposits.get(depositor) else {
            return Ok(0);
        };
        let value = calculate_compounded_deposit(
            deposit.initial_value,
            deposit.snapshot_p,
            self.state.product_p,
            deposit.snapshot_scale,
            self.state.current_scale,
            deposit.snapshot_epoch,
            self.state.current_epoch,
        )?;
        Ok(value.min(self.state.total_deposits))
    }

    /// Collateral earned by a deposit since its snapshot
    pub fn pending_gain(&self, depositor: &Address) -> VusdResult<u64> {
        let Some(deposit) = self.deposits.get(depositor) else {
            return Ok(0);
        };
        let first_sum = self.sum_at(deposit.snapshot_epoch, deposit.snapshot_scale);
        let second_sum = self.sum_at(deposit.snapshot_epoch, deposit.snapshot_scale + 1);
        let gain = calculate_collateral_gain(
            deposit.initial_value,
            deposit.snapshot_p,
            deposit.snapshot_s,
            first_sum,
            second_sum,
        )?;
        Ok(gain.min(self.state.total_collateral))
    }

    // ============ Depositor Operations ============

    /// Stage a deposit of `amount`, paying out any pending gain
    pub fn prepare_deposit(&self, depositor: &Address, amount: u64, now: u64) -> VusdResult<PoolUpdate> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }

        // 2. Settle the existing position
        let effective = self.effective_deposit(depositor)?;
        let gain = self.pending_gain(depositor)?;
        let new_value = safe_add(effective, amount)?;

        // 3. Pool totals
        let mut state = self.state.clone();
        state.total_deposits = safe_add(state.total_deposits, amount)?;
        state.total_collateral = safe_sub(state.total_collateral, gain)?;

        let deposit = self.snapshot(depositor, new_value, now);
        Ok(self.staged(
            depositor,
            state,
            deposit,
            PoolReceipt {
                amount,
                remaining_deposit: new_value,
                collateral_gain: gain,
                pool_total: 0,
            },
        ))
    }

    /// Stage a withdrawal of `amount` of the effective balance, paying out
    /// any pending gain
    pub fn prepare_withdraw(&self, depositor: &Address, amount: u64, now: u64) -> VusdResult<PoolUpdate> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }

        // 2. Depositor must have a record
        if !self.deposits.contains_key(depositor) {
            return Err(VusdError::DepositNotFound { depositor: *depositor });
        }

        // 3. Cannot withdraw more than the effective balance
        let effective = self.effective_deposit(depositor)?;
        if amount > effective {
            return Err(VusdError::InsufficientPoolBalance {
                available: effective,
                required: amount,
            });
        }

        // 4. Settle
        let gain = self.pending_gain(depositor)?;
        let remaining = effective - amount;

        let mut state = self.state.clone();
        state.total_deposits = safe_sub(state.total_deposits, amount)?;
        state.total_collateral = safe_sub(state.total_collateral, gain)?;

        // 5. An empty pool starts a fresh epoch
        if state.total_deposits == 0 {
            Self::start_new_epoch(&mut state);
        }

        let deposit = self.snapshot(depositor, remaining, now);
        Ok(self.staged(
            depositor,
            state,
            deposit,
            PoolReceipt {
                amount,
                remaining_deposit: remaining,
                collateral_gain: gain,
                pool_total: 0,
            },
        ))
    }

    /// Stage paying out the pending gain without moving principal
    pub fn prepare_claim(&self, depositor: &Address, now: u64) -> VusdResult<PoolUpdate> {
        if !self.deposits.contains_key(depositor) {
            return Err(VusdError::DepositNotFound { depositor: *depositor });
        }

        let gain = self.pending_gain(depositor)?;
        if gain == 0 {
            return Err(VusdError::NoRewardsToClaim);
        }
        let effective = self.effective_deposit(depositor)?;

        let mut state = self.state.clone();
        state.total_collateral = safe_sub(state.total_collateral, gain)?;

        let deposit = self.snapshot(depositor, effective, now);
        Ok(self.staged(
            depositor,
            state,
            deposit,
            PoolReceipt {
                amount: 0,
                remaining_deposit: effective,
                collateral_gain: gain,
                pool_total: 0,
            },
        ))
    }

    /// Commit a staged depositor operation
    pub fn apply(&mut self, update: PoolUpdate) -> PoolReceipt {
        self.state = update.state;
        match update.deposit {
            Some(deposit) => {
                self.deposits.insert(update.depositor, deposit);
            }
            None => {
                self.deposits.remove(&update.depositor);
            }
        }
        update.receipt
    }

    pub fn deposit(&mut self, depositor: &Address, amount: u64, now: u64) -> VusdResult<PoolReceipt> {
        let update = self.prepare_deposit(depositor, amount, now)?;
        Ok(self.apply(update))
    }

    pub fn withdraw(&mut self, depositor: &Address, amount: u64, now: u64) -> VusdResult<PoolReceipt> {
        let update = self.prepare_withdraw(depositor, amount, now)?;
        Ok(self.apply(update))
    }

    pub fn claim_gain(&mut self, depositor: &Address, now: u64) -> VusdResult<PoolReceipt> {
        let update = self.prepare_claim(depositor, now)?;
        Ok(self.apply(update))
    }

    // ============ Offset ============

    /// Stage absorbing `debt` from a liquidation in exchange for `collateral`
    ///
    /// loss per unit is rounded up so depositors never withdraw more than
    /// the pool holds; both divisions carry their remainder into the next
    /// offset.
    pub fn prepare_offset(&self, debt: u64, collateral: u64) -> VusdResult<OffsetUpdate> {
        let total = self.state.total_deposits;

        // 1. Pool must cover the debt
        if debt == 0 {
            return Err(VusdError::ZeroAmount);
        }
        if debt > total {
            return Err(VusdError::InsufficientPoolBalance {
                available: total,
                required: debt,
            });
        }

        let mut state = self.state.clone();
        let total_u = total as u128;

        // 2. Per-unit rewards with error feedback
        let coll_numerator = (collateral as u128)
            .checked_mul(DECIMAL_PRECISION)
            .ok_or(VusdError::Overflow)?
            .checked_add(state.last_collateral_error)
            .ok_or(VusdError::Overflow)?;

        let loss_per_unit = if debt == total {
            state.last_debt_loss_error = 0;
            DECIMAL_PRECISION
        } else {
            let loss_numerator = (debt as u128)
                .checked_mul(DECIMAL_PRECISION)
                .ok_or(VusdError::Overflow)?
                .checked_sub(state.last_debt_loss_error)
                .ok_or(VusdError::Underflow)?;
            let per_unit = loss_numerator / total_u + 1;
            state.last_debt_loss_error = per_unit * total_u - loss_numerator;
            per_unit
        };

        let coll_gain_per_unit = coll_numerator / total_u;
        state.last_collateral_error = coll_numerator - coll_gain_per_unit * total_u;

        // 3. S for the current (epoch, scale), kept in collateral units per
        // deposit unit scaled by P so it stays in range at any price
        let sum_key = (state.current_epoch, state.current_scale);
        let marginal_gain = mul_div(coll_gain_per_unit, state.product_p, DECIMAL_PRECISION)?;
        let sum_value = self
            .sum_at(sum_key.0, sum_key.1)
            .checked_add(marginal_gain)
            .ok_or(VusdError::Overflow)?;

        // 4. P, scale and epoch
        let product_factor = DECIMAL_PRECISION - loss_per_unit.min(DECIMAL_PRECISION);
        if product_factor == 0 {
            Self::start_new_epoch(&mut state);
        } else {
            let scaled = state.product_p * product_factor;
            if scaled / DECIMAL_PRECISION < SCALE_FACTOR {
                state.product_p = scaled * SCALE_FACTOR / DECIMAL_PRECISION;
                state.current_scale += 1;
            } else {
                state.product_p = scaled / DECIMAL_PRECISION;
            }
        }

        // 5. Totals
        state.total_deposits = total - debt;
        state.total_collateral = safe_add(state.total_collateral, collateral)?;

        let outcome = OffsetOutcome {
            debt_offset: debt,
            collateral_gained: collateral,
            new_pool_total: state.total_deposits,
            epoch: state.current_epoch,
            scale: state.current_scale,
        };
        Ok(OffsetUpdate {
            state,
            sum_key,
            sum_value,
            outcome,
        })
    }

    /// Commit a staged offset
    pub fn apply_offset(&mut self, update: OffsetUpdate) -> OffsetOutcome {
        self.epoch_to_scale_to_sum.insert(update.sum_key, update.sum_value);
        self.state = update.state;
        update.outcome
    }

    pub fn offset(&mut self, debt: u64, collateral: u64) -> VusdResult<OffsetOutcome> {
        let update = self.prepare_offset(debt, collateral)?;
        Ok(self.apply_offset(update))
    }

    // ============ Internals ============

    fn start_new_epoch(state: &mut StabilityPoolState) {
        state.current_epoch += 1;
        state.current_scale = 0;
        state.product_p = P_BASE;
        state.last_debt_loss_error = 0;
    }

    /// Fresh snapshot at the current accumulators; `None` clears the record
    fn snapshot(&self, depositor: &Address, value: u64, now: u64) -> Option<StabilityDeposit> {
        if value == 0 {
            return None;
        }
        Some(StabilityDeposit {
            owner: *depositor,
            initial_value: value,
            snapshot_p: self.state.product_p,
            snapshot_s: self.sum_at(self.state.current_epoch, self.state.current_scale),
            snapshot_epoch: self.state.current_epoch,
            snapshot_scale: self.state.current_scale,
            last_updated: now,
        })
    }

    fn staged(
        &self,
        depositor: &Address,
        mut state: StabilityPoolState,
        deposit: Option<StabilityDeposit>,
        mut receipt: PoolReceipt,
    ) -> PoolUpdate {
        let existed = self.deposits.contains_key(depositor);
        match (existed, deposit.is_some()) {
            (false, true) => state.depositor_count += 1,
            (true, false) => state.depositor_count = state.depositor_count.saturating_sub(1),
            _ => {}
        }
        receipt.pool_total = state.total_deposits;
        PoolUpdate {
            depositor: *depositor,
            state,
            deposit,
            receipt,
        }
    }
}

// ============ Tests ============
