//! Redemption: vUSD for collateral at face value

use vusd_common::{
    errors::{VusdError, VusdResult},
    events::VusdEvent,
    math::{calculate_cr, collateral_for_value, safe_add, safe_sub},
    oracle::PriceFeed,
    redistribution::{apply_pending_rewards, update_stake},
    token_ops::AssetIssuer,
    types::{RedemptionResult, TokenAction},
};

use crate::{CallContext, Protocol};

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Burn up to `amount` vUSD from the caller against the riskiest
    /// healthy vaults, returning collateral at the oracle price minus the
    /// redemption fee
    ///
    /// Vaults are visited in ascending collateral ratio (owner address
    /// breaks ties), skipping those below MCR. A vault is never left with
    /// debt under the minimum: it is redeemed down to exactly the minimum,
    /// or skipped if it is already there. Unredeemed vUSD is not burned.
    pub fn redeem(&self, ctx: &CallContext, amount: u64) -> VusdResult<RedemptionResult> {
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }
        self.ensure_not_paused()?;
        let price = self.price(ctx.now)?;

        // Exclusive map access: no other vault operation is in flight
        let vaults = self.vaults.write();
        let mut guards: Vec<_> = vaults.values().map(|handle| handle.lock()).collect();
        let mut ledger_guard = self.unpaused_ledger()?;

        // 1. Stage every vault with its pending rewards applied
        let mut ledger = ledger_guard.clone();
        let mut staged = Vec::with_capacity(guards.len());
        for guard in guards.iter() {
            let mut vault = (**guard).clone();
            apply_pending_rewards(&mut vault, &mut ledger)?;
            staged.push(vault);
        }

        // 2. Order candidates by collateral ratio
        let mut order = Vec::new();
        for (index, vault) in staged.iter().enumerate() {
            if !vault.is_active() || vault.debt == 0 {
                continue;
            }
            let cr = calculate_cr(vault.collateral, vault.debt, price)?;
            if cr < self.config.mcr {
                continue;
            }
            order.push((cr, vault.owner, index));
        }
        order.sort_unstable();

        // 3. Walk and redeem
        let total_debt_before = ledger.total_debt;
        let mut result = RedemptionResult::default();
        let mut remaining = amount;

        for (_, _, index) in order {
            if remaining == 0 {
                break;
            }
            let vault = &mut staged[index];

            let mut take = remaining.min(vault.debt);
            let left = vault.debt - take;
            if left > 0 && left < self.config.min_debt {
                if vault.debt <= self.config.min_debt {
                    continue;
                }
                take = vault.debt - self.config.min_debt;
            }
            if take == 0 {
                continue;
            }

            let drawn = collateral_for_value(take as u128, price)?.min(vault.collateral);

            vault.debt -= take;
            vault.collateral -= drawn;
            vault.last_updated = ctx.now;
            update_stake(vault, &mut ledger)?;

            ledger.total_debt = safe_sub(ledger.total_debt, take)?;
            ledger.total_collateral = safe_sub(ledger.total_collateral, drawn)?;

            remaining -= take;
            result.redeemed = safe_add(result.redeemed, take)?;
            result.collateral_drawn = safe_add(result.collateral_drawn, drawn)?;
            result.vaults_affected += 1;
        }

        if result.redeemed == 0 {
            return Err(VusdError::NothingToRedeem);
        }

        // 4. Base rate steps before the fee is taken
        ledger
            .fee
            .record_fee_event(result.redeemed, total_debt_before, ctx.now)?;
        result.fee = ledger.fee.redemption_fee(result.collateral_drawn)?;
        ledger.redemption_fees_collected = safe_add(ledger.redemption_fees_collected, result.fee)?;

        // 5. Burn and commit
        self.settle(&[TokenAction::Burn {
            from: ctx.caller,
            amount: result.redeemed,
        }])?;

        for (guard, vault) in guards.iter_mut().zip(staged) {
            **guard = vault;
        }
        *ledger_guard = ledger;
        self.emit([
            VusdEvent::Redemption {
                redeemer: ctx.caller,
                redeemed: result.redeemed,
                collateral_drawn: result.collateral_drawn,
                fee: result.fee,
                vaults_affected: result.vaults_affected,
                timestamp: ctx.now,
            },
            VusdEvent::BaseRateUpdated {
                base_rate: ledger_guard.fee.base_rate,
                timestamp: ctx.now,
            },
        ]);

        Ok(result)
    }
}
