//! Liquidation and liquidation surplus claims

use vusd_common::{
    constants::liquidation::MAX_BATCH_SIZE,
    errors::{VusdError, VusdResult},
    events::VusdEvent,
    liquidation::{plan_liquidation, LiquidationContext},
    math::{calculate_tcr, is_recovery_mode, safe_add, safe_sub},
    oracle::PriceFeed,
    redistribution::{apply_pending_rewards, redistribute, update_stake},
    token_ops::AssetIssuer,
    types::{Address, LiquidationResult, TokenAction, VaultStatus},
};
use vusd_stability_pool::StabilityPool;

use crate::{CallContext, Protocol, VaultMap};

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Liquidate the vault of `owner`; any caller may do this and receives
    /// the vault's liquidation reserve
    pub fn liquidate(&self, ctx: &CallContext, owner: &Address) -> VusdResult<LiquidationResult> {
        self.ensure_not_paused()?;
        let price = self.price(ctx.now)?;

        let mut pool = self.pool.lock();
        let vaults = self.vaults.read();
        self.liquidate_locked(&mut pool, &vaults, ctx, owner, price)
    }

    /// Liquidate every eligible vault in `owners`, in order
    ///
    /// Ineligible vaults are skipped. Each liquidation commits on its own;
    /// any other error stops the batch after the ones already done.
    pub fn liquidate_batch(&self, ctx: &CallContext, owners: &[Address]) -> VusdResult<Vec<LiquidationResult>> {
        if owners.is_empty() || owners.len() > MAX_BATCH_SIZE {
            return Err(VusdError::InvalidInput {
                param: "owners",
                reason: "batch size out of range",
            });
        }
        self.ensure_not_paused()?;
        let price = self.price(ctx.now)?;

        let mut pool = self.pool.lock();
        let vaults = self.vaults.read();

        let mut results = Vec::new();
        let mut last_skip = None;
        for owner in owners {
            match self.liquidate_locked(&mut pool, &vaults, ctx, owner, price) {
                Ok(result) => results.push(result),
                Err(err @ (VusdError::NotLiquidatable { .. } | VusdError::VaultNotFound { .. })) => {
                    last_skip = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        match (results.is_empty(), last_skip) {
            (true, Some(err)) => Err(err),
            _ => Ok(results),
        }
    }

    /// Pay out the collateral left over from a recovery-mode liquidation
    pub fn claim_collateral_surplus(&self, ctx: &CallContext, owner: &Address) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        let _ledger = self.unpaused_ledger()?;
        let claim = self
            .surplus
            .lock()
            .remove(owner)
            .ok_or(VusdError::SurplusNotFound { owner: *owner })?;

        self.emit([VusdEvent::SurplusClaimed {
            owner: *owner,
            collateral: claim.collateral,
            timestamp: ctx.now,
        }]);
        Ok(claim.collateral)
    }

    fn liquidate_locked(
        &self,
        pool: &mut StabilityPool,
        vaults: &VaultMap,
        ctx: &CallContext,
        owner: &Address,
        price: u64,
    ) -> VusdResult<LiquidationResult> {
        let handle = vaults
            .get(owner)
            .ok_or(VusdError::VaultNotFound { owner: *owner })?;
        let mut vault_guard = handle.lock();
        let mut ledger_guard = self.unpaused_ledger()?;

        let mut vault = vault_guard.clone();
        let mut ledger = ledger_guard.clone();
        apply_pending_rewards(&mut vault, &mut ledger)?;

        // 1. Plan against current mode and pool balance
        let tcr = calculate_tcr(ledger.total_collateral, ledger.total_debt, price)?;
        let liquidation_ctx = LiquidationContext {
            price,
            recovery_mode: is_recovery_mode(tcr, self.config.ccr),
            pool_deposits: pool.state().total_deposits,
            mcr: self.config.mcr,
            ccr: self.config.ccr,
            sp_min_surplus_bps: self.config.sp_min_surplus_bps,
            now: ctx.now,
        };
        let plan = plan_liquidation(&vault, &liquidation_ctx)?;
        let redistributes = plan.needs_redistribution();
        let result = plan.result;

        // 2. Remove the vault from totals and stakes
        ledger.total_collateral = safe_sub(ledger.total_collateral, vault.collateral)?;
        ledger.total_debt = safe_sub(ledger.total_debt, vault.debt)?;
        ledger.active_vault_count = safe_sub(ledger.active_vault_count, 1)?;
        vault.status = VaultStatus::Liquidated;
        vault.collateral = 0;
        vault.debt = 0;
        vault.liquidation_reserve = 0;
        vault.last_updated = ctx.now;
        update_stake(&mut vault, &mut ledger)?;

        // 3. Whatever the pool cannot take goes back in as pending
        if redistributes {
            redistribute(&mut ledger, result.debt_redistributed, result.collateral_redistributed)?;
            ledger.total_debt = safe_add(ledger.total_debt, result.debt_redistributed)?;
            ledger.total_collateral = safe_add(ledger.total_collateral, result.collateral_redistributed)?;
        }

        // 4. Stage the pool offset
        let offset = if result.debt_offset > 0 {
            Some(pool.prepare_offset(result.debt_offset, result.collateral_to_sp)?)
        } else {
            None
        };

        // 5. Stage the surplus claim, merging with any unclaimed one
        let mut surplus = self.surplus.lock();
        let claim = match plan.surplus_claim {
            Some(mut claim) => {
                if let Some(existing) = surplus.get(owner) {
                    claim.collateral = safe_add(claim.collateral, existing.collateral)?;
                    claim.created_at = existing.created_at;
                }
                Some(claim)
            }
            None => None,
        };

        // 6. Burn the absorbed debt, pay the liquidator
        let mut actions = Vec::with_capacity(2);
        if result.debt_offset > 0 {
            actions.push(TokenAction::Burn {
                from: self.config.stability_pool_account,
                amount: result.debt_offset,
            });
        }
        if result.gas_compensation > 0 && ctx.caller != self.config.gas_pool {
            actions.push(TokenAction::Transfer {
                from: self.config.gas_pool,
                to: ctx.caller,
                amount: result.gas_compensation,
            });
        }
        self.settle(&actions)?;

        // 7. Commit
        let mut events = vec![VusdEvent::VaultLiquidated {
            vault_id: result.vault_id,
            owner: *owner,
            liquidator: ctx.caller,
            debt_offset: result.debt_offset,
            debt_redistributed: result.debt_redistributed,
            collateral_to_sp: result.collateral_to_sp,
            collateral_redistributed: result.collateral_redistributed,
            collateral_surplus: result.collateral_surplus,
            gas_compensation: result.gas_compensation,
            timestamp: ctx.now,
        }];
        if let Some(update) = offset {
            let outcome = pool.apply_offset(update);
            events.push(VusdEvent::LiquidationOffset {
                debt_offset: outcome.debt_offset,
                collateral_gained: outcome.collateral_gained,
                new_pool_total: outcome.new_pool_total,
                epoch: outcome.epoch,
                scale: outcome.scale,
                timestamp: ctx.now,
            });
        }
        if redistributes {
            events.push(VusdEvent::DebtRedistributed {
                debt: result.debt_redistributed,
                collateral: result.collateral_redistributed,
                l_debt: ledger.l_debt,
                l_collateral: ledger.l_collateral,
                timestamp: ctx.now,
            });
        }
        if let Some(claim) = claim {
            surplus.insert(*owner, claim);
        }
        *vault_guard = vault;
        *ledger_guard = ledger;
        self.emit(events);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ALICE, BOB, CAROL, ONE_SOL, ONE_VUSD};

    #[test]
    fn test_healthy_vault_not_liquidatable() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 1_000 * ONE_VUSD).unwrap();
        let before = h.protocol.snapshot();

        let result = h.protocol.liquidate(&h.ctx(CAROL), &ALICE);
        assert!(matches!(result, Err(VusdError::NotLiquidatable { .. })));
        assert_eq!(h.protocol.snapshot(), before);
    }

    #[test]
    fn test_debt_free_vault_not_liquidatable() {
        let h = Harness::new();
        h.open(ALICE, ONE_SOL);
        let result = h.protocol.liquidate(&h.ctx(CAROL), &ALICE);
        assert!(matches!(result, Err(VusdError::NotLiquidatable { .. })));
    }

    #[test]
    fn test_last_vault_cannot_be_redistributed() {
        let mut h = Harness::new();
        h.open(ALICE, 2 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 300 * ONE_VUSD).unwrap();
        h.set_price(100_000_000);

        let result = h.protocol.liquidate(&h.ctx(CAROL), &ALICE);
        assert_eq!(result, Err(VusdError::NoVaultsForRedistribution));
        assert!(h.protocol.vault(&ALICE).unwrap().is_active());
    }

    #[test]
    fn test_batch_skips_healthy_vaults() {
        let mut h = Harness::new();
        h.open(ALICE, 2 * ONE_SOL);
        h.open(BOB, 100 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 300 * ONE_VUSD).unwrap();
        h.protocol.borrow(&h.ctx(BOB), &BOB, 1_000 * ONE_VUSD).unwrap();
        h.set_price(150_000_000);

        let results = h
            .protocol
            .liquidate_batch(&h.ctx(CAROL), &[BOB, ALICE, [42u8; 32]])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].owner, ALICE);

        let result = h.protocol.liquidate_batch(&h.ctx(CAROL), &[BOB]);
        assert!(matches!(result, Err(VusdError::NotLiquidatable { .. })));
        assert!(h.protocol.liquidate_batch(&h.ctx(CAROL), &[]).is_err());
    }

    #[test]
    fn test_surplus_claim_requires_claim() {
        let h = Harness::new();
        let result = h.protocol.claim_collateral_surplus(&h.ctx(ALICE), &ALICE);
        assert_eq!(result, Err(VusdError::SurplusNotFound { owner: ALICE }));
    }
}
