//! Read-only queries and the conservation check

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vusd_common::{
    errors::{VusdError, VusdResult},
    math::{calculate_cr, calculate_tcr, is_recovery_mode},
    oracle::PriceFeed,
    redistribution::with_pending_rewards,
    token_ops::AssetIssuer,
    types::{Address, GlobalLedger, SurplusClaim, Vault},
};
use vusd_stability_pool::{PoolStats, StabilityPool};

use crate::Protocol;

/// Consistent copy of every protocol record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ProtocolSnapshot {
    pub ledger: GlobalLedger,
    /// Stored vaults, pending redistribution not applied
    pub vaults: Vec<Vault>,
    pub pool: StabilityPool,
    pub surplus: BTreeMap<Address, SurplusClaim>,
}

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Copy every record under the full lock order
    pub fn snapshot(&self) -> ProtocolSnapshot {
        let pool = self.pool.lock();
        let vaults = self.vaults.read();
        let guards: Vec<_> = vaults.values().map(|handle| handle.lock()).collect();
        let ledger = self.ledger.lock();
        let surplus = self.surplus.lock();

        ProtocolSnapshot {
            ledger: ledger.clone(),
            vaults: guards.iter().map(|guard| (**guard).clone()).collect(),
            pool: pool.clone(),
            surplus: surplus.clone(),
        }
    }

    /// The vault of `owner` with pending redistribution applied
    pub fn vault(&self, owner: &Address) -> VusdResult<Vault> {
        let vaults = self.vaults.read();
        let vault = vaults
            .get(owner)
            .ok_or(VusdError::VaultNotFound { owner: *owner })?
            .lock();
        let ledger = self.ledger.lock();
        with_pending_rewards(&vault, &ledger)
    }

    /// Every vault, active and terminal, in owner order
    pub fn all_vaults(&self) -> VusdResult<Vec<Vault>> {
        let vaults = self.vaults.read();
        let guards: Vec<_> = vaults.values().map(|handle| handle.lock()).collect();
        let ledger = self.ledger.lock();
        guards
            .iter()
            .map(|vault| with_pending_rewards(vault, &ledger))
            .collect()
    }

    pub fn ledger(&self) -> GlobalLedger {
        self.ledger.lock().clone()
    }

    /// Collateral ratio of the vault of `owner` at the current price
    pub fn collateral_ratio(&self, owner: &Address, now: u64) -> VusdResult<u128> {
        let price = self.price(now)?;
        let vault = self.vault(owner)?;
        calculate_cr(vault.collateral, vault.debt, price)
    }

    /// Total collateral ratio at the current price
    pub fn tcr(&self, now: u64) -> VusdResult<u128> {
        let price = self.price(now)?;
        let ledger = self.ledger.lock();
        calculate_tcr(ledger.total_collateral, ledger.total_debt, price)
    }

    pub fn is_recovery_mode(&self, now: u64) -> VusdResult<bool> {
        Ok(is_recovery_mode(self.tcr(now)?, self.config.ccr))
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.lock().stats()
    }

    /// Compounded stability deposit of `depositor`
    pub fn effective_deposit(&self, depositor: &Address) -> VusdResult<u64> {
        self.pool.lock().effective_deposit(depositor)
    }

    /// Unclaimed collateral gain of `depositor`
    pub fn pending_gain(&self, depositor: &Address) -> VusdResult<u64> {
        self.pool.lock().pending_gain(depositor)
    }

    pub fn surplus_of(&self, owner: &Address) -> u64 {
        self.surplus
            .lock()
            .get(owner)
            .map_or(0, |claim| claim.collateral)
    }

    /// Verify that the ledger agrees with the vaults and the issuer
    ///
    /// Checks that stored vault totals plus undistributed rewards match the
    /// ledger, stakes add up, no active vault sits below the minimum debt, and
    /// the pool and gas pool accounts hold at least what they owe.
    pub fn check_invariants(&self) -> VusdResult<()> {
        let pool = self.pool.lock();
        let vaults = self.vaults.read();
        let guards: Vec<_> = vaults.values().map(|handle| handle.lock()).collect();
        let ledger = self.ledger.lock();

        let mut collateral = ledger.pending_redistributed_collateral;
        let mut debt = ledger.pending_redistributed_debt;
        let mut stakes = 0u64;
        let mut reserves = 0u64;
        let mut active = 0u64;
        for vault in guards.iter().filter(|vault| vault.is_active()) {
            collateral = checked(collateral, vault.collateral)?;
            debt = checked(debt, vault.debt)?;
            stakes = checked(stakes, vault.stake)?;
            reserves = checked(reserves, vault.liquidation_reserve)?;
            active += 1;

            if vault.debt > 0 && vault.debt < self.config.min_debt {
                return Err(VusdError::BelowMinimumDebt {
                    debt: vault.debt,
                    minimum: self.config.min_debt,
                });
            }
        }

        ensure_equal(collateral, ledger.total_collateral)?;
        ensure_equal(debt, ledger.total_debt)?;
        ensure_equal(stakes, ledger.total_stakes)?;
        ensure_equal(active, ledger.active_vault_count)?;

        let pool_balance = self.issuer.balance_of(&self.config.stability_pool_account);
        ensure_covered(pool_balance, pool.state().total_deposits)?;
        let gas_balance = self.issuer.balance_of(&self.config.gas_pool);
        ensure_covered(gas_balance, reserves)?;
        Ok(())
    }
}

fn checked(a: u64, b: u64) -> VusdResult<u64> {
    a.checked_add(b).ok_or(VusdError::Overflow)
}

fn ensure_equal(inputs: u64, outputs: u64) -> VusdResult<()> {
    if inputs != outputs {
        return Err(VusdError::ConservationViolated { inputs, outputs });
    }
    Ok(())
}

fn ensure_covered(held: u64, owed: u64) -> VusdResult<()> {
    if held < owed {
        return Err(VusdError::ConservationViolated {
            inputs: held,
            outputs: owed,
        });
    }
    Ok(())
}
