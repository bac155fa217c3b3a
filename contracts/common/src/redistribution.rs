//! Debt and collateral redistribution
//!
//! Liquidated debt the stability pool cannot absorb is spread over every
//! staked vault through two per-unit-stake accumulators on the ledger, so a
//! liquidation costs O(1) regardless of how many vaults exist. Each vault
//! snapshots the accumulators and picks up its share lazily, the next time
//! an operation touches it.
//!
//! Only vaults carrying debt hold stake. A debt-free vault therefore never
//! receives redistributed debt, which keeps every vault's debt either zero
//! or at least the minimum.

use crate::constants::precision::DECIMAL_PRECISION;
use crate::errors::{VusdError, VusdResult};
use crate::math::mul_div;
use crate::types::{GlobalLedger, Vault};

/// Rewards owed to `vault` since its last snapshot, as (collateral, debt)
pub fn pending_rewards(vault: &Vault, ledger: &GlobalLedger) -> VusdResult<(u64, u64)> {
    if vault.stake == 0 || !vault.is_active() {
        return Ok((0, 0));
    }

    let coll_diff = ledger
        .l_collateral
        .checked_sub(vault.snapshot_l_collateral)
        .ok_or(VusdError::Underflow)?;
    let debt_diff = ledger
        .l_debt
        .checked_sub(vault.snapshot_l_debt)
        .ok_or(VusdError::Underflow)?;

    let coll = mul_div(vault.stake as u128, coll_diff, DECIMAL_PRECISION)?;
    let debt = mul_div(vault.stake as u128, debt_diff, DECIMAL_PRECISION)?;

    Ok((
        u64::try_from(coll).map_err(|_| VusdError::Overflow)?,
        u64::try_from(debt).map_err(|_| VusdError::Overflow)?,
    ))
}

/// Move the vault's pending share out of the ledger's pending pool into the
/// vault and refresh its snapshots
pub fn apply_pending_rewards(vault: &mut Vault, ledger: &mut GlobalLedger) -> VusdResult<()> {
    let (coll, debt) = pending_rewards(vault, ledger)?;

    if coll > 0 || debt > 0 {
        vault.collateral = vault.collateral.checked_add(coll).ok_or(VusdError::Overflow)?;
        vault.debt = vault.debt.checked_add(debt).ok_or(VusdError::Overflow)?;
        ledger.pending_redistributed_collateral = ledger
            .pending_redistributed_collateral
            .checked_sub(coll)
            .ok_or(VusdError::Underflow)?;
        ledger.pending_redistributed_debt = ledger
            .pending_redistributed_debt
            .checked_sub(debt)
            .ok_or(VusdError::Underflow)?;
    }

    vault.snapshot_l_collateral = ledger.l_collateral;
    vault.snapshot_l_debt = ledger.l_debt;
    Ok(())
}

/// Copy of the vault with pending rewards applied, ledger untouched
pub fn with_pending_rewards(vault: &Vault, ledger: &GlobalLedger) -> VusdResult<Vault> {
    let (coll, debt) = pending_rewards(vault, ledger)?;
    let mut preview = vault.clone();
    preview.collateral = preview.collateral.checked_add(coll).ok_or(VusdError::Overflow)?;
    preview.debt = preview.debt.checked_add(debt).ok_or(VusdError::Overflow)?;
    Ok(preview)
}

/// Recompute the vault's stake from its current position
pub fn update_stake(vault: &mut Vault, ledger: &mut GlobalLedger) -> VusdResult<()> {
    let new_stake = if vault.is_active() && vault.debt > 0 {
        vault.collateral
    } else {
        0
    };

    ledger.total_stakes = ledger
        .total_stakes
        .checked_sub(vault.stake)
        .ok_or(VusdError::Underflow)?
        .checked_add(new_stake)
        .ok_or(VusdError::Overflow)?;
    vault.stake = new_stake;
    Ok(())
}

/// Spread `debt` and `collateral` over all staked vaults
///
/// The caller removes the liquidated vault's stake first. Division remainders
/// are carried into the next redistribution.
pub fn redistribute(ledger: &mut GlobalLedger, debt: u64, collateral: u64) -> VusdResult<()> {
    if debt == 0 && collateral == 0 {
        return Ok(());
    }
    if ledger.total_stakes == 0 {
        return Err(VusdError::NoVaultsForRedistribution);
    }

    let stakes = ledger.total_stakes as u128;

    let coll_numerator = (collateral as u128)
        .checked_mul(DECIMAL_PRECISION)
        .and_then(|n| n.checked_add(ledger.last_collateral_error))
        .ok_or(VusdError::Overflow)?;
    let debt_numerator = (debt as u128)
        .checked_mul(DECIMAL_PRECISION)
        .and_then(|n| n.checked_add(ledger.last_debt_error))
        .ok_or(VusdError::Overflow)?;

    let coll_per_stake = coll_numerator / stakes;
    let debt_per_stake = debt_numerator / stakes;

    ledger.last_collateral_error = coll_numerator - coll_per_stake * stakes;
    ledger.last_debt_error = debt_numerator - debt_per_stake * stakes;

    ledger.l_collateral = ledger
        .l_collateral
        .checked_add(coll_per_stake)
        .ok_or(VusdError::Overflow)?;
    ledger.l_debt = ledger
        .l_debt
        .checked_add(debt_per_stake)
        .ok_or(VusdError::Overflow)?;

    ledger.pending_redistributed_collateral = ledger
        .pending_redistributed_collateral
        .checked_add(collateral)
        .ok_or(VusdError::Overflow)?;
    ledger.pending_redistributed_debt = ledger
        .pending_redistributed_debt
        .checked_add(debt)
        .ok_or(VusdError::Overflow)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staked_vault(owner: u8, collateral: u64, debt: u64, ledger: &mut GlobalLedger) -> Vault {
        let mut vault = Vault::new([owner; 32], [owner; 32], collateral, 0);
        vault.debt = debt;
        ledger.total_collateral += collateral;
        ledger.total_debt += debt;
        apply_pending_rewards(&mut vault, ledger).unwrap();
        update_stake(&mut vault, ledger).unwrap();
        vault
    }

    #[test]
    fn test_stake_only_with_debt() {
        let mut ledger = GlobalLedger::new(0);
        let mut vault = staked_vault(1, 1_000, 0, &mut ledger);
        assert_eq!(vault.stake, 0);
        assert_eq!(ledger.total_stakes, 0);

        vault.debt = 500;
        update_stake(&mut vault, &mut ledger).unwrap();
        assert_eq!(vault.stake, 1_000);
        assert_eq!(ledger.total_stakes, 1_000);
    }

    #[test]
    fn test_redistribution_requires_stake() {
        let mut ledger = GlobalLedger::new(0);
        assert_eq!(
            redistribute(&mut ledger, 100, 10),
            Err(VusdError::NoVaultsForRedistribution)
        );
        // Nothing to spread is always fine
        assert!(redistribute(&mut ledger, 0, 0).is_ok());
    }

    #[test]
    fn test_redistribution_pro_rata() {
        let mut ledger = GlobalLedger::new(0);
        let mut a = staked_vault(1, 3_000, 1_000, &mut ledger);
        let mut b = staked_vault(2, 1_000, 1_000, &mut ledger);

        redistribute(&mut ledger, 400, 800).unwrap();
        assert_eq!(ledger.pending_redistributed_debt, 400);
        assert_eq!(ledger.pending_redistributed_collateral, 800);

        assert_eq!(pending_rewards(&a, &ledger).unwrap(), (600, 300));
        assert_eq!(pending_rewards(&b, &ledger).unwrap(), (200, 100));

        apply_pending_rewards(&mut a, &mut ledger).unwrap();
        apply_pending_rewards(&mut b, &mut ledger).unwrap();

        assert_eq!(a.collateral, 3_600);
        assert_eq!(a.debt, 1_300);
        assert_eq!(b.collateral, 1_200);
        assert_eq!(b.debt, 1_100);
        assert_eq!(ledger.pending_redistributed_debt, 0);
        assert_eq!(ledger.pending_redistributed_collateral, 0);

        // Applying twice is a no-op
        apply_pending_rewards(&mut a, &mut ledger).unwrap();
        assert_eq!(a.debt, 1_300);
    }

    #[test]
    fn test_rounding_never_over_distributes() {
        let mut ledger = GlobalLedger::new(0);
        let mut vaults: Vec<Vault> = (1..=3)
            .map(|i| staked_vault(i, 1_000, 500, &mut ledger))
            .collect();

        redistribute(&mut ledger, 100, 100).unwrap();
        for vault in vaults.iter_mut() {
            apply_pending_rewards(vault, &mut ledger).unwrap();
        }

        let applied: u64 = vaults.iter().map(|v| v.debt - 500).sum();
        assert!(applied <= 100);
        assert_eq!(applied + ledger.pending_redistributed_debt, 100);
    }

    #[test]
    fn test_preview_leaves_ledger_untouched() {
        let mut ledger = GlobalLedger::new(0);
        let vault = staked_vault(1, 1_000, 1_000, &mut ledger);
        redistribute(&mut ledger, 100, 50).unwrap();

        let before = ledger.clone();
        let preview = with_pending_rewards(&vault, &ledger).unwrap();
        assert_eq!(preview.debt, 1_100);
        assert_eq!(preview.collateral, 1_050);
        assert_eq!(ledger, before);
    }
}
