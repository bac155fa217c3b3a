//! Vault lifecycle: open, deposit, borrow, repay, withdraw, close

use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use vusd_common::{
    errors::{VusdError, VusdResult},
    events::VusdEvent,
    math::{calculate_cr, calculate_tcr, is_recovery_mode, required_ratio, safe_add, safe_sub},
    oracle::PriceFeed,
    redistribution::update_stake,
    token_ops::AssetIssuer,
    types::{Address, GlobalLedger, TokenAction, Vault, VaultId, VaultStatus},
};

use crate::{CallContext, Protocol};

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Open a vault holding `collateral`
    ///
    /// An owner whose previous vault was closed or liquidated may open a new
    /// one; the old record is replaced.
    pub fn open_vault(&self, ctx: &CallContext, collateral: u64) -> VusdResult<VaultId> {
        // 1. Collateral must be positive, protocol accounts own no vaults
        if collateral == 0 {
            return Err(VusdError::ZeroAmount);
        }
        if ctx.caller == self.config.gas_pool || ctx.caller == self.config.stability_pool_account {
            return Err(VusdError::InvalidInput {
                param: "owner",
                reason: "protocol accounts cannot own vaults",
            });
        }

        // 2. One live vault per owner
        let mut vaults = self.vaults.write();
        if let Some(existing) = vaults.get(&ctx.caller) {
            if !existing.lock().status.is_terminal() {
                return Err(VusdError::VaultAlreadyExists { owner: ctx.caller });
            }
        }

        let mut ledger = self.unpaused_ledger()?;

        // 3. Stage ledger totals
        let mut staged = ledger.clone();
        staged.total_collateral = safe_add(staged.total_collateral, collateral)?;
        staged.active_vault_count = safe_add(staged.active_vault_count, 1)?;
        staged.total_vaults = safe_add(staged.total_vaults, 1)?;

        let id = generate_vault_id(&ctx.caller, ctx.now, ledger.total_vaults);
        let mut vault = Vault::new(id, ctx.caller, collateral, ctx.now);
        vault.snapshot_l_collateral = staged.l_collateral;
        vault.snapshot_l_debt = staged.l_debt;

        // 4. Commit and emit
        vaults.insert(ctx.caller, Arc::new(Mutex::new(vault)));
        *ledger = staged;
        self.emit([VusdEvent::VaultOpened {
            vault_id: id,
            owner: ctx.caller,
            collateral,
            timestamp: ctx.now,
        }]);
        Ok(id)
    }

    /// Add collateral to an active vault
    pub fn deposit_collateral(&self, ctx: &CallContext, owner: &Address, amount: u64) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }

        self.with_staged_vault(owner, |vault, ledger| {
            vault.collateral = safe_add(vault.collateral, amount)?;
            vault.last_updated = ctx.now;
            ledger.total_collateral = safe_add(ledger.total_collateral, amount)?;
            update_stake(vault, ledger)?;

            let event = VusdEvent::CollateralDeposited {
                owner: *owner,
                amount,
                new_collateral: vault.collateral,
                timestamp: ctx.now,
            };
            Ok((vault.collateral, vec![event]))
        })
    }

    /// Issue `amount` vUSD against the vault, charging the one-time fee as
    /// extra debt
    ///
    /// The first borrow on a vault escrows the liquidation reserve out of
    /// the minted amount.
    pub fn borrow(&self, ctx: &CallContext, owner: &Address, amount: u64) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }
        let price = self.price(ctx.now)?;

        self.with_staged_vault(owner, |vault, ledger| {
            // 1. Mode is judged on the system before this borrow
            let tcr = calculate_tcr(ledger.total_collateral, ledger.total_debt, price)?;
            let recovery = is_recovery_mode(tcr, self.config.ccr);

            // 2. Fee and resulting debt
            let fee = ledger.fee.borrowing_fee(amount, ctx.now)?;
            let increase = safe_add(amount, fee)?;
            let new_debt = safe_add(vault.debt, increase)?;

            if new_debt < self.config.min_debt {
                return Err(VusdError::BelowMinimumDebt {
                    debt: new_debt,
                    minimum: self.config.min_debt,
                });
            }

            let escrow = if vault.liquidation_reserve == 0 {
                self.config.liquidation_reserve
            } else {
                0
            };
            if amount < escrow {
                return Err(VusdError::InvalidInput {
                    param: "amount",
                    reason: "first borrow must cover the liquidation reserve",
                });
            }

            // 3. Collateral ratio after the borrow
            let new_cr = calculate_cr(vault.collateral, new_debt, price)?;
            let required = required_ratio(recovery, self.config.mcr, self.config.ccr);
            if new_cr < required {
                return Err(VusdError::InsufficientCollateralRatio {
                    current_ratio: new_cr,
                    required_ratio: required,
                });
            }
            if recovery {
                let new_total_debt = safe_add(ledger.total_debt, increase)?;
                ensure_tcr_kept(tcr, ledger.total_collateral, new_total_debt, price)?;
            }

            // 4. Stage vault and ledger
            vault.debt = new_debt;
            vault.liquidation_reserve = safe_add(vault.liquidation_reserve, escrow)?;
            vault.last_updated = ctx.now;
            ledger.total_debt = safe_add(ledger.total_debt, increase)?;
            ledger.fee.record_fee_event(amount, ledger.total_debt, ctx.now)?;
            update_stake(vault, ledger)?;

            // 5. Mint, escrow the reserve
            let mut actions = vec![TokenAction::Mint { to: *owner, amount }];
            if escrow > 0 {
                actions.push(TokenAction::Transfer {
                    from: *owner,
                    to: self.config.gas_pool,
                    amount: escrow,
                });
            }
            self.settle(&actions)?;

            let events = vec![
                VusdEvent::DebtBorrowed {
                    owner: *owner,
                    amount,
                    fee,
                    new_debt,
                    reserve_escrowed: escrow,
                    timestamp: ctx.now,
                },
                VusdEvent::BaseRateUpdated {
                    base_rate: ledger.fee.base_rate,
                    timestamp: ctx.now,
                },
            ];
            Ok((fee, events))
        })
    }

    /// Burn `amount` vUSD from the owner against the vault's debt
    pub fn repay(&self, ctx: &CallContext, owner: &Address, amount: u64) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }

        self.with_staged_vault(owner, |vault, ledger| {
            // 1. Cannot repay more than the debt
            if amount > vault.debt {
                return Err(VusdError::ExcessRepayment {
                    amount,
                    debt: vault.debt,
                });
            }

            // 2. No dust left behind
            let new_debt = vault.debt - amount;
            if new_debt > 0 && new_debt < self.config.min_debt {
                return Err(VusdError::DebtBelowMinimumAfterRepay {
                    remaining: new_debt,
                    minimum: self.config.min_debt,
                });
            }

            // 3. Stage and burn
            vault.debt = new_debt;
            vault.last_updated = ctx.now;
            ledger.total_debt = safe_sub(ledger.total_debt, amount)?;
            update_stake(vault, ledger)?;

            self.settle(&[TokenAction::Burn { from: *owner, amount }])?;

            let event = VusdEvent::DebtRepaid {
                owner: *owner,
                amount,
                new_debt,
                timestamp: ctx.now,
            };
            Ok((new_debt, vec![event]))
        })
    }

    /// Withdraw collateral, keeping the vault above the required ratio
    ///
    /// Withdrawing everything from a debt-free vault closes it.
    pub fn withdraw_collateral(&self, ctx: &CallContext, owner: &Address, amount: u64) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        if amount == 0 {
            return Err(VusdError::ZeroAmount);
        }

        // Price only matters for a vault with debt, which is unknown until locked
        let price = self.price(ctx.now);

        self.with_staged_vault(owner, |vault, ledger| {
            // 1. Cannot withdraw more than held
            if amount > vault.collateral {
                return Err(VusdError::InsufficientBalance {
                    available: vault.collateral,
                    requested: amount,
                });
            }
            let new_collateral = vault.collateral - amount;

            if vault.debt == 0 && new_collateral == 0 {
                let (_, events) = self.close_staged(vault, ledger, ctx.now)?;
                return Ok((amount, events));
            }

            // 2. A vault with debt must stay above the required ratio
            if vault.debt > 0 {
                let price = price?;
                let tcr = calculate_tcr(ledger.total_collateral, ledger.total_debt, price)?;
                let recovery = is_recovery_mode(tcr, self.config.ccr);
                let required = required_ratio(recovery, self.config.mcr, self.config.ccr);
                let new_cr = calculate_cr(new_collateral, vault.debt, price)?;
                if new_cr < required {
                    return Err(VusdError::WithdrawalWouldBreachMCR {
                        current_ratio: new_cr,
                        required_ratio: required,
                    });
                }
                if recovery {
                    let new_total_collateral = safe_sub(ledger.total_collateral, amount)?;
                    ensure_tcr_kept(tcr, new_total_collateral, ledger.total_debt, price)?;
                }
            }

            // 3. Stage
            vault.collateral = new_collateral;
            vault.last_updated = ctx.now;
            ledger.total_collateral = safe_sub(ledger.total_collateral, amount)?;
            update_stake(vault, ledger)?;

            let event = VusdEvent::CollateralWithdrawn {
                owner: *owner,
                amount,
                new_collateral,
                timestamp: ctx.now,
            };
            Ok((amount, vec![event]))
        })
    }

    /// Close a debt-free vault, returning its collateral and reserve
    pub fn close_vault(&self, ctx: &CallContext, owner: &Address) -> VusdResult<u64> {
        Self::ensure_owner(ctx, owner)?;
        self.with_staged_vault(owner, |vault, ledger| self.close_staged(vault, ledger, ctx.now))
    }

    fn close_staged(
        &self,
        vault: &mut Vault,
        ledger: &mut GlobalLedger,
        now: u64,
    ) -> VusdResult<(u64, Vec<VusdEvent>)> {
        if vault.debt > 0 {
            return Err(VusdError::VaultHasOutstandingDebt {
                remaining_debt: vault.debt,
            });
        }

        let collateral = vault.collateral;
        let reserve = vault.liquidation_reserve;

        ledger.total_collateral = safe_sub(ledger.total_collateral, collateral)?;
        ledger.active_vault_count = safe_sub(ledger.active_vault_count, 1)?;

        vault.collateral = 0;
        vault.liquidation_reserve = 0;
        vault.status = VaultStatus::ClosedByOwner;
        vault.last_updated = now;
        update_stake(vault, ledger)?;

        if reserve > 0 {
            self.settle(&[TokenAction::Transfer {
                from: self.config.gas_pool,
                to: vault.owner,
                amount: reserve,
            }])?;
        }

        let event = VusdEvent::VaultClosed {
            vault_id: vault.id,
            owner: vault.owner,
            collateral_returned: collateral,
            reserve_returned: reserve,
            timestamp: now,
        };
        Ok((collateral, vec![event]))
    }
}

// ============ Helper Functions ============

/// Recovery mode only admits changes that leave the TCR where it was or higher
fn ensure_tcr_kept(current_tcr: u128, total_collateral: u64, total_debt: u64, price: u64) -> VusdResult<()> {
    let new_tcr = calculate_tcr(total_collateral, total_debt, price)?;
    if new_tcr < current_tcr {
        return Err(VusdError::TcrWouldDecrease { current_tcr, new_tcr });
    }
    Ok(())
}

/// Generate a deterministic vault ID
pub fn generate_vault_id(owner: &Address, timestamp: u64, nonce: u64) -> VaultId {
    let mut hasher = Sha256::new();
    hasher.update(owner);
    hasher.update(timestamp.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    let result = hasher.finalize();
    let mut id = [0u8; 32];
    id.copy_from_slice(&result);
    id
}
