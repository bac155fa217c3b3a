//! Vault Manager - CDP engine for vUSD
//!
//! Owns every vault, the global ledger, the stability pool and the
//! liquidation surplus claims, and runs all protocol operations against
//! them.
//!
//! ## Core Operations
//!
//! - **open_vault / close_vault**: create a vault with collateral, close it once debt-free
//! - **deposit_collateral / withdraw_collateral**: move collateral in and out (CR permitting)
//! - **borrow / repay**: issue vUSD for a one-time fee, burn it back
//! - **liquidate / liquidate_batch**: permissionless liquidation of undercollateralized vaults
//! - **redeem**: exchange vUSD for collateral at face value, lowest CR first
//! - **stability_deposit / stability_withdraw / claim_collateral_gain**: stability pool
//! - **pause / unpause**: admin surface
//!
//! ## Atomicity
//!
//! Every operation stages copies of the state it touches, validates, asks the
//! [`AssetIssuer`] to apply its token batch, and only then commits the staged
//! copies and emits events. A failure at any step leaves every record as it
//! was.
//!
//! ## Locking
//!
//! `parking_lot` locks, always taken in this order:
//!
//! ```text
//! pool -> vault map -> vault -> ledger -> surplus -> events
//! ```
//!
//! Single-vault operations hold the map read lock for their whole duration,
//! so operations on different vaults proceed in parallel until they meet at
//! the ledger mutex. Liquidation takes the pool lock first and is therefore
//! linearized wholly before or after any stability deposit or withdrawal.
//! Opening a vault and redemption take the map write lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use vusd_common::{
    config::ProtocolConfig,
    errors::{VusdError, VusdResult},
    events::{EventLog, VusdEvent},
    oracle::{fresh_price, PriceFeed},
    redistribution::apply_pending_rewards,
    token_ops::AssetIssuer,
    types::{Address, GlobalLedger, SurplusClaim, TokenAction, Vault},
};
use vusd_stability_pool::StabilityPool;

mod admin;
mod liquidation;
mod redemption;
mod stability;
mod vaults;
mod views;

#[cfg(test)]
mod testing;

pub use vaults::generate_vault_id;
pub use views::ProtocolSnapshot;
pub use vusd_stability_pool::{PoolReceipt, PoolStats};

/// Who is calling and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Signer of the call
    pub caller: Address,
    /// Current unix time
    pub now: u64,
}

impl CallContext {
    pub fn new(caller: Address, now: u64) -> Self {
        Self { caller, now }
    }
}

type VaultMap = BTreeMap<Address, Arc<Mutex<Vault>>>;

/// The vUSD protocol engine
pub struct Protocol<O: PriceFeed, T: AssetIssuer> {
    config: ProtocolConfig,
    oracle: O,
    issuer: T,
    pool: Mutex<StabilityPool>,
    vaults: RwLock<VaultMap>,
    ledger: Mutex<GlobalLedger>,
    surplus: Mutex<BTreeMap<Address, SurplusClaim>>,
    events: Mutex<EventLog>,
}

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Initialize the protocol with a validated config
    pub fn new(config: ProtocolConfig, oracle: O, issuer: T, now: u64) -> VusdResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            oracle,
            issuer,
            pool: Mutex::new(StabilityPool::new()),
            vaults: RwLock::new(BTreeMap::new()),
            ledger: Mutex::new(GlobalLedger::new(now)),
            surplus: Mutex::new(BTreeMap::new()),
            events: Mutex::new(EventLog::new()),
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn issuer(&self) -> &T {
        &self.issuer
    }

    /// Take every event emitted so far
    pub fn drain_events(&self) -> Vec<VusdEvent> {
        self.events.lock().drain()
    }

    // ============ Shared Helpers ============

    /// Fail fast before fetching a price or taking the outer locks
    fn ensure_not_paused(&self) -> VusdResult<()> {
        self.unpaused_ledger().map(drop)
    }

    /// Lock the ledger for the rest of an operation, refusing if paused
    ///
    /// `pause` takes the same lock, so an operation holding this guard
    /// commits wholly before any pause lands.
    fn unpaused_ledger(&self) -> VusdResult<MutexGuard<'_, GlobalLedger>> {
        let ledger = self.ledger.lock();
        if ledger.is_paused {
            return Err(VusdError::ProtocolPaused);
        }
        Ok(ledger)
    }

    fn ensure_owner(ctx: &CallContext, owner: &Address) -> VusdResult<()> {
        if ctx.caller != *owner {
            return Err(VusdError::Unauthorized {
                expected: *owner,
                actual: ctx.caller,
            });
        }
        Ok(())
    }

    fn price(&self, now: u64) -> VusdResult<u64> {
        fresh_price(&self.oracle, now, self.config.max_price_age_secs)
    }

    /// Run the token batch, skipping the issuer when there is nothing to do
    fn settle(&self, actions: &[TokenAction]) -> VusdResult<()> {
        if actions.is_empty() {
            return Ok(());
        }
        self.issuer.execute(actions)
    }

    fn emit(&self, events: impl IntoIterator<Item = VusdEvent>) {
        self.events.lock().extend(events);
    }

    /// Run `op` on staged copies of an active vault and the ledger, with the
    /// vault's pending redistribution applied, and commit both only if it
    /// succeeds
    fn with_staged_vault<R>(
        &self,
        owner: &Address,
        op: impl FnOnce(&mut Vault, &mut GlobalLedger) -> VusdResult<(R, Vec<VusdEvent>)>,
    ) -> VusdResult<R> {
        let vaults = self.vaults.read();
        let handle = vaults
            .get(owner)
            .ok_or(VusdError::VaultNotFound { owner: *owner })?;
        let mut vault_guard = handle.lock();
        if !vault_guard.is_active() {
            return Err(VusdError::VaultNotActive { owner: *owner });
        }

        let mut ledger_guard = self.unpaused_ledger()?;

        let mut vault = vault_guard.clone();
        let mut ledger = ledger_guard.clone();
        apply_pending_rewards(&mut vault, &mut ledger)?;

        let (out, events) = op(&mut vault, &mut ledger)?;

        *vault_guard = vault;
        *ledger_guard = ledger;
        self.emit(events);
        Ok(out)
    }
}
