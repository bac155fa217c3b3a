//! Stability pool entry points
//!
//! Deposits are held by the stability pool account. Collateral gains are
//! reported in the receipt; moving the collateral itself is up to the host.

use vusd_common::{
    errors::VusdResult,
    events::VusdEvent,
    oracle::PriceFeed,
    token_ops::AssetIssuer,
    types::TokenAction,
};
use vusd_stability_pool::PoolReceipt;

use crate::{CallContext, Protocol};

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Deposit `amount` vUSD from the caller, paying out any pending gain
    pub fn stability_deposit(&self, ctx: &CallContext, amount: u64) -> VusdResult<PoolReceipt> {
        let mut pool = self.pool.lock();
        let _ledger = self.unpaused_ledger()?;

        let update = pool.prepare_deposit(&ctx.caller, amount, ctx.now)?;
        self.settle(&[TokenAction::Transfer {
            from: ctx.caller,
            to: self.config.stability_pool_account,
            amount,
        }])?;
        let receipt = pool.apply(update);

        let mut events = vec![VusdEvent::StabilityDeposit {
            depositor: ctx.caller,
            amount,
            new_deposit: receipt.remaining_deposit,
            pool_total: receipt.pool_total,
            timestamp: ctx.now,
        }];
        events.extend(Self::gain_event(ctx, &receipt));
        self.emit(events);
        Ok(receipt)
    }

    /// Withdraw `amount` vUSD of the caller's effective deposit, paying out
    /// any pending gain
    pub fn stability_withdraw(&self, ctx: &CallContext, amount: u64) -> VusdResult<PoolReceipt> {
        let mut pool = self.pool.lock();
        let _ledger = self.unpaused_ledger()?;

        let update = pool.prepare_withdraw(&ctx.caller, amount, ctx.now)?;
        self.settle(&[TokenAction::Transfer {
            from: self.config.stability_pool_account,
            to: ctx.caller,
            amount,
        }])?;
        let receipt = pool.apply(update);

        let mut events = vec![VusdEvent::StabilityWithdrawal {
            depositor: ctx.caller,
            amount,
            remaining_deposit: receipt.remaining_deposit,
            pool_total: receipt.pool_total,
            timestamp: ctx.now,
        }];
        events.extend(Self::gain_event(ctx, &receipt));
        self.emit(events);
        Ok(receipt)
    }

    /// Pay out the caller's pending collateral gain, leaving the deposit in place
    pub fn claim_collateral_gain(&self, ctx: &CallContext) -> VusdResult<u64> {
        let mut pool = self.pool.lock();
        let _ledger = self.unpaused_ledger()?;

        let update = pool.prepare_claim(&ctx.caller, ctx.now)?;
        let receipt = pool.apply(update);

        self.emit(Self::gain_event(ctx, &receipt));
        Ok(receipt.collateral_gain)
    }

    fn gain_event(ctx: &CallContext, receipt: &PoolReceipt) -> Option<VusdEvent> {
        (receipt.collateral_gain > 0).then(|| VusdEvent::CollateralGainClaimed {
            depositor: ctx.caller,
            collateral: receipt.collateral_gain,
            timestamp: ctx.now,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Harness, ALICE, BOB, ONE_SOL, ONE_VUSD};
    use vusd_common::{errors::VusdError, token_ops::AssetIssuer};

    #[test]
    fn test_deposit_moves_tokens_to_pool_account() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 1_000 * ONE_VUSD).unwrap();

        let receipt = h.protocol.stability_deposit(&h.ctx(ALICE), 400 * ONE_VUSD).unwrap();
        assert_eq!(receipt.pool_total, 400 * ONE_VUSD);
        assert_eq!(h.token.balance_of(&h.sp_account()), 400 * ONE_VUSD);
        assert_eq!(h.token.balance_of(&ALICE), 550 * ONE_VUSD);
        assert_eq!(h.protocol.effective_deposit(&ALICE).unwrap(), 400 * ONE_VUSD);
    }

    #[test]
    fn test_deposit_without_tokens_is_atomic() {
        let h = Harness::new();
        let before = h.protocol.pool_stats();

        let result = h.protocol.stability_deposit(&h.ctx(BOB), 10 * ONE_VUSD);
        assert!(matches!(result, Err(VusdError::InsufficientBalance { .. })));
        assert_eq!(h.protocol.pool_stats(), before);
        assert_eq!(h.protocol.effective_deposit(&BOB).unwrap(), 0);
    }

    #[test]
    fn test_withdraw_too_much() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 1_000 * ONE_VUSD).unwrap();
        h.protocol.stability_deposit(&h.ctx(ALICE), 100 * ONE_VUSD).unwrap();

        let result = h.protocol.stability_withdraw(&h.ctx(ALICE), 101 * ONE_VUSD);
        assert!(matches!(result, Err(VusdError::InsufficientPoolBalance { .. })));
        assert_eq!(
            h.protocol.stability_withdraw(&h.ctx(ALICE), 0),
            Err(VusdError::ZeroAmount)
        );
    }

    #[test]
    fn test_claim_without_gain() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 1_000 * ONE_VUSD).unwrap();
        h.protocol.stability_deposit(&h.ctx(ALICE), 100 * ONE_VUSD).unwrap();

        assert_eq!(
            h.protocol.claim_collateral_gain(&h.ctx(ALICE)),
            Err(VusdError::NoRewardsToClaim)
        );
    }
}
