//! Administrative surface

use vusd_common::{
    errors::{VusdError, VusdResult},
    events::VusdEvent,
    oracle::PriceFeed,
    token_ops::AssetIssuer,
};

use crate::{CallContext, Protocol};

impl<O: PriceFeed, T: AssetIssuer> Protocol<O, T> {
    /// Halt every mutating operation
    pub fn pause(&self, ctx: &CallContext) -> VusdResult<()> {
        self.set_paused(ctx, true)
    }

    /// Resume operations
    pub fn unpause(&self, ctx: &CallContext) -> VusdResult<()> {
        self.set_paused(ctx, false)
    }

    pub fn is_paused(&self) -> bool {
        self.ledger.lock().is_paused
    }

    fn set_paused(&self, ctx: &CallContext, paused: bool) -> VusdResult<()> {
        if ctx.caller != self.config.admin {
            return Err(VusdError::AdminOnly);
        }

        let mut ledger = self.ledger.lock();
        if ledger.is_paused == paused {
            return Err(VusdError::InvalidInput {
                param: "paused",
                reason: "already in requested state",
            });
        }
        ledger.is_paused = paused;

        let event = if paused {
            VusdEvent::ProtocolPaused {
                by: ctx.caller,
                timestamp: ctx.now,
            }
        } else {
            VusdEvent::ProtocolUnpaused {
                by: ctx.caller,
                timestamp: ctx.now,
            }
        };
        self.emit([event]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc};
    use std::thread;

    use parking_lot::Mutex;
    use vusd_common::{
        config::ProtocolConfig,
        errors::{VusdError, VusdResult},
        oracle::PriceFeed,
        token_ops::AssetIssuer,
        types::PriceData,
    };
    use vusd_token::TokenLedger;

    use crate::testing::{Harness, ADMIN, ALICE, BOB, CAROL, GAS_POOL, ONE_SOL, ONE_VUSD, SP_ACCOUNT};
    use crate::{CallContext, Protocol};

    /// Feed that can be armed to stall its next read until released
    struct GatedFeed {
        price: Mutex<PriceData>,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl GatedFeed {
        fn new(price: u64) -> Self {
            Self {
                price: Mutex::new(PriceData::new(price, 0)),
                gate: Mutex::new(None),
            }
        }
    }

    impl PriceFeed for GatedFeed {
        fn get_price(&self) -> VusdResult<PriceData> {
            if let Some((entered, release)) = self.gate.lock().take() {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            Ok(*self.price.lock())
        }
    }

    #[test]
    fn test_only_admin_pauses() {
        let h = Harness::new();
        assert_eq!(h.protocol.pause(&h.ctx(ALICE)), Err(VusdError::AdminOnly));
        h.protocol.pause(&h.ctx(ADMIN)).unwrap();
        assert!(h.protocol.is_paused());
        assert!(h.protocol.pause(&h.ctx(ADMIN)).is_err());
    }

    #[test]
    fn test_paused_blocks_mutations() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.pause(&h.ctx(ADMIN)).unwrap();

        let ctx = h.ctx(ALICE);
        assert_eq!(h.protocol.open_vault(&h.ctx([9u8; 32]), ONE_SOL), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.deposit_collateral(&ctx, &ALICE, ONE_SOL), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.borrow(&ctx, &ALICE, 500 * ONE_VUSD), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.close_vault(&ctx, &ALICE), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.stability_deposit(&ctx, ONE_VUSD), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.redeem(&ctx, ONE_VUSD), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.liquidate(&ctx, &ALICE), Err(VusdError::ProtocolPaused));

        h.protocol.unpause(&h.ctx(ADMIN)).unwrap();
        h.protocol.deposit_collateral(&ctx, &ALICE, ONE_SOL).unwrap();
    }

    #[test]
    fn test_paused_blocks_pool_operations() {
        let h = Harness::new();
        h.open(ALICE, 10 * ONE_SOL);
        h.protocol.borrow(&h.ctx(ALICE), &ALICE, 1_000 * ONE_VUSD).unwrap();
        h.protocol.stability_deposit(&h.ctx(ALICE), 100 * ONE_VUSD).unwrap();
        h.protocol.pause(&h.ctx(ADMIN)).unwrap();
        let before = h.protocol.snapshot();

        let ctx = h.ctx(ALICE);
        assert_eq!(h.protocol.stability_deposit(&ctx, ONE_VUSD), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.stability_withdraw(&ctx, ONE_VUSD), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.claim_collateral_gain(&ctx), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.claim_collateral_surplus(&ctx, &ALICE), Err(VusdError::ProtocolPaused));
        assert_eq!(h.protocol.snapshot(), before);
    }

    #[test]
    fn test_pause_during_price_read_stops_liquidation() {
        let feed = Arc::new(GatedFeed::new(200_000_000));
        let token = Arc::new(TokenLedger::new());
        let config = ProtocolConfig::new(ADMIN, GAS_POOL, SP_ACCOUNT);
        let protocol = Protocol::new(config, Arc::clone(&feed), Arc::clone(&token), 0).unwrap();
        let ctx = |caller| CallContext::new(caller, 0);

        protocol.open_vault(&ctx(ALICE), 2 * ONE_SOL).unwrap();
        protocol.borrow(&ctx(ALICE), &ALICE, 300 * ONE_VUSD).unwrap();
        protocol.open_vault(&ctx(BOB), 100 * ONE_SOL).unwrap();
        protocol.borrow(&ctx(BOB), &BOB, 1_000 * ONE_VUSD).unwrap();
        protocol.stability_deposit(&ctx(BOB), 500 * ONE_VUSD).unwrap();

        // $300 against 301.5 of debt
        *feed.price.lock() = PriceData::new(150_000_000, 0);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *feed.gate.lock() = Some((entered_tx, release_rx));
        let mut expected = protocol.snapshot();
        expected.ledger.is_paused = true;

        thread::scope(|scope| {
            let liquidation = scope.spawn(|| protocol.liquidate(&ctx(CAROL), &ALICE));
            entered_rx.recv().unwrap();
            protocol.pause(&ctx(ADMIN)).unwrap();
            release_tx.send(()).unwrap();
            assert_eq!(liquidation.join().unwrap(), Err(VusdError::ProtocolPaused));
        });

        assert_eq!(protocol.snapshot(), expected);
        assert_eq!(token.balance_of(&CAROL), 0);
    }
}
