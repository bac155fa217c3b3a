//! Shared fixture for protocol tests

use std::sync::Arc;

use vusd_common::{config::ProtocolConfig, types::Address};
use vusd_price_oracle::PriceOracle;
use vusd_token::TokenLedger;

use crate::{CallContext, Protocol};

pub const ADMIN: Address = [0xAA; 32];
pub const OPERATOR: Address = [0x0B; 32];
pub const GAS_POOL: Address = [0x6A; 32];
pub const SP_ACCOUNT: Address = [0x5B; 32];

pub const ALICE: Address = [1u8; 32];
pub const BOB: Address = [2u8; 32];
pub const CAROL: Address = [3u8; 32];
pub const DANA: Address = [4u8; 32];
pub const VIC: Address = [5u8; 32];

pub const ONE_SOL: u64 = 1_000_000_000;
pub const ONE_VUSD: u64 = 1_000_000;

pub const START_PRICE: u64 = 200_000_000;

pub type TestProtocol = Protocol<Arc<PriceOracle>, Arc<TokenLedger>>;

/// Protocol wired to an in-memory oracle and token ledger at $200
pub struct Harness {
    pub protocol: TestProtocol,
    pub oracle: Arc<PriceOracle>,
    pub token: Arc<TokenLedger>,
    pub now: u64,
}

impl Harness {
    pub fn new() -> Self {
        let oracle = Arc::new(PriceOracle::new(ADMIN, OPERATOR, START_PRICE, 0).unwrap());
        let token = Arc::new(TokenLedger::new());
        let config = ProtocolConfig::new(ADMIN, GAS_POOL, SP_ACCOUNT);
        let protocol = Protocol::new(config, Arc::clone(&oracle), Arc::clone(&token), 0).unwrap();
        Self {
            protocol,
            oracle,
            token,
            now: 0,
        }
    }

    pub fn ctx(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.now)
    }

    /// Open a vault for `owner`, panicking on failure
    pub fn open(&self, owner: Address, collateral: u64) {
        self.protocol.open_vault(&self.ctx(owner), collateral).unwrap();
    }

    pub fn gas_pool(&self) -> Address {
        GAS_POOL
    }

    pub fn sp_account(&self) -> Address {
        SP_ACCOUNT
    }

    /// Move the clock without republishing the price
    pub fn advance(&mut self, secs: u64) {
        self.now += secs;
    }

    /// Reseed the oracle at the current time
    pub fn set_price(&mut self, price: u64) {
        self.oracle.reset_price(&ADMIN, price, self.now).unwrap();
    }

    /// Move `amount` vUSD between holders
    pub fn send(&self, from: Address, to: Address, amount: u64) {
        self.token.transfer(&from, &from, &to, amount).unwrap();
    }
}
