//! vUSD Token Ledger
//!
//! Fungible balance ledger for the vUSD synthetic asset. The protocol mints,
//! burns and moves tokens through [`AssetIssuer::execute`]; holders move
//! their own tokens with [`TokenLedger::transfer`].
//!
//! A batch handed to `execute` is applied to a staged copy of the state and
//! committed only if every action succeeds and supply is conserved, so a
//! failing batch leaves balances untouched.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use vusd_common::{
    constants::token,
    errors::{VusdError, VusdResult},
    events::{EventLog, VusdEvent},
    token_ops::{supply_delta, validate_actions, verify_conservation, AssetIssuer},
    types::{Address, TokenAction},
};

// ============ Token State ============

/// Balances and supply of the vUSD token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenState {
    /// Total supply tracking
    pub total_supply: u64,
    /// Non-zero balances by owner
    pub balances: BTreeMap<Address, u64>,
}

impl TokenState {
    /// Get token name
    pub fn name() -> &'static str {
        token::NAME
    }

    /// Get token symbol
    pub fn symbol() -> &'static str {
        token::SYMBOL
    }

    /// Get token decimals
    pub fn decimals() -> u8 {
        token::DECIMALS
    }

    /// Balance of `owner`, zero if unknown
    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn credit(&mut self, owner: &Address, amount: u64) -> VusdResult<()> {
        let balance = self.balances.entry(*owner).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(VusdError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, owner: &Address, amount: u64) -> VusdResult<()> {
        let available = self.balance_of(owner);
        if available < amount {
            return Err(VusdError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, remaining);
        }
        Ok(())
    }

    /// Apply one action, returning the event it produces
    fn apply(&mut self, action: &TokenAction) -> VusdResult<VusdEvent> {
        match action {
            TokenAction::Transfer { from, to, amount } => {
                self.debit(from, *amount)?;
                self.credit(to, *amount)?;
                Ok(VusdEvent::TokenTransfer {
                    from: *from,
                    to: *to,
                    amount: *amount,
                })
            }
            TokenAction::Mint { to, amount } => {
                self.total_supply = self
                    .total_supply
                    .checked_add(*amount)
                    .ok_or(VusdError::Overflow)?;
                self.credit(to, *amount)?;
                Ok(VusdEvent::TokenMint {
                    to: *to,
                    amount: *amount,
                    new_total_supply: self.total_supply,
                })
            }
            TokenAction::Burn { from, amount } => {
                self.debit(from, *amount)?;
                self.total_supply = self
                    .total_supply
                    .checked_sub(*amount)
                    .ok_or(VusdError::Underflow)?;
                Ok(VusdEvent::TokenBurn {
                    from: *from,
                    amount: *amount,
                    new_total_supply: self.total_supply,
                })
            }
        }
    }
}

// ============ Ledger ============

/// Thread-safe vUSD ledger
#[derive(Debug, Default)]
pub struct TokenLedger {
    state: Mutex<TokenState>,
    events: Mutex<EventLog>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holder-initiated transfer
    pub fn transfer(&self, signer: &Address, from: &Address, to: &Address, amount: u64) -> VusdResult<()> {
        // 1. Signer must own the funds
        if signer != from {
            return Err(VusdError::Unauthorized {
                expected: *from,
                actual: *signer,
            });
        }

        // 2. Apply as a one-action batch
        self.execute(&[TokenAction::Transfer {
            from: *from,
            to: *to,
            amount,
        }])
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> TokenState {
        self.state.lock().clone()
    }

    /// Sum of all balances, equal to supply in every committed state
    pub fn sum_of_balances(&self) -> u64 {
        self.state.lock().balances.values().sum()
    }

    /// Take every event emitted so far
    pub fn drain_events(&self) -> Vec<VusdEvent> {
        self.events.lock().drain()
    }
}

impl AssetIssuer for TokenLedger {
    fn execute(&self, actions: &[TokenAction]) -> VusdResult<()> {
        validate_actions(actions)?;
        let (minted, burned) = supply_delta(actions)?;

        let mut state = self.state.lock();
        let mut staged = state.clone();
        let mut emitted = Vec::with_capacity(actions.len());
        for action in actions {
            emitted.push(staged.apply(action)?);
        }
        verify_conservation(state.total_supply, minted, staged.total_supply, burned)?;

        *state = staged;
        self.events.lock().extend(emitted);
        Ok(())
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        self.state.lock().balance_of(owner)
    }

    fn total_supply(&self) -> u64 {
        self.state.lock().total_supply
    }
}

// ============ Tests ============
