//! Protocol Events for vUSD
//!
//! Every successful state change emits a typed event. Events can be
//! serialized with borsh for storage or indexing off-chain; failed
//! operations emit nothing.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, VaultId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    VaultOpened = 0x01,
    VaultClosed = 0x02,
    CollateralDeposited = 0x03,
    CollateralWithdrawn = 0x04,
    DebtBorrowed = 0x05,
    DebtRepaid = 0x06,
    VaultLiquidated = 0x07,
    SurplusClaimed = 0x08,
    DebtRedistributed = 0x09,

    // Stability Pool Events (0x20 - 0x3F)
    StabilityDeposit = 0x20,
    StabilityWithdrawal = 0x21,
    CollateralGainClaimed = 0x22,
    LiquidationOffset = 0x23,

    // Token Events (0x40 - 0x5F)
    TokenTransfer = 0x40,
    TokenMint = 0x41,
    TokenBurn = 0x42,

    // Oracle Events (0x60 - 0x7F)
    PriceUpdated = 0x60,
    OracleOperatorChanged = 0x61,

    // Protocol Events (0x80 - 0x9F)
    ProtocolPaused = 0x80,
    ProtocolUnpaused = 0x81,
    Redemption = 0x85,
    BaseRateUpdated = 0x86,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum VusdEvent {
    // ============ Vault Events ============

    /// Emitted when a new vault is opened
    VaultOpened {
        vault_id: VaultId,
        owner: Address,
        collateral: u64,
        timestamp: u64,
    },

    /// Emitted when a vault is closed by its owner
    VaultClosed {
        vault_id: VaultId,
        owner: Address,
        collateral_returned: u64,
        reserve_returned: u64,
        timestamp: u64,
    },

    /// Emitted when collateral is added to a vault
    CollateralDeposited {
        owner: Address,
        amount: u64,
        new_collateral: u64,
        timestamp: u64,
    },

    /// Emitted when collateral is withdrawn from a vault
    CollateralWithdrawn {
        owner: Address,
        amount: u64,
        new_collateral: u64,
        timestamp: u64,
    },

    /// Emitted when debt is issued against a vault
    DebtBorrowed {
        owner: Address,
        amount: u64,
        fee: u64,
        new_debt: u64,
        reserve_escrowed: u64,
        timestamp: u64,
    },

    /// Emitted when debt is repaid
    DebtRepaid {
        owner: Address,
        amount: u64,
        new_debt: u64,
        timestamp: u64,
    },

    /// Emitted when a vault is liquidated
    VaultLiquidated {
        vault_id: VaultId,
        owner: Address,
        liquidator: Address,
        debt_offset: u64,
        debt_redistributed: u64,
        collateral_to_sp: u64,
        collateral_redistributed: u64,
        collateral_surplus: u64,
        gas_compensation: u64,
        timestamp: u64,
    },

    /// Emitted when a former owner claims liquidation surplus
    SurplusClaimed {
        owner: Address,
        collateral: u64,
        timestamp: u64,
    },

    /// Emitted when liquidated debt is spread over remaining vaults
    DebtRedistributed {
        debt: u64,
        collateral: u64,
        l_debt: u128,
        l_collateral: u128,
        timestamp: u64,
    },

    // ============ Stability Pool Events ============

    /// Emitted when vUSD is deposited to the stability pool
    StabilityDeposit {
        depositor: Address,
        amount: u64,
        new_deposit: u64,
        pool_total: u64,
        timestamp: u64,
    },

    /// Emitted when vUSD is withdrawn from the stability pool
    StabilityWithdrawal {
        depositor: Address,
        amount: u64,
        remaining_deposit: u64,
        pool_total: u64,
        timestamp: u64,
    },

    /// Emitted when collateral gains are paid to a depositor
    CollateralGainClaimed {
        depositor: Address,
        collateral: u64,
        timestamp: u64,
    },

    /// Emitted when the stability pool absorbs liquidated debt
    LiquidationOffset {
        debt_offset: u64,
        collateral_gained: u64,
        new_pool_total: u64,
        epoch: u64,
        scale: u64,
        timestamp: u64,
    },

    // ============ Token Events ============

    /// Emitted on token transfer
    TokenTransfer {
        from: Address,
        to: Address,
        amount: u64,
    },

    /// Emitted when tokens are minted
    TokenMint {
        to: Address,
        amount: u64,
        new_total_supply: u64,
    },

    /// Emitted when tokens are burned
    TokenBurn {
        from: Address,
        amount: u64,
        new_total_supply: u64,
    },

    // ============ Oracle Events ============

    /// Emitted when the collateral price is updated
    PriceUpdated {
        old_price: u64,
        new_price: u64,
        timestamp: u64,
    },

    /// Emitted when the oracle operator changes
    OracleOperatorChanged {
        old_operator: Address,
        new_operator: Address,
        timestamp: u64,
    },

    // ============ Protocol Events ============

    /// Emitted when protocol is paused
    ProtocolPaused {
        by: Address,
        timestamp: u64,
    },

    /// Emitted when protocol is unpaused
    ProtocolUnpaused {
        by: Address,
        timestamp: u64,
    },

    /// Emitted on redemption
    Redemption {
        redeemer: Address,
        redeemed: u64,
        collateral_drawn: u64,
        fee: u64,
        vaults_affected: u32,
        timestamp: u64,
    },

    /// Emitted when the base rate steps after issuance or redemption
    BaseRateUpdated {
        base_rate: u128,
        timestamp: u64,
    },
}

impl VusdEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::VaultOpened { .. } => EventType::VaultOpened,
            Self::VaultClosed { .. } => EventType::VaultClosed,
            Self::CollateralDeposited { .. } => EventType::CollateralDeposited,
            Self::CollateralWithdrawn { .. } => EventType::CollateralWithdrawn,
            Self::DebtBorrowed { .. } => EventType::DebtBorrowed,
            Self::DebtRepaid { .. } => EventType::DebtRepaid,
            Self::VaultLiquidated { .. } => EventType::VaultLiquidated,
            Self::SurplusClaimed { .. } => EventType::SurplusClaimed,
            Self::DebtRedistributed { .. } => EventType::DebtRedistributed,
            Self::StabilityDeposit { .. } => EventType::StabilityDeposit,
            Self::StabilityWithdrawal { .. } => EventType::StabilityWithdrawal,
            Self::CollateralGainClaimed { .. } => EventType::CollateralGainClaimed,
            Self::LiquidationOffset { .. } => EventType::LiquidationOffset,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::PriceUpdated { .. } => EventType::PriceUpdated,
            Self::OracleOperatorChanged { .. } => EventType::OracleOperatorChanged,
            Self::ProtocolPaused { .. } => EventType::ProtocolPaused,
            Self::ProtocolUnpaused { .. } => EventType::ProtocolUnpaused,
            Self::Redemption { .. } => EventType::Redemption,
            Self::BaseRateUpdated { .. } => EventType::BaseRateUpdated,
        }
    }

    /// Time the event occurred, if it carries one
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Self::VaultOpened { timestamp, .. }
            | Self::VaultClosed { timestamp, .. }
            | Self::CollateralDeposited { timestamp, .. }
            | Self::CollateralWithdrawn { timestamp, .. }
            | Self::DebtBorrowed { timestamp, .. }
            | Self::DebtRepaid { timestamp, .. }
            | Self::VaultLiquidated { timestamp, .. }
            | Self::SurplusClaimed { timestamp, .. }
            | Self::DebtRedistributed { timestamp, .. }
            | Self::StabilityDeposit { timestamp, .. }
            | Self::StabilityWithdrawal { timestamp, .. }
            | Self::CollateralGainClaimed { timestamp, .. }
            | Self::LiquidationOffset { timestamp, .. }
            | Self::PriceUpdated { timestamp, .. }
            | Self::OracleOperatorChanged { timestamp, .. }
            | Self::ProtocolPaused { timestamp, .. }
            | Self::ProtocolUnpaused { timestamp, .. }
            | Self::Redemption { timestamp, .. }
            | Self::BaseRateUpdated { timestamp, .. } => Some(*timestamp),
            Self::TokenTransfer { .. } | Self::TokenMint { .. } | Self::TokenBurn { .. } => None,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VusdEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: VusdEvent) {
        self.events.push(event);
    }

    /// Emit several events in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = VusdEvent>) {
        self.events.extend(events);
    }

    /// Get all events
    pub fn events(&self) -> &[VusdEvent] {
        &self.events
    }

    /// Take all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<VusdEvent> {
        core::mem::take(&mut self.events)
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&VusdEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
