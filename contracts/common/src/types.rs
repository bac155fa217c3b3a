//! Core Types for the vUSD Protocol
//!
//! This module defines the fundamental records shared by every contract
//! crate: vaults, the global ledger, stability pool state and the token
//! actions handed to the asset issuer.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::stability_pool::P_BASE;
use crate::fee_model::FeeModel;

/// Type alias for addresses (32-byte account key)
pub type Address = [u8; 32];

/// Type alias for vault identifiers
pub type VaultId = [u8; 32];

// ============ Vault Types ============

/// Lifecycle of a vault. `ClosedByOwner` and `Liquidated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum VaultStatus {
    /// Record exists but was never activated
    #[default]
    Inactive,
    /// Vault is open and can be modified
    Active,
    /// Owner repaid everything and closed the vault
    ClosedByOwner,
    /// Vault was liquidated
    Liquidated,
}

impl VaultStatus {
    /// Terminal states can never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ClosedByOwner | Self::Liquidated)
    }
}

/// Individual vault state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Vault {
    /// Unique identifier for this vault
    pub id: VaultId,
    /// Owner's address, the vault store key
    pub owner: Address,
    /// Collateral in base units (9 decimals)
    pub collateral: u64,
    /// Principal plus one-time fees, in vUSD base units (6 decimals)
    pub debt: u64,
    /// Gas compensation escrowed in the gas pool, not part of `debt`
    pub liquidation_reserve: u64,
    /// Redistribution stake (collateral while debt > 0, else 0)
    pub stake: u64,
    /// Ledger `l_collateral` at last sync
    pub snapshot_l_collateral: u128,
    /// Ledger `l_debt` at last sync
    pub snapshot_l_debt: u128,
    /// Current status
    pub status: VaultStatus,
    /// Time the vault was opened
    pub opened_at: u64,
    /// Time of last modification
    pub last_updated: u64,
}

impl Vault {
    /// Creates a new active vault holding only collateral
    pub fn new(id: VaultId, owner: Address, collateral: u64, now: u64) -> Self {
        Self {
            id,
            owner,
            collateral,
            debt: 0,
            liquidation_reserve: 0,
            stake: 0,
            snapshot_l_collateral: 0,
            snapshot_l_debt: 0,
            status: VaultStatus::Active,
            opened_at: now,
            last_updated: now,
        }
    }

    /// Returns true if vault is active
    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }
}

// ============ Ledger Types ============

/// Protocol-wide aggregates. Owned by a single writer and passed explicitly
/// into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GlobalLedger {
    /// Sum of active vault collateral plus collateral pending redistribution
    pub total_collateral: u64,
    /// Sum of active vault debt plus debt pending redistribution
    pub total_debt: u64,
    /// Number of active vaults
    pub active_vault_count: u64,
    /// Number of vaults ever opened
    pub total_vaults: u64,
    /// Decaying base rate and its clock
    pub fee: FeeModel,
    /// Admin pause flag
    pub is_paused: bool,
    /// Sum of all active vault stakes
    pub total_stakes: u64,
    /// Redistributed collateral per unit of stake (1e18 scaled)
    pub l_collateral: u128,
    /// Redistributed debt per unit of stake (1e18 scaled)
    pub l_debt: u128,
    /// Division remainder carried into the next collateral redistribution
    pub last_collateral_error: u128,
    /// Division remainder carried into the next debt redistribution
    pub last_debt_error: u128,
    /// Redistributed collateral not yet applied to any vault
    pub pending_redistributed_collateral: u64,
    /// Redistributed debt not yet applied to any vault
    pub pending_redistributed_debt: u64,
    /// Collateral retained as redemption fees
    pub redemption_fees_collected: u64,
}

impl GlobalLedger {
    /// Creates the initial ledger, with the fee clock anchored at `now`
    pub fn new(now: u64) -> Self {
        Self {
            fee: FeeModel::new(now),
            ..Default::default()
        }
    }
}

// ============ Oracle Types ============

/// Price reported by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceData {
    /// USD per whole collateral unit, 6 decimals (200_000_000 = $200)
    pub price: u64,
    /// Unix time the price was published
    pub publish_time: u64,
}

impl PriceData {
    pub fn new(price: u64, publish_time: u64) -> Self {
        Self { price, publish_time }
    }

    /// Checks if the price is older than `max_age` seconds at `now`
    pub fn is_stale(&self, now: u64, max_age: u64) -> bool {
        now.saturating_sub(self.publish_time) > max_age
    }
}

// ============ Stability Pool Types ============

/// Individual deposit in the stability pool. Only the snapshot is stored;
/// the current balance and gain are derived on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StabilityDeposit {
    /// Depositor's address
    pub owner: Address,
    /// Nominal amount at the snapshot (vUSD)
    pub initial_value: u64,
    /// P at snapshot time
    pub snapshot_p: u128,
    /// S for (snapshot_epoch, snapshot_scale) at snapshot time
    pub snapshot_s: u128,
    /// Epoch at snapshot time
    pub snapshot_epoch: u64,
    /// Scale at snapshot time
    pub snapshot_scale: u64,
    /// Time of last update
    pub last_updated: u64,
}

/// Global stability pool state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StabilityPoolState {
    /// Total vUSD deposited (after losses)
    pub total_deposits: u64,
    /// Collateral held for depositors, not yet paid out
    pub total_collateral: u64,
    /// Running product P (starts at 1e18)
    pub product_p: u128,
    /// Current epoch (advances whenever the pool is emptied)
    pub current_epoch: u64,
    /// Current scale (advances whenever P is rescaled)
    pub current_scale: u64,
    /// Number of deposit records
    pub depositor_count: u64,
    /// Remainder carried into the next collateral gain computation
    pub last_collateral_error: u128,
    /// Remainder carried into the next debt loss computation
    pub last_debt_loss_error: u128,
}

impl StabilityPoolState {
    /// Creates initial stability pool state
    pub fn new() -> Self {
        Self {
            total_deposits: 0,
            total_collateral: 0,
            product_p: P_BASE,
            current_epoch: 0,
            current_scale: 0,
            depositor_count: 0,
            last_collateral_error: 0,
            last_debt_loss_error: 0,
        }
    }
}

impl Default for StabilityPoolState {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Action Types ============

/// Synthetic asset movements requested from the issuer. A batch of these
/// either applies in full or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TokenAction {
    /// Transfer tokens between addresses
    Transfer { from: Address, to: Address, amount: u64 },
    /// Mint new tokens
    Mint { to: Address, amount: u64 },
    /// Burn tokens
    Burn { from: Address, amount: u64 },
}

// ============ Liquidation Types ============

/// Collateral left over from a recovery-mode liquidation, claimable by the
/// former owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SurplusClaim {
    /// Owner who can claim this surplus
    pub owner: Address,
    /// Collateral claimable
    pub collateral: u64,
    /// Time the surplus was first recorded
    pub created_at: u64,
    /// Vault the surplus came from
    pub source_vault_id: VaultId,
}

impl SurplusClaim {
    pub fn new(owner: Address, collateral: u64, source_vault_id: VaultId, now: u64) -> Self {
        Self {
            owner,
            collateral,
            created_at: now,
            source_vault_id,
        }
    }
}

/// What happened during a liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LiquidationResult {
    /// Owner of the liquidated vault
    pub owner: Address,
    /// Vault that was liquidated
    pub vault_id: VaultId,
    /// Debt absorbed by the stability pool
    pub debt_offset: u64,
    /// Debt redistributed to other vaults
    pub debt_redistributed: u64,
    /// Collateral sent to stability pool depositors
    pub collateral_to_sp: u64,
    /// Collateral redistributed to other vaults
    pub collateral_redistributed: u64,
    /// Collateral left for the owner (recovery mode only)
    pub collateral_surplus: u64,
    /// Reserve paid to the liquidator
    pub gas_compensation: u64,
}

impl LiquidationResult {
    /// Total debt handled
    pub fn total_debt(&self) -> u64 {
        self.debt_offset.saturating_add(self.debt_redistributed)
    }

    /// Total collateral removed from the vault
    pub fn total_collateral(&self) -> u64 {
        self.collateral_to_sp
            .saturating_add(self.collateral_redistributed)
            .saturating_add(self.collateral_surplus)
    }
}

/// Outcome of a redemption
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RedemptionResult {
    /// vUSD actually redeemed and burned
    pub redeemed: u64,
    /// Collateral drawn from vaults at face value
    pub collateral_drawn: u64,
    /// Part of `collateral_drawn` kept as fee
    pub fee: u64,
    /// Number of vaults touched
    pub vaults_affected: u32,
}
