//! vUSD Common Library
//!
//! Shared types, constants, and pure accounting logic for all vUSD
//! contracts. vUSD is an over-collateralized synthetic dollar: users lock
//! collateral in vaults, mint vUSD against it for a one-time fee, and are
//! liquidated when their collateral ratio falls too low.
//!
//! ## Contents
//!
//! - **Constants / Config**: protocol parameters and runtime overrides
//! - **Errors**: one typed error enum for every contract
//! - **Types**: vaults, the global ledger, stability pool records
//! - **Math**: checked fixed-point arithmetic, collateral ratios, P/S compounding
//! - **Fee Model**: decaying base rate with proportional steps
//! - **Liquidation**: pure liquidation planning (offset, redistribution, surplus)
//! - **Redistribution**: per-unit-stake accumulators with lazy application
//! - **Oracle / Token Ops**: the `PriceFeed` and `AssetIssuer` seams
//! - **Events**: typed event log
//!
//! This crate is `no_std` compatible when built without the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use alloc::vec::Vec;

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod fee_model;
pub mod events;
pub mod oracle;
pub mod token_ops;
pub mod config;
pub mod liquidation;
pub mod redistribution;

// Re-exports for convenience
pub use config::ProtocolConfig;
pub use errors::*;
pub use events::*;
pub use fee_model::FeeModel;
pub use liquidation::*;
pub use math::*;
pub use oracle::*;
pub use token_ops::*;
pub use types::*;
