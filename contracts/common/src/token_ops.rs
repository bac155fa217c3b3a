//! Token Operations Module
//!
//! The issuer seam for the vUSD synthetic asset. The protocol core never
//! touches balances directly: it hands a batch of [`TokenAction`]s to an
//! [`AssetIssuer`], which must apply the batch in full or reject it without
//! effect. A rejected batch aborts the enclosing protocol operation.

use alloc::sync::Arc;

use crate::errors::{VusdError, VusdResult};
use crate::types::{Address, TokenAction};

/// Mints, burns and moves the synthetic asset on behalf of the protocol
pub trait AssetIssuer {
    /// Apply every action or none of them
    fn execute(&self, actions: &[TokenAction]) -> VusdResult<()>;

    /// Current balance of `owner`
    fn balance_of(&self, owner: &Address) -> u64;

    /// Total outstanding supply
    fn total_supply(&self) -> u64;
}

impl<T: AssetIssuer + ?Sized> AssetIssuer for &T {
    fn execute(&self, actions: &[TokenAction]) -> VusdResult<()> {
        (**self).execute(actions)
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        (**self).balance_of(owner)
    }

    fn total_supply(&self) -> u64 {
        (**self).total_supply()
    }
}

impl<T: AssetIssuer + ?Sized> AssetIssuer for Arc<T> {
    fn execute(&self, actions: &[TokenAction]) -> VusdResult<()> {
        (**self).execute(actions)
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        (**self).balance_of(owner)
    }

    fn total_supply(&self) -> u64 {
        (**self).total_supply()
    }
}

/// Amount carried by an action
pub fn action_amount(action: &TokenAction) -> u64 {
    match action {
        TokenAction::Transfer { amount, .. }
        | TokenAction::Mint { amount, .. }
        | TokenAction::Burn { amount, .. } => *amount,
    }
}

/// Structural checks on a batch before any balance is looked at
pub fn validate_actions(actions: &[TokenAction]) -> VusdResult<()> {
    for action in actions {
        if action_amount(action) == 0 {
            return Err(VusdError::ZeroAmount);
        }
        if let TokenAction::Transfer { from, to, .. } = action {
            if from == to {
                return Err(VusdError::InvalidInput {
                    param: "to",
                    reason: "transfer to self",
                });
            }
        }
    }
    Ok(())
}

/// Total minted and burned by a batch
pub fn supply_delta(actions: &[TokenAction]) -> VusdResult<(u64, u64)> {
    let mut minted: u64 = 0;
    let mut burned: u64 = 0;
    for action in actions {
        match action {
            TokenAction::Mint { amount, .. } => {
                minted = minted.checked_add(*amount).ok_or(VusdError::Overflow)?;
            }
            TokenAction::Burn { amount, .. } => {
                burned = burned.checked_add(*amount).ok_or(VusdError::Overflow)?;
            }
            TokenAction::Transfer { .. } => {}
        }
    }
    Ok((minted, burned))
}

/// Verify that supply moved exactly by what the batch minted and burned
///
/// before + minted == after + burned
pub fn verify_conservation(before: u64, minted: u64, after: u64, burned: u64) -> VusdResult<()> {
    let inputs = before.checked_add(minted).ok_or(VusdError::Overflow)?;
    let outputs = after.checked_add(burned).ok_or(VusdError::Overflow)?;
    if inputs != outputs {
        return Err(VusdError::ConservationViolated { inputs, outputs });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        [1u8; 32]
    }

    fn bob() -> Address {
        [2u8; 32]
    }

    #[test]
    fn test_validate_rejects_zero_amount() {
        let actions = [TokenAction::Mint { to: alice(), amount: 0 }];
        assert_eq!(validate_actions(&actions), Err(VusdError::ZeroAmount));
    }

    #[test]
    fn test_validate_rejects_self_transfer() {
        let actions = [TokenAction::Transfer {
            from: alice(),
            to: alice(),
            amount: 5,
        }];
        assert!(matches!(
            validate_actions(&actions),
            Err(VusdError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_supply_delta() {
        let actions = [
            TokenAction::Mint { to: alice(), amount: 100 },
            TokenAction::Transfer {
                from: alice(),
                to: bob(),
                amount: 40,
            },
            TokenAction::Burn { from: bob(), amount: 30 },
        ];
        assert_eq!(supply_delta(&actions).unwrap(), (100, 30));
    }

    #[test]
    fn test_conservation() {
        assert!(verify_conservation(1_000, 100, 1_070, 30).is_ok());
        assert_eq!(
            verify_conservation(1_000, 100, 1_100, 30),
            Err(VusdError::ConservationViolated {
                inputs: 1_100,
                outputs: 1_130
            })
        );
    }
}
