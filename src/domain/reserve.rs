//! Reserve-protected swap guard.
//!
//! The float-management routine converts tokens into gas currency on its
//! own; this guard keeps it from ever eating into the protected minimum the
//! bot needs to keep operating.

use alloy::primitives::U256;

use super::error::SettlementError;

/// Check that swapping `amount` out of `balance` leaves `min_reserve` intact.
///
/// Returns the amount available above the reserve on success.
pub fn check_swap_possible(
    balance: U256,
    amount: U256,
    min_reserve: U256,
) -> Result<U256, SettlementError> {
    if balance < min_reserve {
        return Err(SettlementError::BelowMinimumReserve {
            balance,
            reserve: min_reserve,
            shortfall: min_reserve - balance,
        });
    }

    let available = balance - min_reserve;
    if available < amount {
        return Err(SettlementError::InsufficientAvailableAfterReserve {
            available,
            requested: amount,
        });
    }

    Ok(available)
}
