//! Overlay accounting arithmetic.
//!
//! Available stock is derived, never stored: the physical on-hand count
//! minus the sum of active (unexpired, unconfirmed) claims. Reserving never
//! mutates on-hand; only a confirmed sale or a warehouse operation does.
//! These two functions are the whole arithmetic — the allocator owns the
//! serialization around them.

use crate::book::LedgerError;

/// Units a new claim may still take: `on_hand − reserved`, floored at zero.
///
/// The floor matters when an administrative correction lowers on-hand below
/// the currently reserved overlay: checkout must see zero, not a negative.
pub fn available(on_hand: i64, reserved: i64) -> i64 {
    debug_assert!(on_hand >= 0, "on_hand must never be negative");
    debug_assert!(reserved >= 0, "reserved overlay must never be negative");
    (on_hand - reserved).max(0)
}

/// Subtract `quantity` from `on_hand`, refusing to cross zero.
///
/// # Errors
/// Returns [`LedgerError::StockWouldGoNegative`] when `quantity` exceeds
/// `on_hand`. Callers must not clamp — a failed withdrawal signals either an
/// ordinary shortfall (warehouse export) or a data-integrity conflict
/// (sale confirmation after a downward correction), and the caller decides
/// which.
pub fn checked_withdraw(on_hand: i64, quantity: i64) -> Result<i64, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::NonPositiveQuantity { quantity });
    }
    if quantity > on_hand {
        return Err(LedgerError::StockWouldGoNegative {
            on_hand,
            requested: quantity,
        });
    }
    Ok(on_hand - quantity)
}
