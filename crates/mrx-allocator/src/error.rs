//! Allocator error taxonomy.
//!
//! Business failures are values, not exceptions: callers pattern-match on
//! [`AllocError`] to distinguish an ordinary "out of stock" rejection from a
//! data-integrity fault that needs an operator.

/// All failures the allocator can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Variant, reservation, or order absent. Surfaced directly to callers.
    NotFound { what: String },
    /// Requested quantity was zero or negative.
    InvalidQuantity { quantity: i64 },
    /// Requested more than currently available. Always recoverable — the
    /// checkout simply shows "out of stock".
    InsufficientStock { available: i64, requested: i64 },
    /// Confirming the sale would drive on-hand negative. Fatal to the
    /// operation; never clamped, never auto-corrected. Signals an
    /// administrative conflict (e.g. a downward correction landed between
    /// reservation and confirmation) that requires manual review.
    StockInconsistency {
        variant_slug: String,
        on_hand: i64,
        to_subtract: i64,
    },
    /// Optimistic write retry budget exhausted. Transient — the caller may
    /// retry the whole operation.
    Conflict { attempts: u32 },
    /// Store/infrastructure failure at the trait boundary.
    Store { message: String },
}

impl AllocError {
    /// `true` for failures where retrying the whole call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Store { .. })
    }

    /// Wrap a store-boundary failure.
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store {
            message: format!("{err:#}"),
        }
    }
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { what } => write!(f, "not found: {what}"),
            Self::InvalidQuantity { quantity } => {
                write!(f, "quantity must be > 0, got {quantity}")
            }
            Self::InsufficientStock {
                available,
                requested,
            } => write!(
                f,
                "insufficient stock: requested {requested}, available {available}"
            ),
            Self::StockInconsistency {
                variant_slug,
                on_hand,
                to_subtract,
            } => write!(
                f,
                "stock inconsistency on '{variant_slug}': confirming {to_subtract} against on_hand {on_hand} would go negative"
            ),
            Self::Conflict { attempts } => {
                write!(f, "optimistic write conflict after {attempts} attempts")
            }
            Self::Store { message } => write!(f, "store error: {message}"),
        }
    }
}

impl std::error::Error for AllocError {}
