//! mrx-ledger
//!
//! Stock ledger for the Merx inventory engine:
//! - Movement-driven stock book is the source of truth
//! - Append-only journal (import / export / correction / sale)
//! - Overlay availability arithmetic (on-hand minus active claims)
//! - Per-variant version counters for optimistic writers
//! - Pure deterministic logic (no IO, no time, no store wiring)

mod types;

pub mod book;
pub mod overlay;

pub use book::{BookSnapshot, LedgerError, StockBook, VariantStock};
pub use overlay::{available, checked_withdraw};
pub use types::{Movement, MovementKind};
