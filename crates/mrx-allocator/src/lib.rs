//! mrx-allocator
//!
//! Stock allocator — the reserve / confirm / release surface of the Merx
//! inventory engine:
//! - Overlay accounting: reserving never mutates on-hand; only a confirmed
//!   sale (or a warehouse operation) does
//! - Per-variant serialization around every availability read-modify-write
//! - Bounded optimistic retry over a versioned catalog store
//! - Typed errors callers can pattern-match (no exceptions-as-flow-control)
//! - Constructor-injected store traits + injectable clock for deterministic
//!   tests

pub mod engine;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod stores;

pub use engine::{
    Allocator, ConfirmSummary, ReleaseSummary, ReserveOutcome, VariantAvailability,
    DEFAULT_MAX_RETRIES,
};
pub use error::AllocError;
pub use gate::VariantGate;
pub use lifecycle::{transition, ClaimEvent, Transition, TransitionError};
pub use stores::{CatalogStore, Clock, ReservationStore, StockWrite, SystemClock};
