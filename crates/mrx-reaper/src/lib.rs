//! mrx-reaper
//!
//! Expiry reaper for the Merx inventory engine: a single background loop
//! that finds reservations whose TTL has passed without confirmation,
//! asks the order subsystem to cancel the corresponding orders, and clears
//! the overlay through the allocator's public release path.
//!
//! The reaper is a safety net, not the expiry mechanism itself —
//! availability recovers the instant a reservation expires, because the
//! allocator excludes expired rows from the overlay sum. The reaper's job
//! is to make the expiry durable (flip the rows) and to cancel abandoned
//! orders.

pub mod orders;
pub mod sweep;

pub use orders::{NullOrderService, OrderService};
pub use sweep::{Reaper, SweepReport, EXPIRED_REASON};
