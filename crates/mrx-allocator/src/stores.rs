//! Store boundaries for the allocator.
//!
//! This module defines **only** the trait contracts and the write-request
//! type. No concrete store implementations, no SQL, no in-memory state
//! belong here. Implementations must be object-safe (`Arc<dyn …>`) and
//! `Send + Sync` so they can be shared across request tasks and the reaper
//! loop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use mrx_ledger::MovementKind;
use mrx_schemas::{ReservationRecord, ReservationStatus, VariantRecord};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Stock write request
// ---------------------------------------------------------------------------

/// A versioned on-hand write.
///
/// Every mutation of the physical count carries its committed cause: the
/// store may journal it, and the version check makes the write atomic
/// against concurrent writers in other processes.
#[derive(Debug, Clone)]
pub struct StockWrite {
    pub variant_slug: String,
    /// The version the caller read; the write applies only if it still holds.
    pub expected_version: i64,
    pub new_on_hand: i64,
    pub kind: MovementKind,
    /// Delta for Import/Export/Sale; absolute target for Correction.
    pub quantity: i64,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Catalog store
// ---------------------------------------------------------------------------

/// The catalog's stock view: read variants, write on-hand under optimistic
/// concurrency. Catalog CRUD (names, descriptions, images) lives elsewhere.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one variant by slug. `None` when absent.
    async fn get(&self, variant_slug: &str) -> Result<Option<VariantRecord>>;

    /// All variants of a product, in slug order.
    async fn list_for_product(&self, product_slug: &str) -> Result<Vec<VariantRecord>>;

    /// Apply a versioned stock write.
    ///
    /// Returns `false` when `expected_version` no longer matches — the
    /// caller re-reads and retries. Implementations must reject writes that
    /// would store a negative count.
    async fn update_stock(&self, write: StockWrite) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Reservation store
// ---------------------------------------------------------------------------

/// Narrow repository contract for reservation rows.
#[async_trait::async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert(&self, record: ReservationRecord) -> Result<()>;

    /// Compare-and-set status transition. Returns `false` when the row's
    /// current status is no longer `from` — terminal-transition races
    /// (reaper vs payment webhook) resolve here.
    async fn update_status(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool>;

    /// The active (`Reserved`, unexpired at `now`) reservation for one
    /// (order, variant) pair, if any. At most one can exist.
    async fn find_active(
        &self,
        order_id: &str,
        variant_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReservationRecord>>;

    /// Every reservation row for an order, regardless of status.
    async fn find_by_order(&self, order_id: &str) -> Result<Vec<ReservationRecord>>;

    /// `Reserved` rows whose expiry has passed — the reaper's scan.
    async fn find_expired_reserved(&self, now: DateTime<Utc>) -> Result<Vec<ReservationRecord>>;

    /// Sum of quantities over active rows for a variant — the overlay term
    /// of the availability computation.
    async fn active_quantity(&self, variant_slug: &str, now: DateTime<Utc>) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Injectable time source so expiry behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_utc_and_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn clock_is_object_safe_via_arc() {
        let _c: std::sync::Arc<dyn Clock> = std::sync::Arc::new(SystemClock);
    }
}
