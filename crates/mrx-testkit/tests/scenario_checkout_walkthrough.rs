//! Scenario: the canonical checkout walkthrough.
//!
//! # Invariant under test
//!
//! Overlay accounting end to end: reserving subtracts from availability but
//! not from the ledger; a rejected reserve reports the availability it saw;
//! confirming converts the overlay into the one and only ledger decrement,
//! after which the freed overlay makes room for the next claim.

use std::sync::Arc;

use chrono::Duration;
use mrx_allocator::{AllocError, Allocator};
use mrx_testkit::{ManualClock, MemoryCatalog, MemoryReservationStore};

fn ttl() -> Duration {
    Duration::minutes(15)
}

#[tokio::test]
async fn ten_units_walkthrough() {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_variant("tshirt", "tshirt-m", 10).await.unwrap();
    let reservations = Arc::new(MemoryReservationStore::new());
    let clock = Arc::new(ManualClock::new());
    let alloc = Allocator::new(catalog.clone(), reservations, clock);

    // Reserve 4 for order A: availability drops, ledger does not.
    alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();
    assert_eq!(alloc.available("tshirt-m").await.unwrap(), 6);
    assert_eq!(catalog.snapshot().await.on_hand("tshirt-m"), 10);

    // Order B wants 7 — only 6 left behind the overlay.
    let err = alloc.reserve("tshirt-m", 7, "ORD-B", ttl()).await.unwrap_err();
    assert_eq!(
        err,
        AllocError::InsufficientStock {
            available: 6,
            requested: 7
        }
    );

    // Payment for A lands: the ledger finally moves.
    let summary = alloc.confirm("ORD-A").await.unwrap();
    assert_eq!(summary.confirmed, 1);
    assert_eq!(catalog.snapshot().await.on_hand("tshirt-m"), 6);
    assert_eq!(alloc.available("tshirt-m").await.unwrap(), 6);

    // B's 6 now fit.
    alloc.reserve("tshirt-m", 6, "ORD-B", ttl()).await.unwrap();
    assert_eq!(alloc.available("tshirt-m").await.unwrap(), 0);

    // The journal replays to the same counts: exactly one sale movement.
    assert!(catalog.verify_integrity().await);
    assert_eq!(catalog.snapshot().await.movement_count, 1);
}
