//! Scenario: retried terminal transitions are observationally identical to
//! a single call.
//!
//! # Invariant under test
//!
//! Payment webhooks and the reaper both retry; a repeated reserve returns
//! the same id without double-subtracting, a repeated confirm never
//! decrements twice, and a repeated release stays a no-op.

use std::sync::Arc;

use chrono::Duration;
use mrx_allocator::Allocator;
use mrx_testkit::{ManualClock, MemoryCatalog, MemoryReservationStore};

fn ttl() -> Duration {
    Duration::minutes(15)
}

async fn stack(on_hand: i64) -> (Allocator, Arc<MemoryCatalog>) {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_variant("tshirt", "tshirt-m", on_hand).await.unwrap();
    let alloc = Allocator::new(
        catalog.clone(),
        Arc::new(MemoryReservationStore::new()),
        Arc::new(ManualClock::new()),
    );
    (alloc, catalog)
}

#[tokio::test]
async fn repeated_reserve_returns_the_same_claim() {
    let (alloc, _) = stack(10).await;

    let first = alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();
    let second = alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();
    let third = alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();

    assert_eq!(first.reservation_id, second.reservation_id);
    assert_eq!(first.reservation_id, third.reservation_id);
    assert!(!first.reused);
    assert!(second.reused && third.reused);
    assert_eq!(alloc.available("tshirt-m").await.unwrap(), 6);
}

#[tokio::test]
async fn repeated_confirm_decrements_exactly_once() {
    let (alloc, catalog) = stack(10).await;
    alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();

    alloc.confirm("ORD-A").await.unwrap();
    alloc.confirm("ORD-A").await.unwrap();
    let third = alloc.confirm("ORD-A").await.unwrap();

    assert_eq!(third.confirmed, 0);
    assert_eq!(third.already_confirmed, 1);
    assert_eq!(catalog.snapshot().await.on_hand("tshirt-m"), 6);
    // One sale in the journal, not three.
    assert_eq!(catalog.snapshot().await.movement_count, 1);
}

#[tokio::test]
async fn repeated_release_stays_a_noop() {
    let (alloc, catalog) = stack(10).await;
    alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();

    let first = alloc.release("ORD-A").await.unwrap();
    let second = alloc.release("ORD-A").await.unwrap();

    assert_eq!(first.released, 1);
    assert_eq!(second.released, 0);
    assert_eq!(alloc.available("tshirt-m").await.unwrap(), 10);
    // Release never writes the ledger.
    assert_eq!(catalog.snapshot().await.movement_count, 0);
}

#[tokio::test]
async fn release_then_confirm_does_not_resurrect_the_claim() {
    let (alloc, catalog) = stack(10).await;
    alloc.reserve("tshirt-m", 4, "ORD-A", ttl()).await.unwrap();
    alloc.release("ORD-A").await.unwrap();

    // Late payment webhook: the claim is gone, nothing confirms.
    let summary = alloc.confirm("ORD-A").await.unwrap();
    assert_eq!(summary.confirmed, 0);
    assert_eq!(summary.already_confirmed, 0);
    assert_eq!(catalog.snapshot().await.on_hand("tshirt-m"), 10);
}
