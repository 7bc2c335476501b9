//! Warehouse stock command handlers.
//!
//! Covers `mrx stock import|export|correct|available|available-batch`.
//! Every mutation is routed through the allocator so it shares the same
//! per-variant write discipline as checkout confirmation.

use std::sync::Arc;

use anyhow::Result;
use mrx_allocator::{Allocator, SystemClock};
use mrx_db::{PgCatalogStore, PgReservationStore};

async fn allocator() -> Result<Allocator> {
    let pool = mrx_db::connect_from_env().await?;
    Ok(Allocator::new(
        Arc::new(PgCatalogStore::new(pool.clone())),
        Arc::new(PgReservationStore::new(pool)),
        Arc::new(SystemClock),
    ))
}

/// Execute `mrx stock import`.
pub async fn import(variant: &str, qty: i64, reason: &str) -> Result<()> {
    let alloc = allocator().await?;
    let on_hand = alloc.import_stock(variant, qty, reason).await?;
    println!("import_ok=true variant={variant} qty={qty} on_hand={on_hand}");
    Ok(())
}

/// Execute `mrx stock export`.
pub async fn export(variant: &str, qty: i64, reason: &str) -> Result<()> {
    let alloc = allocator().await?;
    let on_hand = alloc.export_stock(variant, qty, reason).await?;
    println!("export_ok=true variant={variant} qty={qty} on_hand={on_hand}");
    Ok(())
}

/// Execute `mrx stock correct`.
pub async fn correct(variant: &str, count: i64, reason: &str) -> Result<()> {
    let alloc = allocator().await?;
    let on_hand = alloc.correct_stock(variant, count, reason).await?;
    println!("correct_ok=true variant={variant} on_hand={on_hand}");
    Ok(())
}

/// Execute `mrx stock available`.
pub async fn available(variant: &str) -> Result<()> {
    let alloc = allocator().await?;
    let available = alloc.available(variant).await?;
    println!("variant={variant} available={available}");
    Ok(())
}

/// Execute `mrx stock available-batch`.
pub async fn available_batch(product: &str) -> Result<()> {
    let alloc = allocator().await?;
    let batch = alloc.available_batch(product).await?;
    for entry in batch {
        println!(
            "variant={} available={}",
            entry.variant_slug, entry.available
        );
    }
    Ok(())
}
