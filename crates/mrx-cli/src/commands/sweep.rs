//! Reaper command handlers.
//!
//! Covers `mrx reaper sweep-once` — a single sweep cycle for operators who
//! want to drain expired reservations outside the daemon's schedule.
//! Order cancellation is the daemon's wiring concern; the CLI sweep runs
//! release-only.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mrx_allocator::{Allocator, SystemClock};
use mrx_db::{PgCatalogStore, PgReservationStore};
use mrx_reaper::{NullOrderService, Reaper};

/// Execute `mrx reaper sweep-once`.
pub async fn sweep_once() -> Result<()> {
    let pool = mrx_db::connect_from_env().await?;
    let reservations = Arc::new(PgReservationStore::new(pool.clone()));
    let alloc = Arc::new(Allocator::new(
        Arc::new(PgCatalogStore::new(pool)),
        reservations.clone(),
        Arc::new(SystemClock),
    ));

    let reaper = Reaper::new(
        alloc,
        reservations,
        Arc::new(NullOrderService),
        Arc::new(SystemClock),
        Duration::from_secs(60),
    );

    let report = reaper.sweep_once().await?;
    println!(
        "sweep_ok=true expired={} groups={} released={} cancelled={} failures={}",
        report.expired_rows,
        report.groups_processed,
        report.released,
        report.cancel_requested,
        report.failures
    );
    Ok(())
}
