//! Sweep cycle: scan expired reservations, cancel their orders, clear the
//! overlay.
//!
//! Each cycle runs Idle → Scanning → Acting → Idle. Groups (one per order)
//! are processed independently: a failed cancellation is logged and counted,
//! never propagated into the loop, and release runs regardless of the
//! cancel outcome. The shutdown signal is honored between groups, not
//! mid-group, so no group is left half-cancelled.
//!
//! The sweep only ever calls the allocator's public release path — it never
//! mutates ledger or reservation rows directly, so it is safe to run
//! concurrently with live reserve/confirm/release traffic.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mrx_allocator::{Allocator, Clock, ReservationStore};
use mrx_schemas::ReservationRecord;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::orders::OrderService;

/// Cancellation reason recorded on orders whose reservation timed out.
pub const EXPIRED_REASON: &str = "reservation expired";

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired `Reserved` rows found by the scan.
    pub expired_rows: usize,
    /// Order groups fully processed.
    pub groups_processed: usize,
    /// Rows flipped to `Released` via the allocator.
    pub released: usize,
    /// Orders the order service was asked to cancel.
    pub cancel_requested: usize,
    /// Group-level errors (cancel or release) that were logged and skipped.
    pub failures: usize,
    /// `true` when shutdown interrupted the sweep between groups.
    pub aborted: bool,
}

/// The background expiry sweeper. One instance per deployment.
pub struct Reaper {
    allocator: Arc<Allocator>,
    reservations: Arc<dyn ReservationStore>,
    orders: Arc<dyn OrderService>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Reaper {
    pub fn new(
        allocator: Arc<Allocator>,
        reservations: Arc<dyn ReservationStore>,
        orders: Arc<dyn OrderService>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            allocator,
            reservations,
            orders,
            clock,
            interval,
        }
    }

    /// Run one full sweep with no shutdown signal. For operator tooling and
    /// tests; the daemon loop uses [`Reaper::run`].
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        self.sweep_with(|| false).await
    }

    /// Run the sweep loop until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        // Separate handle for the tick arm: `shutdown.changed()` holds the
        // receiver mutably for its whole select branch.
        let stop_flag = shutdown.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *stop_flag.borrow() {
                        break;
                    }
                    let stop = stop_flag.clone();
                    match self.sweep_with(move || *stop.borrow()).await {
                        Ok(report) if report.expired_rows > 0 => {
                            tracing::info!(
                                expired = report.expired_rows,
                                groups = report.groups_processed,
                                released = report.released,
                                cancelled = report.cancel_requested,
                                failures = report.failures,
                                aborted = report.aborted,
                                "expiry sweep complete"
                            );
                        }
                        Ok(_) => {
                            tracing::debug!("expiry sweep found nothing to do");
                        }
                        Err(err) => {
                            tracing::warn!(
                                error = %format!("{err:#}"),
                                "expiry sweep scan failed; retrying next interval"
                            );
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("reaper loop stopped");
    }

    /// One sweep cycle; `should_stop` is polled between groups.
    ///
    /// # Errors
    /// Only the initial scan can fail the sweep. Per-group failures are
    /// counted in the report and never abort the remaining groups.
    pub async fn sweep_with(&self, should_stop: impl Fn() -> bool) -> Result<SweepReport> {
        let now = self.clock.now();
        let expired = self.reservations.find_expired_reserved(now).await?;

        let mut report = SweepReport {
            expired_rows: expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            return Ok(report);
        }

        for (order_id, rows) in group_by_order(expired) {
            if should_stop() {
                report.aborted = true;
                break;
            }
            self.process_group(&order_id, rows.len(), &mut report).await;
        }
        Ok(report)
    }

    /// One order's group: cancel if still cancellable, then always release.
    async fn process_group(&self, order_id: &str, rows: usize, report: &mut SweepReport) {
        match self.orders.is_cancellable(order_id).await {
            Ok(true) => match self.orders.cancel(order_id, EXPIRED_REASON).await {
                Ok(()) => {
                    report.cancel_requested += 1;
                    tracing::info!(order_id, rows, "expired order cancelled");
                }
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(
                        order_id,
                        error = %format!("{err:#}"),
                        "order cancel failed; overlay will still be cleared"
                    );
                }
            },
            Ok(false) => {
                // Already resolved through another path; release still runs
                // to guarantee the overlay is cleared.
            }
            Err(err) => {
                report.failures += 1;
                tracing::warn!(
                    order_id,
                    error = %format!("{err:#}"),
                    "cancellable check failed; overlay will still be cleared"
                );
            }
        }

        match self.allocator.release(order_id).await {
            Ok(summary) => report.released += summary.released,
            Err(err) => {
                report.failures += 1;
                tracing::warn!(order_id, error = %err, "release failed during sweep");
            }
        }
        report.groups_processed += 1;
    }
}

/// Group expired rows by order, in deterministic order-id order.
fn group_by_order(rows: Vec<ReservationRecord>) -> BTreeMap<String, Vec<ReservationRecord>> {
    let mut groups: BTreeMap<String, Vec<ReservationRecord>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.order_id.clone()).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use mrx_schemas::ReservationStatus;
    use uuid::Uuid;

    fn expired_row(order_id: &str, variant_slug: &str) -> ReservationRecord {
        let now = Utc::now();
        ReservationRecord {
            id: Uuid::new_v4(),
            product_slug: "tshirt".to_string(),
            variant_slug: variant_slug.to_string(),
            order_id: order_id.to_string(),
            quantity: 1,
            reserved_at: now - ChronoDuration::minutes(30),
            expires_at: now - ChronoDuration::minutes(15),
            status: ReservationStatus::Reserved,
        }
    }

    #[test]
    fn grouping_is_per_order_and_deterministic() {
        let rows = vec![
            expired_row("ORD-B", "tshirt-m"),
            expired_row("ORD-A", "tshirt-m"),
            expired_row("ORD-B", "tshirt-s"),
        ];
        let groups = group_by_order(rows);
        let keys: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ORD-A", "ORD-B"]);
        assert_eq!(groups["ORD-B"].len(), 2);
    }

    #[test]
    fn empty_scan_groups_to_nothing() {
        assert!(group_by_order(Vec::new()).is_empty());
    }
}
