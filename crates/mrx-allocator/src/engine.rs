//! Allocator engine — overlay accounting with per-variant serialization.
//!
//! # Concurrency discipline
//!
//! Every operation that reads availability and then writes (reserve,
//! confirm, and the warehouse operations) holds the variant's gate for the
//! duration of its read-modify-write — that serializes in-process callers.
//! Every on-hand write additionally carries the version the caller read;
//! a mismatch means another process wrote first, and the operation re-reads
//! and retries up to a bounded budget before surfacing
//! [`AllocError::Conflict`].
//!
//! The ledger is never touched on reserve. Confirm is the only sale path
//! that decrements on-hand, and it refuses — loudly — to cross zero.

use std::sync::Arc;

use chrono::Duration;
use mrx_ledger::{overlay, MovementKind};
use mrx_schemas::{ReservationRecord, ReservationStatus, VariantRecord};
use uuid::Uuid;

use crate::error::AllocError;
use crate::gate::VariantGate;
use crate::lifecycle::{transition, ClaimEvent, Transition};
use crate::stores::{CatalogStore, Clock, ReservationStore, StockWrite};

/// Optimistic-write retry budget used unless overridden.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

/// Result of a successful reserve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveOutcome {
    pub reservation_id: Uuid,
    /// `true` when an active reservation for this (order, variant) already
    /// existed and its id was returned unchanged.
    pub reused: bool,
}

/// Result of a confirm call. Idempotent repeats land in
/// `already_confirmed`; rows released before we got to them count in
/// neither field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmSummary {
    pub confirmed: usize,
    pub already_confirmed: usize,
}

/// Result of a release call. `released == 0` is a successful no-op, not an
/// error — the order may already be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub released: usize,
}

/// One variant's availability inside a batch query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAvailability {
    pub variant_slug: String,
    pub available: i64,
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// The reserve / confirm / release surface over injected stores.
pub struct Allocator {
    catalog: Arc<dyn CatalogStore>,
    reservations: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    gate: VariantGate,
    max_retries: u32,
}

impl Allocator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        reservations: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            reservations,
            clock,
            gate: VariantGate::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the optimistic-write retry budget (must be >= 1).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        debug_assert!(max_retries >= 1);
        self.max_retries = max_retries;
        self
    }

    // -----------------------------------------------------------------------
    // Checkout surface
    // -----------------------------------------------------------------------

    /// Claim `quantity` units of a variant for an order, for `ttl`.
    ///
    /// Never mutates on-hand. Re-reserving an (order, variant) pair that
    /// still has an active claim returns the existing reservation id
    /// unchanged.
    ///
    /// # Errors
    /// [`AllocError::InvalidQuantity`], [`AllocError::NotFound`] (variant),
    /// [`AllocError::InsufficientStock`] with the availability observed at
    /// decision time.
    pub async fn reserve(
        &self,
        variant_slug: &str,
        quantity: i64,
        order_id: &str,
        ttl: Duration,
    ) -> Result<ReserveOutcome, AllocError> {
        if quantity <= 0 {
            return Err(AllocError::InvalidQuantity { quantity });
        }

        let _permit = self.gate.acquire(variant_slug).await;
        let now = self.clock.now();

        if let Some(existing) = self
            .reservations
            .find_active(order_id, variant_slug, now)
            .await
            .map_err(AllocError::store)?
        {
            return Ok(ReserveOutcome {
                reservation_id: existing.id,
                reused: true,
            });
        }

        let variant = self.require_variant(variant_slug).await?;
        let reserved = self
            .reservations
            .active_quantity(variant_slug, now)
            .await
            .map_err(AllocError::store)?;
        let available = overlay::available(variant.on_hand, reserved);

        if available < quantity {
            return Err(AllocError::InsufficientStock {
                available,
                requested: quantity,
            });
        }

        let record = ReservationRecord {
            id: Uuid::new_v4(),
            product_slug: variant.product_slug,
            variant_slug: variant_slug.to_string(),
            order_id: order_id.to_string(),
            quantity,
            reserved_at: now,
            expires_at: now + ttl,
            status: ReservationStatus::Reserved,
        };
        let id = record.id;
        self.reservations
            .insert(record)
            .await
            .map_err(AllocError::store)?;

        tracing::debug!(order_id, variant_slug, quantity, "reservation created");
        Ok(ReserveOutcome {
            reservation_id: id,
            reused: false,
        })
    }

    /// Convert an order's reservations into permanent ledger decrements.
    ///
    /// The only sale path that mutates on-hand. Idempotent: rows already
    /// confirmed are counted, not re-decremented.
    ///
    /// # Errors
    /// [`AllocError::NotFound`] when the order has no reservation rows at
    /// all; [`AllocError::StockInconsistency`] when a decrement would cross
    /// zero (administrative conflict — never clamped);
    /// [`AllocError::Conflict`] when the optimistic retry budget runs out.
    pub async fn confirm(&self, order_id: &str) -> Result<ConfirmSummary, AllocError> {
        let rows = self
            .reservations
            .find_by_order(order_id)
            .await
            .map_err(AllocError::store)?;
        if rows.is_empty() {
            return Err(AllocError::NotFound {
                what: format!("reservations for order '{order_id}'"),
            });
        }

        let mut summary = ConfirmSummary::default();
        for row in rows {
            match transition(row.status, ClaimEvent::Confirm) {
                Ok(Transition::Noop) => summary.already_confirmed += 1,
                Err(_) => {
                    // Released before payment landed — the claim is gone.
                    tracing::debug!(
                        order_id,
                        variant_slug = %row.variant_slug,
                        "claim already released; nothing to confirm"
                    );
                }
                Ok(Transition::Changed(_)) => {
                    let _permit = self.gate.acquire(&row.variant_slug).await;
                    self.confirm_line(order_id, &row, &mut summary).await?;
                }
            }
        }
        Ok(summary)
    }

    /// Clear an order's overlay. No ledger effect — reserve never touched
    /// on-hand, so there is nothing to give back.
    ///
    /// Idempotent: already-resolved rows are skipped and `released == 0`
    /// is a successful no-op.
    pub async fn release(&self, order_id: &str) -> Result<ReleaseSummary, AllocError> {
        let rows = self
            .reservations
            .find_by_order(order_id)
            .await
            .map_err(AllocError::store)?;

        let mut summary = ReleaseSummary::default();
        for row in rows {
            if !matches!(
                transition(row.status, ClaimEvent::Release),
                Ok(Transition::Changed(_))
            ) {
                continue;
            }
            let _permit = self.gate.acquire(&row.variant_slug).await;
            let flipped = self
                .reservations
                .update_status(row.id, ReservationStatus::Reserved, ReservationStatus::Released)
                .await
                .map_err(AllocError::store)?;
            if flipped {
                summary.released += 1;
            }
        }
        if summary.released > 0 {
            tracing::debug!(order_id, released = summary.released, "overlay cleared");
        }
        Ok(summary)
    }

    /// Availability for one variant: on-hand minus active claims.
    ///
    /// Pure read — no gate. Expired-but-unreaped rows are already excluded
    /// by the store query, so availability recovers the instant a
    /// reservation expires, independent of reaper scheduling.
    pub async fn available(&self, variant_slug: &str) -> Result<i64, AllocError> {
        let variant = self.require_variant(variant_slug).await?;
        let reserved = self
            .reservations
            .active_quantity(variant_slug, self.clock.now())
            .await
            .map_err(AllocError::store)?;
        Ok(overlay::available(variant.on_hand, reserved))
    }

    /// Availability for every variant of a product, in slug order.
    pub async fn available_batch(
        &self,
        product_slug: &str,
    ) -> Result<Vec<VariantAvailability>, AllocError> {
        let variants = self
            .catalog
            .list_for_product(product_slug)
            .await
            .map_err(AllocError::store)?;
        let now = self.clock.now();

        let mut out = Vec::with_capacity(variants.len());
        for variant in variants {
            let reserved = self
                .reservations
                .active_quantity(&variant.variant_slug, now)
                .await
                .map_err(AllocError::store)?;
            out.push(VariantAvailability {
                available: overlay::available(variant.on_hand, reserved),
                variant_slug: variant.variant_slug,
            });
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Warehouse surface
    // -----------------------------------------------------------------------

    /// Warehouse intake: on-hand += quantity. Returns the new on-hand count.
    pub async fn import_stock(
        &self,
        variant_slug: &str,
        quantity: i64,
        reason: &str,
    ) -> Result<i64, AllocError> {
        if quantity <= 0 {
            return Err(AllocError::InvalidQuantity { quantity });
        }
        let _permit = self.gate.acquire(variant_slug).await;
        self.write_stock_with_retry(variant_slug, MovementKind::Import, reason, |v| {
            Ok((v.on_hand.saturating_add(quantity), quantity))
        })
        .await
    }

    /// Warehouse outflow: on-hand -= quantity. Fails with
    /// [`AllocError::InsufficientStock`] when the physical count is short.
    pub async fn export_stock(
        &self,
        variant_slug: &str,
        quantity: i64,
        reason: &str,
    ) -> Result<i64, AllocError> {
        if quantity <= 0 {
            return Err(AllocError::InvalidQuantity { quantity });
        }
        let _permit = self.gate.acquire(variant_slug).await;
        self.write_stock_with_retry(variant_slug, MovementKind::Export, reason, |v| {
            overlay::checked_withdraw(v.on_hand, quantity)
                .map(|next| (next, quantity))
                .map_err(|_| AllocError::InsufficientStock {
                    available: v.on_hand,
                    requested: quantity,
                })
        })
        .await
    }

    /// Administrative set of the physical count. Availability may drop to
    /// zero immediately; existing confirmations against the old count will
    /// surface [`AllocError::StockInconsistency`] rather than go negative.
    pub async fn correct_stock(
        &self,
        variant_slug: &str,
        new_on_hand: i64,
        reason: &str,
    ) -> Result<i64, AllocError> {
        if new_on_hand < 0 {
            return Err(AllocError::InvalidQuantity {
                quantity: new_on_hand,
            });
        }
        let _permit = self.gate.acquire(variant_slug).await;
        self.write_stock_with_retry(variant_slug, MovementKind::Correction, reason, |_| {
            Ok((new_on_hand, new_on_hand))
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn require_variant(&self, variant_slug: &str) -> Result<VariantRecord, AllocError> {
        self.catalog
            .get(variant_slug)
            .await
            .map_err(AllocError::store)?
            .ok_or_else(|| AllocError::NotFound {
                what: format!("variant '{variant_slug}'"),
            })
    }

    /// One reserved line of an order: decrement on-hand, then flip the row.
    ///
    /// Caller holds the variant gate. The version check covers writers in
    /// other processes; if the status flip then loses a cross-process race
    /// (the row was released while we wrote), the units are restored and the
    /// line is not counted as confirmed.
    async fn confirm_line(
        &self,
        order_id: &str,
        row: &ReservationRecord,
        summary: &mut ConfirmSummary,
    ) -> Result<(), AllocError> {
        self.write_stock_with_retry(
            &row.variant_slug,
            MovementKind::Sale,
            &format!("order {order_id}"),
            |v| {
                overlay::checked_withdraw(v.on_hand, row.quantity)
                    .map(|next| (next, row.quantity))
                    .map_err(|_| {
                        tracing::error!(
                            order_id,
                            variant_slug = %row.variant_slug,
                            on_hand = v.on_hand,
                            quantity = row.quantity,
                            "confirm would drive on-hand negative; operator review required"
                        );
                        AllocError::StockInconsistency {
                            variant_slug: row.variant_slug.clone(),
                            on_hand: v.on_hand,
                            to_subtract: row.quantity,
                        }
                    })
            },
        )
        .await?;

        let flipped = self
            .reservations
            .update_status(row.id, ReservationStatus::Reserved, ReservationStatus::Confirmed)
            .await
            .map_err(AllocError::store)?;
        if flipped {
            summary.confirmed += 1;
            return Ok(());
        }

        // The row resolved in another process while we wrote the ledger;
        // give the units back before deciding how to count the line.
        self.write_stock_with_retry(
            &row.variant_slug,
            MovementKind::Import,
            &format!("sale reversal, order {order_id}"),
            |v| Ok((v.on_hand.saturating_add(row.quantity), row.quantity)),
        )
        .await?;

        let current = self
            .reservations
            .find_by_order(order_id)
            .await
            .map_err(AllocError::store)?
            .into_iter()
            .find(|r| r.id == row.id)
            .map(|r| r.status);
        match current {
            Some(ReservationStatus::Confirmed) => summary.already_confirmed += 1,
            other => tracing::warn!(
                order_id,
                variant_slug = %row.variant_slug,
                status = ?other,
                "confirm lost the terminal race; units restored"
            ),
        }
        Ok(())
    }

    /// Versioned read-modify-write with a bounded retry budget.
    ///
    /// `compute` maps the freshly read variant to (new on-hand, movement
    /// quantity) or a business error; it runs once per attempt.
    async fn write_stock_with_retry<F>(
        &self,
        variant_slug: &str,
        kind: MovementKind,
        reason: &str,
        compute: F,
    ) -> Result<i64, AllocError>
    where
        F: Fn(&VariantRecord) -> Result<(i64, i64), AllocError>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let variant = self.require_variant(variant_slug).await?;
            let (new_on_hand, quantity) = compute(&variant)?;
            let applied = self
                .catalog
                .update_stock(StockWrite {
                    variant_slug: variant_slug.to_string(),
                    expected_version: variant.version,
                    new_on_hand,
                    kind,
                    quantity,
                    reason: reason.to_string(),
                })
                .await
                .map_err(AllocError::store)?;
            if applied {
                return Ok(new_on_hand);
            }
            if attempt >= self.max_retries {
                return Err(AllocError::Conflict { attempts: attempt });
            }
            tracing::debug!(
                variant_slug,
                attempt,
                kind = kind.as_str(),
                "stock version moved; retrying write"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
