//! Shared record types for the Merx inventory engine.
//!
//! These are the serialized shapes exchanged between the allocator, the
//! persistence layer, and operational tooling. Pure data — no IO, no logic
//! beyond small status helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable unit as seen by the inventory engine.
///
/// `on_hand` is the authoritative physical count (never negative).
/// `version` increases on every stock write and backs optimistic
/// concurrency at the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub product_slug: String,
    pub variant_slug: String,
    pub on_hand: i64,
    pub version: i64,
}

/// Lifecycle status of a reservation.
///
/// A reservation is born `Reserved` and transitions exactly once, to either
/// `Confirmed` or `Released`. Both terminal states are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Reserved,
    Confirmed,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "RESERVED",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Released => "RELEASED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RESERVED" => Some(ReservationStatus::Reserved),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "RELEASED" => Some(ReservationStatus::Released),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Released)
    }
}

/// A temporary claim of `quantity` units against one variant, correlated to
/// one external order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: Uuid,
    pub product_slug: String,
    pub variant_slug: String,
    /// External correlation key supplied by the checkout flow.
    pub order_id: String,
    pub quantity: i64,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl ReservationRecord {
    /// A reservation counts against availability only while it is `Reserved`
    /// and not yet expired. Expired rows stop counting immediately, without
    /// waiting for the reaper to flip them.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at > now
    }

    /// `Reserved` past its expiry — the reaper's work queue.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at <= now
    }
}
