//! Stock book — makes the on-hand invariants explicit and isolated.
//!
//! # Purpose
//! [`overlay`](crate::overlay) contains the raw availability arithmetic.
//! This module wraps per-variant counts behind a typed, journal-backed
//! [`StockBook`] façade that:
//!
//! - Enforces ledger invariants on every commit (counts never negative,
//!   quantities positive, slugs non-empty).
//! - Exposes only the minimal write surface ([`StockBook::add_variant`],
//!   [`StockBook::commit`]).
//! - Tracks a per-variant version counter, incremented on every committed
//!   movement, for optimistic writers layered on top.
//! - Provides read-only snapshot views and an O(n) journal-replay
//!   integrity check.
//!
//! # Determinism
//! `StockBook` is deterministic and pure — no IO, no time, no randomness.
//! Two books fed the same sequence of movements always hold identical state.

use std::collections::BTreeMap;

use crate::overlay::checked_withdraw;
use crate::types::{Movement, MovementKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// All invariant violations the stock book can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The variant slug is not present in the book.
    UnknownVariant { variant_slug: String },
    /// A variant with this slug already exists.
    DuplicateVariant { variant_slug: String },
    /// Slugs must be non-empty.
    EmptySlug,
    /// Import/Export/Sale quantity must be strictly positive.
    NonPositiveQuantity { quantity: i64 },
    /// A correction target must be non-negative.
    NegativeCorrection { quantity: i64 },
    /// The movement would drive on-hand below zero.
    StockWouldGoNegative { on_hand: i64, requested: i64 },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownVariant { variant_slug } => {
                write!(f, "ledger: unknown variant '{variant_slug}'")
            }
            Self::DuplicateVariant { variant_slug } => {
                write!(f, "ledger: variant '{variant_slug}' already exists")
            }
            Self::EmptySlug => write!(f, "ledger invariant: slug must not be empty"),
            Self::NonPositiveQuantity { quantity } => {
                write!(f, "ledger invariant: quantity must be > 0, got {quantity}")
            }
            Self::NegativeCorrection { quantity } => {
                write!(f, "ledger invariant: correction target must be >= 0, got {quantity}")
            }
            Self::StockWouldGoNegative { on_hand, requested } => write!(
                f,
                "ledger invariant: withdrawing {requested} from on_hand {on_hand} would go negative"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Per-variant state
// ---------------------------------------------------------------------------

/// Current book state for one variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantStock {
    pub product_slug: String,
    pub variant_slug: String,
    /// Authoritative physical count. Never negative.
    pub on_hand: i64,
    /// Incremented on every committed movement; starts at 1.
    pub version: i64,
}

// ---------------------------------------------------------------------------
// Snapshot (read-only view)
// ---------------------------------------------------------------------------

/// A point-in-time read-only view of the book's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Variants keyed by slug.
    pub variants: BTreeMap<String, VariantStock>,
    /// Total number of committed movements.
    pub movement_count: usize,
}

impl BookSnapshot {
    /// On-hand count for a slug (0 if unknown).
    pub fn on_hand(&self, variant_slug: &str) -> i64 {
        self.variants.get(variant_slug).map(|v| v.on_hand).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// StockBook
// ---------------------------------------------------------------------------

/// Journal-backed stock book with invariant enforcement.
///
/// The journal is append-only; the per-variant counts are the incremental
/// state derived from it. The book is **not** mutated when a commit fails.
#[derive(Clone, Debug, Default)]
pub struct StockBook {
    variants: BTreeMap<String, VariantStock>,
    initial: BTreeMap<String, i64>,
    journal: Vec<Movement>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Register a variant with its initial on-hand count.
    ///
    /// # Errors
    /// Returns [`LedgerError`] on empty slugs, a negative initial count, or
    /// a duplicate slug.
    pub fn add_variant(
        &mut self,
        product_slug: impl Into<String>,
        variant_slug: impl Into<String>,
        initial_on_hand: i64,
    ) -> Result<(), LedgerError> {
        let product_slug = product_slug.into();
        let variant_slug = variant_slug.into();
        if product_slug.trim().is_empty() || variant_slug.trim().is_empty() {
            return Err(LedgerError::EmptySlug);
        }
        if initial_on_hand < 0 {
            return Err(LedgerError::NegativeCorrection {
                quantity: initial_on_hand,
            });
        }
        if self.variants.contains_key(&variant_slug) {
            return Err(LedgerError::DuplicateVariant { variant_slug });
        }
        self.initial.insert(variant_slug.clone(), initial_on_hand);
        self.variants.insert(
            variant_slug.clone(),
            VariantStock {
                product_slug,
                variant_slug,
                on_hand: initial_on_hand,
                version: 1,
            },
        );
        Ok(())
    }

    /// Commit a movement, enforcing all invariants.
    ///
    /// Returns the variant's new version number.
    ///
    /// # Errors
    /// Returns [`LedgerError`] if any invariant is violated. The book is
    /// **not** mutated on error.
    pub fn commit(&mut self, movement: Movement) -> Result<i64, LedgerError> {
        if movement.variant_slug.trim().is_empty() {
            return Err(LedgerError::EmptySlug);
        }
        let stock = self
            .variants
            .get_mut(&movement.variant_slug)
            .ok_or_else(|| LedgerError::UnknownVariant {
                variant_slug: movement.variant_slug.clone(),
            })?;

        let new_on_hand = apply_movement(stock.on_hand, movement.kind, movement.quantity)?;

        stock.on_hand = new_on_hand;
        stock.version += 1;
        let version = stock.version;
        self.journal.push(movement);
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Current state for one variant.
    pub fn variant(&self, variant_slug: &str) -> Option<&VariantStock> {
        self.variants.get(variant_slug)
    }

    /// All variants belonging to a product, in slug order.
    pub fn variants_for_product(&self, product_slug: &str) -> Vec<&VariantStock> {
        self.variants
            .values()
            .filter(|v| v.product_slug == product_slug)
            .collect()
    }

    /// Return a cloned snapshot of the current book state.
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            variants: self.variants.clone(),
            movement_count: self.journal.len(),
        }
    }

    /// Committed movements, oldest first.
    pub fn journal(&self) -> &[Movement] {
        &self.journal
    }

    /// Replay the journal over the initial counts and verify the result
    /// matches the running incremental state. Returns `true` if consistent.
    ///
    /// This is an integrity check — O(n) replay — for tests, startup
    /// verification, or audit flows only.
    pub fn verify_integrity(&self) -> bool {
        let mut counts: BTreeMap<String, i64> = self.initial.clone();
        for mv in &self.journal {
            let Some(on_hand) = counts.get(&mv.variant_slug).copied() else {
                return false;
            };
            let Ok(next) = apply_movement(on_hand, mv.kind, mv.quantity) else {
                return false;
            };
            counts.insert(mv.variant_slug.clone(), next);
        }
        self.variants
            .iter()
            .all(|(slug, v)| counts.get(slug).copied() == Some(v.on_hand))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn apply_movement(on_hand: i64, kind: MovementKind, quantity: i64) -> Result<i64, LedgerError> {
    match kind {
        MovementKind::Import => {
            if quantity <= 0 {
                return Err(LedgerError::NonPositiveQuantity { quantity });
            }
            Ok(on_hand.saturating_add(quantity))
        }
        MovementKind::Export | MovementKind::Sale => checked_withdraw(on_hand, quantity),
        MovementKind::Correction => {
            if quantity < 0 {
                return Err(LedgerError::NegativeCorrection { quantity });
            }
            Ok(quantity)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with(slug: &str, on_hand: i64) -> StockBook {
        let mut b = StockBook::new();
        b.add_variant("tshirt", slug, on_hand).unwrap();
        b
    }

    fn mv(slug: &str, kind: MovementKind, qty: i64) -> Movement {
        Movement::new(slug, kind, qty, "test")
    }

    // --- Variant registration ---

    #[test]
    fn rejects_empty_slug() {
        let mut b = StockBook::new();
        assert_eq!(b.add_variant("tshirt", "", 5), Err(LedgerError::EmptySlug));
        assert_eq!(b.add_variant("", "tshirt-m", 5), Err(LedgerError::EmptySlug));
    }

    #[test]
    fn rejects_duplicate_variant() {
        let mut b = book_with("tshirt-m", 5);
        assert_eq!(
            b.add_variant("tshirt", "tshirt-m", 3),
            Err(LedgerError::DuplicateVariant {
                variant_slug: "tshirt-m".to_string()
            })
        );
    }

    #[test]
    fn rejects_negative_initial_count() {
        let mut b = StockBook::new();
        assert_eq!(
            b.add_variant("tshirt", "tshirt-m", -1),
            Err(LedgerError::NegativeCorrection { quantity: -1 })
        );
    }

    // --- Invariant enforcement on commit ---

    #[test]
    fn rejects_unknown_variant() {
        let mut b = StockBook::new();
        let err = b.commit(mv("ghost", MovementKind::Import, 1));
        assert_eq!(
            err,
            Err(LedgerError::UnknownVariant {
                variant_slug: "ghost".to_string()
            })
        );
    }

    #[test]
    fn rejects_zero_quantity_import() {
        let mut b = book_with("tshirt-m", 5);
        let err = b.commit(mv("tshirt-m", MovementKind::Import, 0));
        assert_eq!(err, Err(LedgerError::NonPositiveQuantity { quantity: 0 }));
        assert_eq!(b.snapshot().movement_count, 0); // book not mutated
    }

    #[test]
    fn rejects_export_past_zero() {
        let mut b = book_with("tshirt-m", 3);
        let err = b.commit(mv("tshirt-m", MovementKind::Export, 4));
        assert_eq!(
            err,
            Err(LedgerError::StockWouldGoNegative {
                on_hand: 3,
                requested: 4
            })
        );
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 3);
    }

    #[test]
    fn rejects_sale_past_zero() {
        let mut b = book_with("tshirt-m", 1);
        let err = b.commit(mv("tshirt-m", MovementKind::Sale, 2));
        assert_eq!(
            err,
            Err(LedgerError::StockWouldGoNegative {
                on_hand: 1,
                requested: 2
            })
        );
    }

    #[test]
    fn rejects_negative_correction() {
        let mut b = book_with("tshirt-m", 5);
        let err = b.commit(mv("tshirt-m", MovementKind::Correction, -1));
        assert_eq!(err, Err(LedgerError::NegativeCorrection { quantity: -1 }));
    }

    // --- Movement semantics ---

    #[test]
    fn import_increases_on_hand() {
        let mut b = book_with("tshirt-m", 5);
        b.commit(mv("tshirt-m", MovementKind::Import, 7)).unwrap();
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 12);
    }

    #[test]
    fn export_decreases_on_hand() {
        let mut b = book_with("tshirt-m", 5);
        b.commit(mv("tshirt-m", MovementKind::Export, 2)).unwrap();
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 3);
    }

    #[test]
    fn sale_decreases_on_hand_to_zero() {
        let mut b = book_with("tshirt-m", 2);
        b.commit(mv("tshirt-m", MovementKind::Sale, 2)).unwrap();
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 0);
    }

    #[test]
    fn correction_sets_absolute_count() {
        let mut b = book_with("tshirt-m", 5);
        b.commit(mv("tshirt-m", MovementKind::Correction, 42)).unwrap();
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 42);
        b.commit(mv("tshirt-m", MovementKind::Correction, 0)).unwrap();
        assert_eq!(b.variant("tshirt-m").unwrap().on_hand, 0);
    }

    // --- Version counter ---

    #[test]
    fn version_advances_on_every_commit() {
        let mut b = book_with("tshirt-m", 5);
        assert_eq!(b.variant("tshirt-m").unwrap().version, 1);
        let v2 = b.commit(mv("tshirt-m", MovementKind::Import, 1)).unwrap();
        assert_eq!(v2, 2);
        let v3 = b.commit(mv("tshirt-m", MovementKind::Sale, 1)).unwrap();
        assert_eq!(v3, 3);
    }

    #[test]
    fn failed_commit_does_not_advance_version() {
        let mut b = book_with("tshirt-m", 1);
        let _ = b.commit(mv("tshirt-m", MovementKind::Export, 5));
        assert_eq!(b.variant("tshirt-m").unwrap().version, 1);
    }

    // --- Product listing ---

    #[test]
    fn variants_for_product_filters_by_product() {
        let mut b = StockBook::new();
        b.add_variant("tshirt", "tshirt-s", 1).unwrap();
        b.add_variant("tshirt", "tshirt-m", 2).unwrap();
        b.add_variant("mug", "mug-std", 9).unwrap();

        let slugs: Vec<&str> = b
            .variants_for_product("tshirt")
            .iter()
            .map(|v| v.variant_slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["tshirt-m", "tshirt-s"]);
    }

    // --- Snapshot ---

    #[test]
    fn snapshot_reflects_current_state() {
        let mut b = book_with("tshirt-m", 5);
        b.commit(mv("tshirt-m", MovementKind::Sale, 2)).unwrap();

        let snap = b.snapshot();
        assert_eq!(snap.on_hand("tshirt-m"), 3);
        assert_eq!(snap.on_hand("ghost"), 0);
        assert_eq!(snap.movement_count, 1);
    }

    // --- Integrity verification ---

    #[test]
    fn verify_integrity_passes_after_normal_operations() {
        let mut b = StockBook::new();
        b.add_variant("tshirt", "tshirt-m", 10).unwrap();
        b.add_variant("mug", "mug-std", 4).unwrap();
        b.commit(mv("tshirt-m", MovementKind::Import, 5)).unwrap();
        b.commit(mv("tshirt-m", MovementKind::Sale, 3)).unwrap();
        b.commit(mv("mug-std", MovementKind::Correction, 2)).unwrap();

        assert!(b.verify_integrity());
    }

    #[test]
    fn fresh_book_is_consistent() {
        let b = book_with("tshirt-m", 7);
        assert!(b.verify_integrity());
        assert_eq!(b.journal().len(), 0);
    }
}
