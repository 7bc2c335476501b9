/// The four committed operations that may mutate a variant's on-hand count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MovementKind {
    /// Warehouse intake: on-hand increases by `quantity`.
    Import,
    /// Warehouse outflow: on-hand decreases by `quantity`.
    Export,
    /// Administrative set: on-hand becomes `quantity`.
    Correction,
    /// Confirmed sale: on-hand decreases by `quantity`.
    Sale,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Import => "IMPORT",
            MovementKind::Export => "EXPORT",
            MovementKind::Correction => "CORRECTION",
            MovementKind::Sale => "SALE",
        }
    }
}

/// A single committed stock mutation (the journal atom).
///
/// `quantity` is always non-negative; its meaning depends on `kind`
/// (delta for Import/Export/Sale, absolute target for Correction).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Movement {
    pub variant_slug: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
}

impl Movement {
    pub fn new<S: Into<String>, R: Into<String>>(
        variant_slug: S,
        kind: MovementKind,
        quantity: i64,
        reason: R,
    ) -> Self {
        debug_assert!(quantity >= 0, "Movement.quantity must be >= 0");
        Self {
            variant_slug: variant_slug.into(),
            kind,
            quantity,
            reason: reason.into(),
        }
    }
}
