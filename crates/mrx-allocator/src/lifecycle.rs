//! Reservation lifecycle state machine.
//!
//! A reservation transitions exactly once, from `Reserved` to either
//! `Confirmed` or `Released`. [`transition`] enforces two invariants:
//!
//! 1. **Legal transitions only.** A released claim can never become a sale;
//!    that case returns [`TransitionError`], which callers MUST treat as a
//!    lost-claim signal, not silently swallow.
//! 2. **Idempotent terminal repeats.** Re-applying the transition a row has
//!    already taken is a [`Transition::Noop`] — upstream callers (payment
//!    webhooks, the reaper) retry, and retries must not error.
//!
//! ```text
//!              Confirm                       Release
//!   Reserved ──────────► Confirmed   Reserved ──────────► Released
//!   Confirmed + Confirm → Noop       Released + Release → Noop
//!   Confirmed + Release → Noop       Released + Confirm → TransitionError
//! ```
//!
//! `Confirmed + Release` is a no-op rather than an error: release is the
//! "clear the overlay if anything is still claimed" operation and a
//! confirmed row has no overlay left to clear.

use mrx_schemas::ReservationStatus;

/// Events that drive a reservation's single terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEvent {
    /// Payment succeeded — the claim becomes a permanent ledger decrement.
    Confirm,
    /// Timeout, explicit cancel, or payment failure — the claim is cleared.
    Release,
}

impl ClaimEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimEvent::Confirm => "CONFIRM",
            ClaimEvent::Release => "RELEASE",
        }
    }
}

/// Outcome of applying a [`ClaimEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row moves to this new status.
    Changed(ReservationStatus),
    /// The row is already where this event leads; nothing to do.
    Noop,
}

/// Returned when an event cannot legally be applied in the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ReservationStatus,
    pub event: ClaimEvent,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal reservation transition: {} + {}",
            self.from.as_str(),
            self.event.as_str()
        )
    }
}

impl std::error::Error for TransitionError {}

/// Apply one event to a reservation status.
pub fn transition(
    from: ReservationStatus,
    event: ClaimEvent,
) -> Result<Transition, TransitionError> {
    use ReservationStatus::{Confirmed, Released, Reserved};

    match (from, event) {
        (Reserved, ClaimEvent::Confirm) => Ok(Transition::Changed(Confirmed)),
        (Reserved, ClaimEvent::Release) => Ok(Transition::Changed(Released)),
        (Confirmed, ClaimEvent::Confirm) => Ok(Transition::Noop),
        (Confirmed, ClaimEvent::Release) => Ok(Transition::Noop),
        (Released, ClaimEvent::Release) => Ok(Transition::Noop),
        (Released, ClaimEvent::Confirm) => Err(TransitionError { from, event }),
    }
}
