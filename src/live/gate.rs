//! Throttle deciding which live readings reach durable history.
//!
//! Policy: a fixed wall-clock interval. A reading is approved when no write
//! has happened yet, or when at least `interval` has elapsed since the
//! last-saved marker. Readings stamped before the marker are always rejected,
//! so history is never written out of order relative to it.

use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct PersistenceGate {
    interval: Duration,
    last_saved: Option<DateTime<Utc>>,
}

/// An approved slot. The marker already points at it; hand it back through
/// [`PersistenceGate::release`] if the write does not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl PersistenceGate {
    pub fn new(interval: Duration, last_saved: Option<DateTime<Utc>>) -> Self {
        Self {
            interval,
            last_saved,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn allows(&self, at: DateTime<Utc>) -> bool {
        let Some(marker) = self.last_saved else {
            return true;
        };

        // Negative elapsed time fails the conversion: reading predates the marker.
        match at.signed_duration_since(marker).to_std() {
            Ok(elapsed) => elapsed >= self.interval,
            Err(_) => false,
        }
    }

    /// Approve `at` and move the marker to it, or `None` on rejection.
    pub fn try_reserve(&mut self, at: DateTime<Utc>) -> Option<Reservation> {
        if !self.allows(at) {
            return None;
        }

        let reservation = Reservation {
            at,
            previous: self.last_saved,
        };
        self.last_saved = Some(at);
        Some(reservation)
    }

    /// Undo a reservation whose write failed. A no-op if the marker has moved
    /// on since (e.g. a manual save landed in between).
    pub fn release(&mut self, reservation: Reservation) {
        if self.last_saved == Some(reservation.at) {
            self.last_saved = reservation.previous;
        }
    }

    /// Record a write that bypassed the interval check. Never moves backwards.
    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved = Some(match self.last_saved {
            Some(marker) if marker > at => marker,
            _ => at,
        });
    }
}
