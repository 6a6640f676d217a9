//! Round-robin placement cursor.
//!
//! Marks where the dispatcher's next placement scan begins. Unlike a plain
//! round-robin counter, the cursor advances past the *winner* of each scan
//! rather than by draw, so successful placements rotate through the fleet
//! even when the best-fit choice skips ahead.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Scan origin for best-fit placement over the node sequence.
///
/// Uses `AtomicUsize` so reads never contend with membership changes. The
/// stored value may exceed the current fleet size after a scale-in; it is
/// always reduced modulo the live count before use.
pub struct PlacementCursor {
    next: AtomicUsize,
}

impl PlacementCursor {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }

    /// Index to start the next scan at, reduced modulo `count`.
    ///
    /// Returns `None` if the fleet is empty.
    pub fn start(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        Some(self.next.load(Ordering::Relaxed) % count)
    }

    /// Record a successful placement: the next scan starts just past the
    /// winning node.
    pub fn advance_past(&self, winner: usize, count: usize) {
        debug_assert!(count > 0 && winner < count);
        self.next.store((winner + 1) % count, Ordering::Relaxed);
    }

    /// Current raw cursor value (for diagnostics).
    pub fn current(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for PlacementCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fleet_has_no_start() {
        let cursor = PlacementCursor::new();
        assert_eq!(cursor.start(0), None);
    }

    #[test]
    fn advances_past_winner() {
        let cursor = PlacementCursor::new();

        assert_eq!(cursor.start(3), Some(0));
        cursor.advance_past(0, 3);
        assert_eq!(cursor.current(), 1);
        assert_eq!(cursor.start(3), Some(1));
        cursor.advance_past(1, 3);
        assert_eq!(cursor.start(3), Some(2));
        cursor.advance_past(2, 3);
        assert_eq!(cursor.start(3), Some(0)); // wraps
    }

    #[test]
    fn winner_ahead_of_start_skips_the_gap() {
        let cursor = PlacementCursor::new();

        // Scan started at 0 but node 2 won; next scan starts at 0 again
        // only after the full wrap.
        cursor.advance_past(2, 3);
        assert_eq!(cursor.start(3), Some(0));
        cursor.advance_past(1, 3);
        assert_eq!(cursor.start(3), Some(2));
    }

    #[test]
    fn adapts_to_shrinking_fleet() {
        let cursor = PlacementCursor::new();

        cursor.advance_past(3, 5);
        assert_eq!(cursor.start(5), Some(4));
        // Fleet shrank to 2 nodes; the stale cursor folds back in range.
        assert_eq!(cursor.start(2), Some(0));
    }
}
