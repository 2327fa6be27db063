//! Sticky egress routing
//!
//! Requests carrying the same sticky key always leave through the same
//! egress slot (a proxy, or the direct connection) for the lifetime of the
//! client, so a session is never seen hopping between addresses. The table
//! is shared across concurrent scrapes; assignment is idempotent.
//!
//! The table holds at most [`MAX_ROUTES`] keys. Keys arriving after that are
//! not stored; their slot is derived from a SHA-256 of the key instead.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Default bound on remembered keys
pub const MAX_ROUTES: usize = 4096;

/// Key → egress slot table
#[derive(Debug)]
pub struct StickyRoutes {
    slots: usize,
    capacity: usize,
    table: RwLock<HashMap<String, usize>>,
    next: AtomicUsize,
}

impl StickyRoutes {
    /// Create a table distributing keys over `slots` egress slots
    pub fn new(slots: usize) -> Self {
        Self::with_capacity(slots, MAX_ROUTES)
    }

    /// Same as [`StickyRoutes::new`], remembering at most `capacity` keys
    pub fn with_capacity(slots: usize, capacity: usize) -> Self {
        Self {
            slots: slots.max(1),
            capacity,
            table: RwLock::new(HashMap::new()),
            next: AtomicUsize::new(0),
        }
    }

    /// Number of egress slots
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Slot for `key`, assigning the next slot round-robin on first use
    ///
    /// Once the table is full, unseen keys get [`StickyRoutes::hashed_slot`].
    pub fn slot_for(&self, key: &str) -> usize {
        if let Some(slot) = self
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return *slot;
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = table.get(key) {
            return *slot;
        }
        if table.len() >= self.capacity {
            return self.hashed_slot(key);
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.slots;
        table.insert(key.to_string(), slot);
        slot
    }

    /// Stable slot for `key` derived from its SHA-256
    pub fn hashed_slot(&self, key: &str) -> usize {
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.slots as u64) as usize
    }

    /// Number of keys assigned so far
    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_assignment_is_stable() {
        let routes = StickyRoutes::new(3);
        let first = routes.slot_for("example-cafe");
        for _ in 0..10 {
            assert_eq!(routes.slot_for("example-cafe"), first);
        }
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_keys_spread_round_robin() {
        let routes = StickyRoutes::new(2);
        assert_eq!(routes.slot_for("a"), 0);
        assert_eq!(routes.slot_for("b"), 1);
        assert_eq!(routes.slot_for("c"), 0);
        assert_eq!(routes.slot_for("a"), 0);
    }

    #[test]
    fn test_full_table_stops_growing() {
        let routes = StickyRoutes::with_capacity(3, 2);
        routes.slot_for("a");
        routes.slot_for("b");

        let overflow = routes.slot_for("c");
        assert_eq!(routes.len(), 2);
        assert_eq!(overflow, routes.hashed_slot("c"));
        for _ in 0..5 {
            assert_eq!(routes.slot_for("c"), overflow);
        }
        assert_eq!(routes.slot_for("a"), 0);
        assert!(overflow < routes.slots());
    }

    #[test]
    fn test_zero_slots_means_single_slot() {
        let routes = StickyRoutes::new(0);
        assert_eq!(routes.slots(), 1);
        assert_eq!(routes.slot_for("x"), 0);
    }

    #[test]
    fn test_concurrent_assignment_agrees() {
        let routes = Arc::new(StickyRoutes::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let routes = Arc::clone(&routes);
                std::thread::spawn(move || routes.slot_for("shared-session"))
            })
            .collect();

        let slots: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(routes.len(), 1);
    }
}
