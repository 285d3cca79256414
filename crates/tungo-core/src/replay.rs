//! Bounded replay window (C2): rejects nonces seen within the last `N`
//! successful insertions, tolerating out-of-order UDP delivery.
//!
//! Backed by a circular array of `N` slots plus a `HashSet` for O(1)
//! membership, mirroring the teacher's pairing of a fixed buffer with a
//! side index (see `openshare-core::manifest` hashing chunks into a
//! lookup table). A single mutex is sufficient; the receive side of a
//! session is the only writer.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::SessionError;
use crate::nonce::NONCE_LEN;

const MIN_CAPACITY: usize = 1024;

pub struct ReplayWindow {
    inner: Mutex<Inner>,
}

struct Inner {
    slots: Vec<Option<[u8; NONCE_LEN]>>,
    seen: HashSet<[u8; NONCE_LEN]>,
    next_slot: usize,
}

impl ReplayWindow {
    /// Capacities below 1024 are silently raised to 1024.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                slots: vec![None; capacity],
                seen: HashSet::with_capacity(capacity),
                next_slot: 0,
            }),
        }
    }

    /// Inserts `nonce`, evicting the oldest entry if the window is full.
    /// Fails if `nonce` is already present.
    pub fn insert(&self, nonce: [u8; NONCE_LEN]) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.seen.contains(&nonce) {
            return Err(SessionError::NonUniqueNonce);
        }

        let slot = inner.next_slot;
        if let Some(evicted) = inner.slots[slot].take() {
            inner.seen.remove(&evicted);
        }
        inner.slots[slot] = Some(nonce);
        inner.seen.insert(nonce);
        inner.next_slot = (slot + 1) % inner.slots.len();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce_for(i: u64) -> [u8; NONCE_LEN] {
        let mut bytes = [0u8; NONCE_LEN];
        bytes[..8].copy_from_slice(&i.to_be_bytes());
        bytes
    }

    #[test]
    fn small_capacity_is_raised_to_floor() {
        let window = ReplayWindow::new(4);
        let inner = window.inner.lock().unwrap();
        assert_eq!(inner.slots.len(), MIN_CAPACITY);
    }

    #[test]
    fn duplicate_within_window_is_rejected() {
        let window = ReplayWindow::new(1024);
        window.insert(nonce_for(1)).unwrap();
        let err = window.insert(nonce_for(1)).unwrap_err();
        assert!(matches!(err, SessionError::NonUniqueNonce));
    }

    #[test]
    fn scenario_s3_eviction_allows_reuse() {
        let window = ReplayWindow::new(1024);
        for i in 0..1024u64 {
            window.insert(nonce_for(i)).unwrap();
        }
        assert!(window.insert(nonce_for(0)).is_err());

        // Inserting one more nonce evicts nonce_for(0), freeing it up again.
        window.insert(nonce_for(1024)).unwrap();
        window.insert(nonce_for(0)).unwrap();
    }

    #[test]
    fn out_of_order_nonces_are_all_accepted() {
        let window = ReplayWindow::new(1024);
        for i in [5u64, 1, 3, 2, 4] {
            window.insert(nonce_for(i)).unwrap();
        }
    }
}
