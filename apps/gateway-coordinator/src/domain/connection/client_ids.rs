//! Client identifier allocation for side-channel gateway sessions.
//!
//! Connection tests must not reuse the client id of a live session, and two
//! concurrent tests must not share one either. A single allocator owns the
//! set of leased ids; a lease returns its id when dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Hands out unique client ids starting from a requested base.
#[derive(Debug, Clone, Default)]
pub struct ClientIdAllocator {
    leased: Arc<Mutex<BTreeSet<i32>>>,
}

impl ClientIdAllocator {
    /// Create an allocator with no ids leased.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease the first free id at or above `base`.
    ///
    /// Returns `None` only when every id from `base` to `i32::MAX` is taken.
    #[must_use]
    pub fn lease_from(&self, base: i32) -> Option<ClientIdLease> {
        let mut leased = self.leased.lock();
        let mut candidate = base;
        while leased.contains(&candidate) {
            candidate = candidate.checked_add(1)?;
        }
        leased.insert(candidate);
        Some(ClientIdLease {
            id: candidate,
            leased: Arc::clone(&self.leased),
        })
    }

    /// Number of ids currently leased.
    #[must_use]
    pub fn leased_count(&self) -> usize {
        self.leased.lock().len()
    }
}

/// A leased client id; released on drop.
#[derive(Debug)]
pub struct ClientIdLease {
    id: i32,
    leased: Arc<Mutex<BTreeSet<i32>>>,
}

impl ClientIdLease {
    /// The leased id.
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.id
    }
}

impl Drop for ClientIdLease {
    fn drop(&mut self) {
        self.leased.lock().remove(&self.id);
    }
}
