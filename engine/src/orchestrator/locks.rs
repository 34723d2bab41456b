//! Per-(user, campaign) draw locks
//!
//! Concurrent draws by the same user in the same campaign are serialised by
//! an advisory lock acquired before the commit step. Acquisition honours a
//! per-request deadline; exceeding it surfaces as a retryable `LockTimeout`,
//! which is safe because idempotency is keyed on the caller-supplied key.
//!
//! Draws for different (user, campaign) pairs proceed in parallel.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Holds the per-(user, campaign) lock until dropped.
#[must_use = "the draw lock is released when the guard drops"]
pub struct DrawLockGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

/// Registry of advisory locks keyed by (user, campaign).
///
/// Lock objects are created on first contact and kept for the life of the
/// registry; the per-pair footprint is one `Arc<Mutex<()>>`.
#[derive(Default)]
pub struct DrawLockRegistry {
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl DrawLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for (user, campaign), waiting at most `timeout`.
    /// Returns `None` on deadline expiry.
    pub fn acquire(
        &self,
        user_id: &str,
        campaign_id: &str,
        timeout: Duration,
    ) -> Option<DrawLockGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry((user_id.to_string(), campaign_id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.try_lock_arc_for(timeout)?;
        Some(DrawLockGuard { _guard: guard })
    }
}
