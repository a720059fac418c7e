//! Round-robin selection with liveness skipping.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::service::Service;

/// Round-robin selector.
/// Stores the rotation cursor; the services themselves live in the pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next alive service in insertion order.
    ///
    /// Claims the slot under the cursor, then walks at most one lap. When the
    /// claimed slot is dead and a later one answers, the cursor jumps past the
    /// answer so the following call continues from there.
    pub fn next_server(&self, services: &[Arc<Service>]) -> Option<Arc<Service>> {
        if services.is_empty() {
            return None;
        }

        let len = services.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;

        let index = scan(len, start, |i| services[i].is_alive())?;
        if index != start {
            self.cursor.store((index + 1) % len, Ordering::Relaxed);
        }
        Some(services[index].clone())
    }
}

/// Index of the first alive slot in `start, start+1, ..` wrapping once.
///
/// `is_alive` is consulted at most `len` times.
pub(crate) fn scan(len: usize, start: usize, mut is_alive: impl FnMut(usize) -> bool) -> Option<usize> {
    (start..start + len).map(|i| i % len).find(|&i| is_alive(i))
}
