//! Webhook delivery deduplication.
//!
//! GitHub delivers webhooks at-least-once and retries on timeouts, so the
//! same delivery id can arrive more than once. The guard remembers recent
//! ids in a bounded in-memory set; when the set fills up it is cleared
//! wholesale rather than evicted entry by entry, which is enough because
//! retries of one delivery arrive close together. State is process-local:
//! a restart forgets past deliveries, which at worst repeats one review.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct DeliveryGuard {
    seen: Arc<Mutex<HashSet<String>>>,
    capacity: usize,
}

impl Default for DeliveryGuard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DeliveryGuard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Arc::new(Mutex::new(HashSet::new())),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` when this delivery id has not been seen before and the
    /// caller should process it. Marks the id as seen.
    pub fn first_delivery(&self, id: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.contains(id) {
            return false;
        }
        if seen.len() >= self.capacity {
            seen.clear();
        }
        seen.insert(id.to_string());
        true
    }
}
