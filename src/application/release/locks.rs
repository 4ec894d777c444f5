//! Concurrency primitives for the release engine
//!
//! Two rules from the scheduling model:
//! - operations on the same (site, target) pair are serialized; pairs are
//!   otherwise independent and run in parallel;
//! - calls into one destination adapter are bounded, so platform rate
//!   limits are respected.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::domain::value_objects::{ReleaseTarget, SiteId};

/// Per-(site, target) mutual exclusion
///
/// `acquire` hands out a shared mutex for the key; the caller holds its
/// guard for the duration of the activation or rollback. Two activations
/// racing on one pair would otherwise leave the recorded active deploy
/// inconsistent with the destination's served pointer.
#[derive(Default)]
pub struct TargetLocks {
    inner: Mutex<HashMap<(SiteId, ReleaseTarget), Arc<Mutex<()>>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if needed) the lock for one (site, target) pair
    pub fn acquire(&self, site: &SiteId, target: ReleaseTarget) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry((site.clone(), target))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Counting gate bounding in-flight calls per destination adapter
pub struct DestinationGate {
    limit: usize,
    state: Mutex<HashMap<String, usize>>,
    released: Condvar,
}

/// Permit handle; releases its slot on drop
pub struct GatePermit<'a> {
    gate: &'a DestinationGate,
    adapter: String,
}

impl DestinationGate {
    /// `limit` is the maximum number of concurrent calls per adapter name;
    /// zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    /// Block until a slot for the adapter is free
    pub fn enter(&self, adapter: &str) -> GatePermit<'_> {
        let mut counts = self.state.lock().unwrap();
        loop {
            let in_flight = counts.get(adapter).copied().unwrap_or(0);
            if in_flight < self.limit {
                *counts.entry(adapter.to_string()).or_insert(0) += 1;
                return GatePermit {
                    gate: self,
                    adapter: adapter.to_string(),
                };
            }
            counts = self.released.wait(counts).unwrap();
        }
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        let mut counts = self.gate.state.lock().unwrap();
        if let Some(count) = counts.get_mut(&self.adapter) {
            *count = count.saturating_sub(1);
        }
        self.gate.released.notify_all();
    }
}
