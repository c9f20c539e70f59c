//! Durable reads in flight, per session id.
//!
//! A read started by GET or GET_FAILOVER may only install its result if the
//! id was not destroyed while the read was outstanding. Every destroy bumps
//! the id's epoch; a read compares the epoch it started with when it lands.

use std::collections::HashMap;

#[derive(Default)]
struct Pending {
    readers: usize,
    epoch: u64,
}

#[derive(Default)]
pub(crate) struct PendingReads {
    entries: HashMap<String, Pending>,
}

impl PendingReads {
    /// Registers a read of `id` and returns the epoch it started in.
    pub fn begin(&mut self, id: &str) -> u64 {
        let pending = self.entries.entry(id.to_string()).or_default();
        pending.readers += 1;
        pending.epoch
    }

    /// Ends a read. Returns false if `id` was destroyed since `begin`.
    pub fn finish(&mut self, id: &str, epoch: u64) -> bool {
        let Some(pending) = self.entries.get_mut(id) else {
            return false;
        };
        let current = pending.epoch == epoch;
        pending.readers = pending.readers.saturating_sub(1);
        if pending.readers == 0 {
            self.entries.remove(id);
        }
        current
    }

    pub fn invalidate(&mut self, id: &str) {
        if let Some(pending) = self.entries.get_mut(id) {
            pending.epoch += 1;
        }
    }

    pub fn invalidate_all(&mut self) {
        for pending in self.entries.values_mut() {
            pending.epoch += 1;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
