//! Per-session sliding expiry timers.
//!
//! All deadlines of one server live in a single ordered queue. The server
//! loop sleeps until the earliest one and then sweeps everything that is due,
//! so an armed session costs a map entry rather than a task.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::time::Instant;

/// GC timer table, owned by a single session server.
pub(crate) struct GcTimers {
    ttl: Duration,
    next_generation: u64,
    deadlines: HashMap<String, (Instant, u64)>,
    queue: BTreeSet<(Instant, u64, String)>,
}

impl GcTimers {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_generation: 0,
            deadlines: HashMap::new(),
            queue: BTreeSet::new(),
        }
    }

    /// Cancels any timer held for `id` and arms a fresh one with the full TTL.
    pub fn arm(&mut self, id: &str) {
        self.cancel(id);

        self.next_generation += 1;
        let deadline = Instant::now() + self.ttl;
        self.deadlines
            .insert(id.to_string(), (deadline, self.next_generation));
        self.queue
            .insert((deadline, self.next_generation, id.to_string()));
    }

    /// Cancels the timer for `id`. Returns whether one was armed.
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.deadlines.remove(id) {
            Some((deadline, generation)) => {
                self.queue.remove(&(deadline, generation, id.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.deadlines.len();
        self.deadlines.clear();
        self.queue.clear();
        count
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.first().map(|(deadline, _, _)| *deadline)
    }

    /// Removes and returns every id whose deadline is at or before `now`.
    pub fn drain_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        while self
            .queue
            .first()
            .is_some_and(|(deadline, _, _)| *deadline <= now)
        {
            if let Some((_, _, id)) = self.queue.pop_first() {
                self.deadlines.remove(&id);
                due.push(id);
            }
        }
        due
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deadlines.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }
}

/// Resolves at `deadline`, or never when nothing is armed.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
