//! Internal metrics collection.
//!
//! Counters are process-wide and lock-free; a [`MetricsSnapshot`] is logged
//! periodically by the node binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s, 2.5s, 5s, +inf
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 9] = [1, 5, 10, 50, 100, 500, 1000, 2500, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let slot = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound, count)` pairs; the overflow bucket has bound `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for a session node.
#[derive(Debug, Default)]
pub struct Metrics {
    // Manager
    pub sessions_started: Counter,
    pub local_gets: Counter,
    pub remote_gets: Counter,
    pub saves: Counter,
    pub destroys: Counter,
    pub invalid_identifiers: Counter,

    // Failover
    pub get_failovers: Counter,
    pub save_failovers: Counter,
    pub destroy_failovers: Counter,
    pub sessions_lost: Counter,

    // Bus
    pub bus_timeouts: Counter,
    pub bus_errors: Counter,
    pub bus_latency_ms: Histogram,

    // Server
    pub gc_expired: Counter,
    pub durable_reads: Counter,
    pub durable_errors: Counter,
    pub durable_latency_ms: Histogram,
    pub local_sessions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sessions_started: u64,
    pub local_gets: u64,
    pub remote_gets: u64,
    pub saves: u64,
    pub destroys: u64,
    pub failovers: u64,
    pub sessions_lost: u64,
    pub bus_timeouts: u64,
    pub bus_latency_mean_ms: f64,
    pub gc_expired: u64,
    pub durable_errors: u64,
    pub durable_latency_mean_ms: f64,
    pub local_sessions: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            sessions_started: self.sessions_started.get(),
            local_gets: self.local_gets.get(),
            remote_gets: self.remote_gets.get(),
            saves: self.saves.get(),
            destroys: self.destroys.get(),
            failovers: self.get_failovers.get()
                + self.save_failovers.get()
                + self.destroy_failovers.get(),
            sessions_lost: self.sessions_lost.get(),
            bus_timeouts: self.bus_timeouts.get(),
            bus_latency_mean_ms: self.bus_latency_ms.mean(),
            gc_expired: self.gc_expired.get(),
            durable_errors: self.durable_errors.get(),
            durable_latency_mean_ms: self.durable_latency_ms.mean(),
            local_sessions: self.local_sessions.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
