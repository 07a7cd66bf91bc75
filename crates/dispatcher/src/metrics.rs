//! Forwarder metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one forwarder
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Writes accepted by the destination
    write_count: AtomicU64,
    /// Writes that failed or were rejected
    failure_count: AtomicU64,
    /// Writes spawned and not yet finished
    in_flight: AtomicU64,
    /// Notifications discarded because forwarding is disabled
    skipped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the new in-flight count
    pub fn begin_write(&self) -> u64 {
        self.in_flight.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new in-flight count
    pub fn end_write(&self) -> u64 {
        self.in_flight.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn inc_skipped_count(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            in_flight: self.in_flight(),
            skipped_count: self.skipped_count(),
        }
    }
}

/// Snapshot of forwarder metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
    pub in_flight: u64,
    pub skipped_count: u64,
}
