//! Ingestion counters
//!
//! In-process atomics for snapshots and summaries; every record call is
//! mirrored to the `metrics` facade through `observability`.

use std::sync::atomic::{AtomicU64, Ordering};

use observability::metrics as gateway_metrics;

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Datagrams received on the UDP listener
    pub datagrams_received: AtomicU64,

    /// Reassembled frames that decoded successfully
    pub frames_completed: AtomicU64,

    /// Collections whose concatenated length was not the frame size
    pub frames_incomplete: AtomicU64,

    /// Frames with the right size that failed to decode or normalize
    pub decode_errors: AtomicU64,

    /// Publishes turned into notifications
    pub publishes_routed: AtomicU64,

    /// Publishes ignored (no client or `$SYS` topic)
    pub publishes_ignored: AtomicU64,

    /// Notifications handed to the channel
    pub notifications_emitted: AtomicU64,

    /// Notifications dropped because the channel was full
    pub notifications_dropped: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_datagram(&self, len: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_datagram_received(len);
    }

    pub fn record_frame_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_collection_outcome(gateway_metrics::CollectionOutcome::Completed);
    }

    pub fn record_frame_incomplete(&self) {
        self.frames_incomplete.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_collection_outcome(gateway_metrics::CollectionOutcome::Incomplete);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_collection_outcome(gateway_metrics::CollectionOutcome::DecodeError);
    }

    pub fn record_publish_routed(&self) {
        self.publishes_routed.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_publish(true);
    }

    pub fn record_publish_ignored(&self) {
        self.publishes_ignored.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_publish(false);
    }

    pub fn record_emitted(&self) {
        self.notifications_emitted.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_notification_emitted();
    }

    pub fn record_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
        gateway_metrics::record_notification_dropped();
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_incomplete: self.frames_incomplete.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            publishes_routed: self.publishes_routed.load(Ordering::Relaxed),
            publishes_ignored: self.publishes_ignored.load(Ordering::Relaxed),
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub frames_completed: u64,
    pub frames_incomplete: u64,
    pub decode_errors: u64,
    pub publishes_routed: u64,
    pub publishes_ignored: u64,
    pub notifications_emitted: u64,
    pub notifications_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = IngestionMetrics::new();
        metrics.record_datagram(1470);
        metrics.record_datagram(528);
        metrics.record_frame_completed();
        metrics.record_publish_ignored();
        metrics.record_dropped();

        let snap = metrics.snapshot();
        assert_eq!(snap.datagrams_received, 2);
        assert_eq!(snap.frames_completed, 1);
        assert_eq!(snap.publishes_ignored, 1);
        assert_eq!(snap.notifications_dropped, 1);
        assert_eq!(snap.notifications_emitted, 0);
    }
}
