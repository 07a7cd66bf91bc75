//! Gateway run statistics.

use std::time::Duration;

use observability::ForwardingAggregator;

/// Statistics from a gateway run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Listeners that were started
    pub active_listeners: usize,

    /// Whether a forwarding sink was configured
    pub forwarding_enabled: bool,

    /// Ingestion counters at shutdown
    pub ingestion: ingestion::MetricsSnapshot,

    /// Forwarder counters at shutdown
    pub sink: Option<dispatcher::MetricsSnapshot>,

    /// Notifications handed to the forwarder
    pub forwarding: ForwardingAggregator,
}

impl PipelineStats {
    /// Notifications per second over the run
    pub fn notifications_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.forwarding.total as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of complete-length windows among all closed windows, in percent
    pub fn frame_completion_rate(&self) -> f64 {
        let closed = self.ingestion.frames_completed
            + self.ingestion.frames_incomplete
            + self.ingestion.decode_errors;
        if closed > 0 {
            (self.ingestion.frames_completed as f64 / closed as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Gateway Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Active listeners: {}", self.active_listeners);
        println!("   ├─ Notifications: {}", self.forwarding.total);
        println!("   └─ Rate: {:.2}/s", self.notifications_per_sec());

        let ingestion = &self.ingestion;
        println!("\nIngestion");
        println!("   ├─ Publishes routed: {}", ingestion.publishes_routed);
        println!("   ├─ Publishes ignored: {}", ingestion.publishes_ignored);
        println!("   ├─ Datagrams received: {}", ingestion.datagrams_received);
        println!(
            "   ├─ Frames completed: {} ({:.2}%)",
            ingestion.frames_completed,
            self.frame_completion_rate()
        );
        println!("   ├─ Frames incomplete: {}", ingestion.frames_incomplete);
        println!("   ├─ Decode errors: {}", ingestion.decode_errors);
        println!("   └─ Notifications dropped: {}", ingestion.notifications_dropped);

        println!("\nForwarding");
        match self.sink {
            Some(sink) if self.forwarding_enabled => {
                println!("   ├─ Writes: {}", sink.write_count);
                println!("   ├─ Failures: {}", sink.failure_count);
                println!("   └─ Still in flight: {}", sink.in_flight);
            }
            Some(sink) => println!("   └─ Disabled, {} discarded", sink.skipped_count),
            None => println!("   └─ Not started"),
        }

        println!("\n{}", self.forwarding.summary());
    }
}
