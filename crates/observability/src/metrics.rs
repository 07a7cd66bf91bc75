//! Gateway metrics
//!
//! Thin wrappers over the `metrics` facade so metric names live in one place,
//! plus an in-memory aggregator for the end-of-run summary.

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// Outcome of one fragment collection window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Decoded and emitted
    Completed,
    /// Reassembled length differed from the frame size
    Incomplete,
    /// Right size, but decode or normalization failed
    DecodeError,
}

impl CollectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::DecodeError => "decode_error",
        }
    }
}

/// Record a datagram received on the UDP listener
pub fn record_datagram_received(len: usize) {
    counter!("telemetry_gateway_datagrams_received_total").increment(1);
    histogram!("telemetry_gateway_datagram_bytes").record(len as f64);
}

/// Record how a collection window ended
pub fn record_collection_outcome(outcome: CollectionOutcome) {
    counter!(
        "telemetry_gateway_frames_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a publish, routed or ignored
pub fn record_publish(routed: bool) {
    let status = if routed { "routed" } else { "ignored" };
    counter!("telemetry_gateway_publishes_total", "status" => status).increment(1);
}

pub fn record_notification_emitted() {
    counter!("telemetry_gateway_notifications_emitted_total").increment(1);
}

pub fn record_notification_dropped() {
    counter!("telemetry_gateway_notifications_dropped_total").increment(1);
}

/// Record one forwarding attempt
pub fn record_forward(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "telemetry_gateway_forwards_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record forwarding round-trip latency
pub fn record_forward_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "telemetry_gateway_forward_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// Record forwarding writes currently outstanding
pub fn record_forwards_in_flight(sink_name: &str, in_flight: u64) {
    gauge!(
        "telemetry_gateway_forwards_in_flight",
        "sink" => sink_name.to_string()
    )
    .set(in_flight as f64);
}

/// Distinct keys tracked per breakdown map; later keys share one bucket
pub const MAX_TRACKED_KEYS: usize = 256;

/// Bucket for keys seen after `MAX_TRACKED_KEYS` is reached
pub const OVERFLOW_KEY: &str = "(other)";

/// Notifications handed to the forwarder, aggregated per run
#[derive(Debug, Clone, Default)]
pub struct ForwardingAggregator {
    /// Notifications seen
    pub total: u64,

    /// Per device id, capped at `MAX_TRACKED_KEYS` plus the overflow bucket
    pub per_device: HashMap<String, u64>,

    /// Per metric path, capped the same way
    pub per_path: HashMap<String, u64>,

    /// Payload sizes (bytes)
    pub payload_stats: RunningStats,
}

impl ForwardingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one notification
    pub fn update(&mut self, device_id: &str, path: &str, payload_len: usize) {
        self.total += 1;
        bump(&mut self.per_device, device_id);
        bump(&mut self.per_path, path);
        self.payload_stats.push(payload_len as f64);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_notifications: self.total,
            distinct_devices: self.per_device.keys().filter(|k| *k != OVERFLOW_KEY).count(),
            per_path: self.per_path.clone(),
            payload_bytes: StatsSummary::from(&self.payload_stats),
        }
    }
}

fn bump(counts: &mut HashMap<String, u64>, key: &str) {
    if let Some(count) = counts.get_mut(key) {
        *count += 1;
        return;
    }
    let key = if counts.len() < MAX_TRACKED_KEYS { key } else { OVERFLOW_KEY };
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_notifications: u64,
    pub distinct_devices: usize,
    pub per_path: HashMap<String, u64>,
    pub payload_bytes: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Forwarding Summary ===")?;
        writeln!(f, "Notifications: {}", self.total_notifications)?;
        writeln!(f, "Devices: {}", self.distinct_devices)?;
        writeln!(f, "Payload bytes: {}", self.payload_bytes)?;

        if !self.per_path.is_empty() {
            let mut paths: Vec<_> = self.per_path.iter().collect();
            paths.sort();
            writeln!(f, "Paths:")?;
            for (path, count) in paths {
                writeln!(f, "  {path}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Summary of a `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
