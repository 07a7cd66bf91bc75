//! # Dispatcher
//!
//! Forwarding of notifications to the time-series store.
//!
//! - One HTTP `PUT` per notification
//! - Every write runs in its own task; the caller never waits
//! - No retries, failures are logged and counted

pub mod error;
pub mod forwarder;
pub mod metrics;
pub mod sinks;

pub use contracts::{Notification, NotificationSink};
pub use error::DispatcherError;
pub use forwarder::{create_forwarder, Forwarder, HTTP_SINK_NAME};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{HttpSink, LogSink, NotificationBatch, NotificationEntry};
