//! Forwarder - fire-and-forget hand-off to a sink

use std::sync::Arc;
use std::time::Instant;

use contracts::{ForwardingConfig, Notification, NotificationSink};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::HttpSink;

/// Name of the sink built from `ForwardingConfig`
pub const HTTP_SINK_NAME: &str = "http";

/// Spawns one write per notification and never waits for it
///
/// A forwarder without a sink is disabled: every notification is counted as
/// skipped and discarded.
pub struct Forwarder<S> {
    sink: Option<Arc<S>>,
    metrics: Arc<SinkMetrics>,
}

impl<S> Forwarder<S>
where
    S: NotificationSink + Send + Sync + 'static,
{
    pub fn new(sink: S) -> Self {
        info!(sink = sink.name(), "forwarding enabled");
        Self {
            sink: Some(Arc::new(sink)),
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    pub fn disabled() -> Self {
        warn!("no forwarding url configured, gateway does not store data");
        Self {
            sink: None,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn sink_name(&self) -> Option<&str> {
        self.sink.as_deref().map(|sink| sink.name())
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Hand a notification to the sink
    ///
    /// Returns the spawned write, or `None` when forwarding is disabled.
    /// Must be called from within a tokio runtime.
    #[instrument(
        name = "forwarder_forward",
        skip(self, notification),
        fields(device_id = %notification.device_id, path = %notification.path)
    )]
    pub fn forward(&self, notification: Notification) -> Option<JoinHandle<()>> {
        let Some(sink) = self.sink.clone() else {
            self.metrics.inc_skipped_count();
            debug!("forwarding disabled, notification discarded");
            return None;
        };

        let metrics = self.metrics.clone();
        let in_flight = metrics.begin_write();
        observability::record_forwards_in_flight(sink.name(), in_flight);

        Some(tokio::spawn(async move {
            let started = Instant::now();
            let result = sink.write(&notification).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(()) => {
                    metrics.inc_write_count();
                    debug!(
                        sink = sink.name(),
                        device_id = %notification.device_id,
                        path = %notification.path,
                        latency_ms = elapsed_ms,
                        "notification forwarded"
                    );
                }
                Err(e) => {
                    metrics.inc_failure_count();
                    warn!(
                        sink = sink.name(),
                        device_id = %notification.device_id,
                        path = %notification.path,
                        error = %e,
                        "forwarding failed"
                    );
                }
            }

            observability::record_forward(sink.name(), result.is_ok());
            observability::record_forward_latency_ms(sink.name(), elapsed_ms);
            observability::record_forwards_in_flight(sink.name(), metrics.end_write());
        }))
    }
}

/// Build the forwarder described by `config`
///
/// A missing URL yields a disabled forwarder rather than an error.
///
/// # Errors
/// `SinkCreation` if the HTTP client cannot be built
#[instrument(name = "create_forwarder", skip(config), fields(enabled = config.is_enabled()))]
pub fn create_forwarder(config: &ForwardingConfig) -> Result<Forwarder<HttpSink>, DispatcherError> {
    match config.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            let sink = HttpSink::new(HTTP_SINK_NAME, url, config.timeout())?;
            info!(url = url, timeout_ms = config.timeout_ms, "http sink created");
            Ok(Forwarder::new(sink))
        }
        None => Ok(Forwarder::disabled()),
    }
}
