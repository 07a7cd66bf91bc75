//! Ingestion pipeline main entry

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::Notification;
use tracing::{debug, info, instrument, trace, warn};

use crate::adapter::IngressAdapter;
use crate::error::Result;
use crate::metrics::IngestionMetrics;

/// Hands notifications to the ingestion channel without awaiting.
///
/// When the channel is full the newest notification is dropped, so
/// listeners never wait on the forwarder.
#[derive(Debug, Clone)]
pub struct NotificationEmitter {
    tx: Sender<Notification>,
    metrics: Arc<IngestionMetrics>,
}

impl NotificationEmitter {
    pub fn new(tx: Sender<Notification>, metrics: Arc<IngestionMetrics>) -> Self {
        Self { tx, metrics }
    }

    /// Emitter plus receiver over a fresh bounded channel
    pub fn channel(capacity: usize, metrics: Arc<IngestionMetrics>) -> (Self, Receiver<Notification>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx, metrics), rx)
    }

    /// Try to enqueue; returns whether the notification was accepted
    pub fn emit(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => {
                self.metrics.record_emitted();
                trace!("notification queued");
                true
            }
            Err(TrySendError::Full(dropped)) => {
                self.metrics.record_dropped();
                warn!(
                    device_id = %dropped.device_id,
                    path = %dropped.path,
                    "ingestion channel full, notification dropped"
                );
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(device_id = %dropped.device_id, "ingestion channel closed");
                false
            }
        }
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }
}

/// Ingestion Pipeline
///
/// Owns the listeners and the single channel they all feed.
pub struct IngestionPipeline {
    /// Registered adapters
    adapters: Vec<Box<dyn IngressAdapter>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Sender side, cloned into every adapter
    emitter: NotificationEmitter,

    /// Data receiver
    rx: Option<Receiver<Notification>>,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    ///
    /// # Arguments
    /// * `channel_capacity` - Channel capacity
    pub fn new(channel_capacity: usize) -> Self {
        let metrics = Arc::new(IngestionMetrics::new());
        let (emitter, rx) = NotificationEmitter::channel(channel_capacity, metrics.clone());

        Self {
            adapters: Vec::new(),
            metrics,
            emitter,
            rx: Some(rx),
        }
    }

    /// Register an ingress adapter
    #[instrument(
        name = "ingestion_register_adapter",
        skip(self, adapter),
        fields(protocol = adapter.protocol(), addr = %adapter.local_addr())
    )]
    pub fn register_adapter(&mut self, adapter: Box<dyn IngressAdapter>) {
        debug!("registered ingress adapter");
        self.adapters.push(adapter);
    }

    /// Emitter handle sharing this pipeline's channel and metrics
    pub fn emitter(&self) -> NotificationEmitter {
        self.emitter.clone()
    }

    /// Start all registered adapters
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) -> Result<()> {
        info!(count = self.adapters.len(), "starting all ingress adapters");
        for adapter in &self.adapters {
            if !adapter.is_listening() {
                debug!(protocol = adapter.protocol(), addr = %adapter.local_addr(), "starting adapter");
                adapter.start(self.emitter.clone())?;
            }
        }
        Ok(())
    }

    /// Stop all adapters
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all ingress adapters");
        for adapter in &self.adapters {
            if adapter.is_listening() {
                debug!(protocol = adapter.protocol(), "stopping adapter");
                adapter.stop();
            }
        }
    }

    /// Get data stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<Notification>> {
        self.rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Whether every registered adapter is listening
    pub fn is_listening(&self) -> bool {
        !self.adapters.is_empty() && self.adapters.iter().all(|a| a.is_listening())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
