//! Gateway orchestrator - binds listeners and feeds the forwarder.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::GatewayConfig;
use dispatcher::{Forwarder, LogSink, NotificationSink};
use ingestion::{IngestionPipeline, MqttAdapter, UdpAdapter};
use tracing::{info, warn};

use super::PipelineStats;

/// How long shutdown waits for spawned writes to finish
const IN_FLIGHT_GRACE: Duration = Duration::from_secs(5);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated gateway configuration
    pub gateway: GatewayConfig,

    /// Stop after this long (None = until shutdown signal)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Log notifications instead of forwarding them
    pub dry_sink: bool,
}

/// Main gateway orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the timeout elapses
    ///
    /// # Errors
    /// Fails if the metrics exporter, a listener, or the HTTP sink cannot be set up.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        if self.config.dry_sink {
            info!("Dry sink mode - notifications are logged, not forwarded");
            let forwarder = Forwarder::new(LogSink::new("dry"));
            self.run_with(forwarder, shutdown).await
        } else {
            let forwarder = dispatcher::create_forwarder(&self.config.gateway.forwarding)
                .context("Failed to create forwarder")?;
            self.run_with(forwarder, shutdown).await
        }
    }

    async fn run_with<S>(
        &self,
        forwarder: Forwarder<S>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<PipelineStats>
    where
        S: NotificationSink + Send + Sync + 'static,
    {
        let start_time = Instant::now();
        let gateway = &self.config.gateway;

        // Listeners (a bind failure is fatal)
        let mqtt = MqttAdapter::bind(&gateway.mqtt)
            .await
            .with_context(|| format!("Failed to bind MQTT listener on {}", gateway.mqtt.listen_addr()))?;
        let udp = UdpAdapter::bind(&gateway.udp, gateway.collector.quiescence())
            .await
            .with_context(|| format!("Failed to bind UDP listener on {}", gateway.udp.listen_addr()))?;

        let mut ingestion = IngestionPipeline::new(gateway.ingestion.channel_capacity);
        ingestion.register_adapter(Box::new(mqtt));
        ingestion.register_adapter(Box::new(udp));

        ingestion.start_all().context("Failed to start listeners")?;
        let ingestion_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;

        info!(
            listeners = ingestion.adapter_count(),
            forwarding = forwarder.is_enabled(),
            "Gateway running"
        );

        let mut stats = PipelineStats {
            active_listeners: ingestion.adapter_count(),
            forwarding_enabled: forwarder.is_enabled(),
            ..Default::default()
        };

        let forward_loop = async {
            while let Ok(notification) = ingestion_rx.recv().await {
                stats.forwarding.update(
                    notification.device_id.as_str(),
                    notification.path.as_str(),
                    notification.payload.len(),
                );
                forwarder.forward(notification);
            }
        };

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = forward_loop => warn!("Ingestion channel closed"),
            _ = shutdown => warn!("Received shutdown signal, stopping gateway..."),
            _ = deadline => info!("Run timeout reached"),
        }

        // Shutdown
        info!("Shutting down gateway...");
        ingestion.stop_all();
        wait_for_in_flight(&forwarder, IN_FLIGHT_GRACE).await;

        stats.duration = start_time.elapsed();
        stats.ingestion = ingestion.metrics().snapshot();
        stats.sink = Some(forwarder.snapshot());

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.notifications_per_sec()),
            "Gateway shutdown complete"
        );

        Ok(stats)
    }
}

/// Give spawned writes a bounded chance to finish
async fn wait_for_in_flight<S>(forwarder: &Forwarder<S>, grace: Duration)
where
    S: NotificationSink + Send + Sync + 'static,
{
    let waited = tokio::time::timeout(grace, async {
        while forwarder.metrics().in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if waited.is_err() {
        warn!(
            in_flight = forwarder.metrics().in_flight(),
            "Forwarding writes still outstanding at shutdown"
        );
    }
}
