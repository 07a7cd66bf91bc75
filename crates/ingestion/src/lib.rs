//! # Ingestion
//!
//! Telemetry ingestion core.
//!
//! Responsibilities:
//! - Route pub/sub topics to device id + metric path (`router`)
//! - Reassemble fragmented datagrams per sender (`collector`, `scheduler`)
//! - Decode the fixed accelerometer frame layout (`decoder`)
//! - Normalize both paths into `Notification` (`normalizer`)
//! - Listen on MQTT and UDP and feed a bounded channel (`adapters`, `pipeline`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MqttAdapter, UdpAdapter};
//!
//! let mut pipeline = IngestionPipeline::new(config.ingestion.channel_capacity);
//! pipeline.register_adapter(Box::new(MqttAdapter::bind(&config.mqtt).await?));
//! pipeline.register_adapter(Box::new(
//!     UdpAdapter::bind(&config.udp, config.collector.quiescence()).await?,
//! ));
//!
//! pipeline.start_all()?;
//! let rx = pipeline.take_receiver().unwrap();
//! while let Ok(notification) = rx.recv().await {
//!     forwarder.forward(notification);
//! }
//! ```
//!
//! ## Deterministic Reassembly
//!
//! ```ignore
//! use ingestion::{FragmentCollector, ManualScheduler, NotificationEmitter};
//!
//! let (emitter, rx) = NotificationEmitter::channel(16, metrics);
//! let collector = FragmentCollector::new(window, ManualScheduler::new(), emitter);
//! collector.on_datagram(peer, first_fragment);
//! collector.on_datagram(peer, second_fragment);
//! collector.scheduler().advance(window);
//! ```

mod adapter;
pub mod adapters;
pub mod collector;
pub mod decoder;
mod error;
mod metrics;
pub mod normalizer;
mod pipeline;
pub mod router;
pub mod scheduler;

// Re-exports
pub use adapter::IngressAdapter;
pub use adapters::{MqttAdapter, UdpAdapter};
pub use collector::{FragmentBuffer, FragmentCollector};
pub use decoder::DecodeError;
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use normalizer::{normalize, NormalizeError, NormalizeSource, ACCELEROMETER_PATH};
pub use pipeline::{IngestionPipeline, NotificationEmitter};
pub use router::{handle_publish, route, PublishEvent, RoutedMessage, SYS_TOPIC_PREFIX};
pub use scheduler::{DeferredAction, ManualScheduler, Scheduler, TokioScheduler};
