//! Ingress adapter trait

use std::net::SocketAddr;

use crate::error::Result;
use crate::pipeline::NotificationEmitter;

/// Network listener feeding the ingestion channel
///
/// Implementations bind their socket at construction, so a bind failure
/// surfaces before anything is started. `start` spawns the receive loop on
/// the current tokio runtime and returns immediately.
pub trait IngressAdapter: Send + Sync {
    /// Protocol label used in logs (`mqtt`, `udp`)
    fn protocol(&self) -> &'static str;

    /// Bound local address
    fn local_addr(&self) -> SocketAddr;

    /// Start receiving
    ///
    /// # Arguments
    /// * `emitter` - Sender side of the ingestion channel
    fn start(&self, emitter: NotificationEmitter) -> Result<()>;

    /// Stop receiving; in-flight work is not drained
    fn stop(&self);

    /// Whether the receive loop is running
    fn is_listening(&self) -> bool;
}
