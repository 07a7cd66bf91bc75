//! NotificationSink trait - Forwarding output interface
//!
//! Defines the abstract interface for sinks.

use crate::{ContractError, Notification};

/// Notification output trait
///
/// All sink implementations must implement this trait. Writes take `&self`
/// so one sink can serve many concurrently spawned forwarding tasks.
#[trait_variant::make(NotificationSink: Send)]
pub trait LocalNotificationSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one notification
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&self, notification: &Notification) -> Result<(), ContractError>;
}
