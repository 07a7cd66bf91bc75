//! LogSink - logs notification summary via tracing

use contracts::{ContractError, Notification, NotificationSink};
use tracing::{info, instrument};

/// Sink that logs notifications instead of sending them
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, notification),
        fields(sink = %self.name)
    )]
    async fn write(&self, notification: &Notification) -> Result<(), ContractError> {
        info!(
            device_id = %notification.device_id,
            path = %notification.path,
            content_type = notification.content_type.as_str(),
            payload_len = notification.payload.len(),
            "notification received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContentType, DeviceId, MetricPath};

    #[tokio::test]
    async fn test_log_sink_write() {
        let sink = LogSink::new("test_log");
        let notification = Notification::new(
            DeviceId::new("AABB"),
            MetricPath::from_segments(["humidity"]),
            ContentType::TextPlain,
            &b"40"[..],
        );

        assert!(sink.write(&notification).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
