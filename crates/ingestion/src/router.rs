//! Topic router
//!
//! Maps a pub/sub topic and payload to a device id, metric path and the
//! payload without its framing terminator.

use bytes::Bytes;
use contracts::{DeviceId, MetricPath};
use tracing::{debug, info};

/// Topic prefix reserved for broker-internal system topics
pub const SYS_TOPIC_PREFIX: &str = "$SYS";

/// Topic level separator
pub const TOPIC_SEPARATOR: char = '/';

/// Message-published event handed over by the MQTT ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEvent {
    /// Originating client; `None` for broker-internal delivery
    pub client_id: Option<String>,

    /// Topic name
    pub topic: String,

    /// Payload as published (terminator included)
    pub payload: Bytes,
}

impl PublishEvent {
    pub fn new(client_id: Option<String>, topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            client_id,
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Router output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub device_id: DeviceId,
    pub path: MetricPath,
    pub payload: Bytes,
}

/// Route a topic and its payload.
///
/// Returns `None` for `$SYS` topics. The last payload byte is a terminator
/// and is dropped (zero-copy slice).
pub fn route(topic: &str, payload: &Bytes) -> Option<RoutedMessage> {
    if topic.starts_with(SYS_TOPIC_PREFIX) {
        return None;
    }

    let mut segments = topic.split(TOPIC_SEPARATOR);
    let address = segments.next().unwrap_or_default();

    Some(RoutedMessage {
        device_id: DeviceId::from_address(address),
        path: MetricPath::from_segments(segments),
        payload: payload.slice(..payload.len().saturating_sub(1)),
    })
}

/// Route a message-published event.
///
/// Events without an originating client are ignored.
pub fn handle_publish(event: &PublishEvent) -> Option<RoutedMessage> {
    let Some(client_id) = event.client_id.as_deref() else {
        debug!(topic = %event.topic, "publish without client ignored");
        return None;
    };

    let routed = route(&event.topic, &event.payload)?;

    info!(
        client_id = %client_id,
        device_id = %routed.device_id,
        path = %routed.path,
        payload = %String::from_utf8_lossy(&routed.payload),
        "packet received"
    );

    Some(routed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_device_and_path() {
        let routed = route("AA:BB:CC:DD:EE:FF/temperature", &Bytes::from_static(b"21.5\0")).unwrap();
        assert_eq!(routed.device_id, "AABBCCDDEEFF");
        assert_eq!(routed.path, "/temperature");
        assert_eq!(routed.payload.as_ref(), b"21.5");
    }

    #[test]
    fn test_route_without_segments_is_root() {
        let routed = route("AA:BB:CC:DD:EE:FF", &Bytes::from_static(b"1\n")).unwrap();
        assert_eq!(routed.path, "/");
    }

    #[test]
    fn test_route_nested_path() {
        let routed = route("aa:bb/env/humidity", &Bytes::from_static(b"40%\0")).unwrap();
        assert_eq!(routed.device_id, "aabb");
        assert_eq!(routed.path, "/env/humidity");
    }

    #[test]
    fn test_route_trailing_slash() {
        let routed = route("AABB/", &Bytes::from_static(b"x\0")).unwrap();
        assert_eq!(routed.path, "/");
    }

    #[test]
    fn test_route_sys_topic_ignored() {
        assert!(route("$SYS/broker/uptime", &Bytes::from_static(b"12\0")).is_none());
        assert!(route("$SYS", &Bytes::new()).is_none());
    }

    #[test]
    fn test_route_empty_payload() {
        let routed = route("AABB/t", &Bytes::new()).unwrap();
        assert!(routed.payload.is_empty());

        let routed = route("AABB/t", &Bytes::from_static(b"\0")).unwrap();
        assert!(routed.payload.is_empty());
    }

    #[test]
    fn test_handle_publish_requires_client() {
        let event = PublishEvent::new(None, "AABB/temperature", &b"1\0"[..]);
        assert!(handle_publish(&event).is_none());

        let event = PublishEvent::new(Some("dev-1".into()), "AABB/temperature", &b"1\0"[..]);
        let routed = handle_publish(&event).unwrap();
        assert_eq!(routed.payload.as_ref(), b"1");
    }
}
