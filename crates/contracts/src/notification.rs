//! Notification - canonical ingestion output
//!
//! Both the pub/sub path and the datagram path produce this record; the
//! forwarding sink consumes it.

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::DeviceId;

/// Identity of one datagram sender (source address + source port).
pub type EndpointKey = SocketAddr;

/// Slash-prefixed metric path, e.g. `/temperature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricPath(String);

impl MetricPath {
    /// Root path, used when a topic carries no segments after the device address.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a path from the topic segments that follow the device address.
    ///
    /// Segments are joined with `/` and prefixed with a leading `/`, so an
    /// empty iterator yields `/`.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let joined = segments.into_iter().collect::<Vec<_>>().join("/");
        Self(format!("/{joined}"))
    }

    /// Wrap a path that already carries its leading `/`.
    pub fn from_static(path: &'static str) -> Self {
        Self(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for MetricPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Content type marker carried into the outbound `ct` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    /// Scalar pub/sub readings
    #[default]
    #[serde(rename = "text/plain")]
    TextPlain,
    /// Structured payloads (decoded accelerometer frames)
    #[serde(rename = "application/json")]
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::Json => "application/json",
        }
    }
}

/// Canonical outbound record
///
/// Created transiently per routed message or decoded frame; it lives only
/// until the forwarding attempt has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Normalized device identifier
    pub device_id: DeviceId,

    /// Metric path
    pub path: MetricPath,

    /// Payload content type
    #[serde(default)]
    pub content_type: ContentType,

    /// Payload bytes (zero-copy)
    pub payload: Bytes,
}

impl Notification {
    /// Create a new notification
    pub fn new(
        device_id: DeviceId,
        path: MetricPath,
        content_type: ContentType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            device_id,
            path,
            content_type,
            payload: payload.into(),
        }
    }
}
