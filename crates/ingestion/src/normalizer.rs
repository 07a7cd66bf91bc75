//! Notification normalizer
//!
//! Turns router output and decoded frames into the canonical `Notification`.

use bytes::Bytes;
use contracts::{AccelerometerFrame, ContentType, DeviceId, MetricPath, Notification};
use serde::Serialize;
use thiserror::Error;

use crate::router::RoutedMessage;

/// Metric path for decoded accelerometer frames
pub const ACCELEROMETER_PATH: &str = "/accelerometer";

/// Normalizer input
#[derive(Debug, Clone)]
pub enum NormalizeSource {
    Routed(RoutedMessage),
    Frame(AccelerometerFrame),
}

impl From<RoutedMessage> for NormalizeSource {
    fn from(routed: RoutedMessage) -> Self {
        Self::Routed(routed)
    }
}

impl From<AccelerometerFrame> for NormalizeSource {
    fn from(frame: AccelerometerFrame) -> Self {
        Self::Frame(frame)
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to serialize frame payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Wire shape of a frame payload; field order is x, y, z
#[derive(Serialize)]
struct AxesPayload<'a> {
    x: &'a [i16],
    y: &'a [i16],
    z: &'a [i16],
}

/// Build a notification from either ingestion path
pub fn normalize(source: impl Into<NormalizeSource>) -> Result<Notification, NormalizeError> {
    match source.into() {
        NormalizeSource::Routed(routed) => Ok(Notification::new(
            routed.device_id,
            routed.path,
            ContentType::TextPlain,
            routed.payload,
        )),
        NormalizeSource::Frame(frame) => {
            let payload = serde_json::to_vec(&AxesPayload {
                x: &frame.x,
                y: &frame.y,
                z: &frame.z,
            })?;
            Ok(Notification::new(
                DeviceId::from_address(&frame.mac),
                MetricPath::from_static(ACCELEROMETER_PATH),
                ContentType::Json,
                Bytes::from(payload),
            ))
        }
    }
}
