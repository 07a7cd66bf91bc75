//! GatewayConfig - Config Loader output
//!
//! Describes the complete gateway setup: listeners, fragment collection,
//! ingestion channel, and the forwarding destination.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete gateway configuration
///
/// Every section has defaults, so an empty file is a valid configuration
/// (with forwarding disabled).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// MQTT ingress
    #[serde(default)]
    #[validate(nested)]
    pub mqtt: MqttConfig,

    /// UDP ingress
    #[serde(default)]
    #[validate(nested)]
    pub udp: UdpConfig,

    /// Fragment collection
    #[serde(default)]
    #[validate(nested)]
    pub collector: CollectorConfig,

    /// Ingestion channel between listeners and the forwarder
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// Outbound destination
    #[serde(default)]
    #[validate(nested)]
    pub forwarding: ForwardingConfig,
}

/// MQTT ingress configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MqttConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_mqtt_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Largest accepted packet (fixed header included)
    #[serde(default = "default_max_packet_size")]
    #[validate(range(min = 16))]
    pub max_packet_size: usize,

    /// Seconds a new connection may take to send CONNECT (0 = no limit)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl MqttConfig {
    /// `bind:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// CONNECT deadline for fresh connections, `None` when disabled
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_mqtt_port(),
            max_packet_size: default_max_packet_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// UDP ingress configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UdpConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_udp_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Receive buffer per datagram
    #[serde(default = "default_recv_buffer_size")]
    #[validate(range(min = 1, max = 65535))]
    pub recv_buffer_size: usize,
}

impl UdpConfig {
    /// `bind:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_udp_port(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

/// Fragment collector configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectorConfig {
    /// Quiescence window armed by the first fragment of a frame (milliseconds)
    #[serde(default = "default_quiescence_ms")]
    #[validate(range(min = 1))]
    pub quiescence_ms: u64,
}

impl CollectorConfig {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: default_quiescence_ms(),
        }
    }
}

/// Ingestion channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    /// Bounded channel capacity; notifications beyond it are dropped
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForwardingConfig {
    /// Destination URL; `None` disables forwarding (ingestion keeps running)
    #[serde(default)]
    #[validate(url)]
    pub url: Option<String>,

    /// Per-request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl ForwardingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a destination is configured
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_udp_port() -> u16 {
    9999
}

fn default_max_packet_size() -> usize {
    1024 * 1024
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_recv_buffer_size() -> usize {
    65535
}

fn default_quiescence_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_timeout_ms() -> u64 {
    10_000
}
