//! Ingress adapters
//!
//! Thin network front-ends; all protocol-independent logic lives in the
//! router, collector and normalizer.

pub mod mqtt;
mod udp;

pub use mqtt::MqttAdapter;
pub use udp::UdpAdapter;
