//! MQTT 3.1.1 ingress

pub mod codec;
mod server;

pub use codec::{MqttError, Packet, QoS};
pub use server::MqttAdapter;
