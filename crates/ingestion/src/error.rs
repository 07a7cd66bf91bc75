//! Ingestion error types

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::mqtt::MqttError;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Listener socket could not be bound
    #[error("{protocol} listener failed to bind {addr}: {source}")]
    Bind {
        protocol: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Adapter already running
    #[error("{protocol} adapter on {addr} is already listening")]
    AlreadyListening {
        protocol: &'static str,
        addr: SocketAddr,
    },

    /// MQTT protocol violation on one connection
    #[error(transparent)]
    Mqtt(#[from] MqttError),

    /// Connection silent for longer than allowed
    #[error("no {awaiting} within {limit:?}")]
    Idle {
        awaiting: &'static str,
        limit: Duration,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn bind(protocol: &'static str, addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            protocol,
            addr: addr.into(),
            source,
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
