//! Dispatcher error types

use thiserror::Error;

/// Errors raised while building a forwarder
///
/// Write failures never surface here; they are logged and counted by the
/// forwarder.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Destination is not an absolute http(s) URL
    #[error("invalid forwarding url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// HTTP client could not be built
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },
}

impl DispatcherError {
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
