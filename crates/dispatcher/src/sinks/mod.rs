//! Sink implementations
//!
//! `HttpSink` forwards to the time-series store, `LogSink` only logs.

mod http;
mod log;

pub use self::http::{HttpSink, NotificationBatch, NotificationEntry, MAX_AGE};
pub use self::log::LogSink;
