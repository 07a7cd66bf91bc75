//! # Contracts
//!
//! Frozen interface contracts shared by every gateway crate: identifiers,
//! the canonical outbound `Notification`, the decoded accelerometer frame,
//! the gateway configuration and the sink trait.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Ingestion Model
//! - Pub/sub readings and reassembled datagram frames both end up as a `Notification`
//! - `DeviceId` is the device address with all `:` separators removed

mod config;
mod device_id;
mod error;
mod frame;
mod notification;
mod sink;

pub use config::*;
pub use device_id::DeviceId;
pub use error::*;
pub use frame::*;
pub use notification::*;
pub use sink::*;
