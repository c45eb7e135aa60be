//! BLE communication module.
//!
//! This module provides the transport interface, its `btleplug`
//! implementation, and per-light connection management.

pub mod connection;
pub mod platform;
pub mod transport;
pub mod uuids;

#[cfg(test)]
pub(crate) mod fake;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, DEFAULT_IDLE_TIMEOUT};
pub use platform::{BtleplugLink, BtleplugTransport};
pub use transport::{BleTransport, DisconnectCallback};
pub use uuids::*;
