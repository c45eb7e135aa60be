//! Error types for the mergbw-light-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The address could not be resolved to a reachable device.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// Failed to establish a connection to the light.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Writing a packet to the light failed.
    #[error("Transport write failed: {reason}")]
    TransportWriteFailed {
        /// Description of why the write failed.
        reason: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// The requested scene is not part of the active profile's catalog.
    #[error("Unknown scene '{name}' for {profile}")]
    UnknownScene {
        /// The scene name that was requested.
        name: String,
        /// Display name of the active profile.
        profile: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// A byte buffer was not a well-formed command packet.
    #[error("Invalid data: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from the BLE link rather than from the caller's input.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::BluetoothUnavailable
                | Self::DeviceNotFound { .. }
                | Self::ConnectionFailed { .. }
                | Self::TransportWriteFailed { .. }
                | Self::CharacteristicNotFound { .. }
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
