//! The BLE transport interface.
//!
//! The connection layer only needs four primitives from the radio stack:
//! resolve an address, connect with a disconnect callback, write bytes to a
//! characteristic, and disconnect. Timeouts and retries on those primitives
//! belong to the implementation.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;

/// Invoked by the transport when an established link drops.
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Capability interface over a BLE stack.
#[cfg_attr(test, mockall::automock(type Device = String; type Link = u32;))]
#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    /// A resolved, connectable device.
    type Device: Send + Sync;
    /// An established connection.
    type Link: Send + Sync + 'static;

    /// Resolve an address to a device. `Ok(None)` means the device is not
    /// currently reachable.
    async fn resolve(&self, address: &str) -> Result<Option<Self::Device>>;

    /// Connect to a device. `on_disconnect` fires once if the link later drops.
    async fn connect(
        &self,
        device: &Self::Device,
        on_disconnect: DisconnectCallback,
    ) -> Result<Self::Link>;

    /// Write one packet to a characteristic.
    async fn write(&self, link: &Self::Link, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Tear down a link.
    async fn disconnect(&self, link: &Self::Link) -> Result<()>;
}
