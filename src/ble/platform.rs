//! `btleplug`-backed transport.
//!
//! Resolves addresses against the adapter's peripheral cache (scanning
//! briefly when the light has not been seen yet), and watches adapter
//! events so the connection layer learns about dropped links.

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{BleTransport, DisconnectCallback};
use crate::error::{Error, Result};

/// How long `resolve` scans for a light that is not in the adapter cache.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between cache checks while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An open connection to a light.
pub struct BtleplugLink {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    watcher: JoinHandle<()>,
}

impl BtleplugLink {
    /// The connected peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Check if a characteristic was discovered on this link.
    pub fn has_characteristic(&self, uuid: &Uuid) -> bool {
        self.characteristics.contains_key(uuid)
    }
}

impl Drop for BtleplugLink {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// BLE transport over the first system Bluetooth adapter.
pub struct BtleplugTransport {
    adapter: Adapter,
    scan_timeout: Duration,
}

impl BtleplugTransport {
    /// Create a transport on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Set how long `resolve` may scan for an unseen light.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;

        Ok(peripherals
            .into_iter()
            .find(|peripheral| matches_address(peripheral, address)))
    }
}

/// Match by MAC address, or by platform id where MACs are hidden (macOS).
fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    peripheral.address().to_string().eq_ignore_ascii_case(address)
        || peripheral.id().to_string().eq_ignore_ascii_case(address)
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    type Device = Peripheral;
    type Link = BtleplugLink;

    async fn resolve(&self, address: &str) -> Result<Option<Peripheral>> {
        if let Some(peripheral) = self.find_peripheral(address).await? {
            return Ok(Some(peripheral));
        }

        debug!(
            "{} not in adapter cache, scanning for up to {:?}",
            address, self.scan_timeout
        );

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let deadline = tokio::time::Instant::now() + self.scan_timeout;
        let found = loop {
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;

            match self.find_peripheral(address).await {
                Ok(Some(peripheral)) => break Ok(Some(peripheral)),
                Ok(None) if tokio::time::Instant::now() >= deadline => break Ok(None),
                Ok(None) => continue,
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        found
    }

    async fn connect(
        &self,
        device: &Peripheral,
        on_disconnect: DisconnectCallback,
    ) -> Result<BtleplugLink> {
        // Subscribe before connecting so an early drop is not missed.
        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        device
            .connect()
            .await
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })?;

        if let Err(e) = device.discover_services().await {
            warn!("Failed to discover services: {}", e);
            if let Err(e) = device.disconnect().await {
                debug!("Disconnect after failed discovery: {}", e);
            }
            return Err(Error::ConnectionFailed {
                reason: format!("Service discovery failed: {}", e),
            });
        }

        let characteristics: HashMap<Uuid, Characteristic> = device
            .characteristics()
            .into_iter()
            .map(|characteristic| (characteristic.uuid, characteristic))
            .collect();
        debug!("Discovered {} characteristics", characteristics.len());

        let id = device.id();
        let watcher = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(disconnected) = event {
                    if disconnected == id {
                        debug!("Adapter reported disconnect of {:?}", id);
                        on_disconnect();
                        break;
                    }
                }
            }
        });

        Ok(BtleplugLink {
            peripheral: device.clone(),
            characteristics,
            watcher,
        })
    }

    async fn write(&self, link: &BtleplugLink, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let target = link
            .characteristics
            .get(&characteristic)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })?;

        let write_type = if target
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        link.peripheral
            .write(target, data, write_type)
            .await
            .map_err(|e| Error::TransportWriteFailed {
                reason: e.to_string(),
            })?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            data.len(),
            characteristic
        );

        Ok(())
    }

    async fn disconnect(&self, link: &BtleplugLink) -> Result<()> {
        link.watcher.abort();
        link.peripheral.disconnect().await.map_err(Error::Bluetooth)
    }
}
