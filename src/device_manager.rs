//! Manager for the configured MeRGBW lights.
//!
//! Lights are added from host configuration entries and share one
//! transport. Each light keeps its own connection, lock and idle timer.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ble::platform::BtleplugTransport;
use crate::ble::transport::BleTransport;
use crate::config::LightConfig;
use crate::error::Result;
use crate::light::Light;

/// Central manager for configured lights.
pub struct LightManager<T: BleTransport> {
    /// Shared BLE transport.
    transport: Arc<T>,
    /// Lights by normalized address.
    lights: RwLock<HashMap<String, Arc<Light<T>>>>,
    /// Light added channel.
    light_added_tx: broadcast::Sender<Arc<Light<T>>>,
}

impl LightManager<BtleplugTransport> {
    /// Create a manager on the first system Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let transport = BtleplugTransport::new().await?;
        Ok(Self::with_transport(Arc::new(transport)))
    }
}

impl<T: BleTransport> LightManager<T> {
    /// Create a manager over an existing transport.
    pub fn with_transport(transport: Arc<T>) -> Self {
        let (light_added_tx, _) = broadcast::channel(16);

        Self {
            transport,
            lights: RwLock::new(HashMap::new()),
            light_added_tx,
        }
    }

    /// The shared transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Add a light, or return the existing one for the same address.
    ///
    /// If a light with the same address but a different configuration is
    /// already present it is shut down and replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn add_light(&self, config: LightConfig) -> Result<Arc<Light<T>>> {
        config.validate()?;
        let key = normalize_address(&config.address);

        let (light, replaced) = {
            let mut lights = self.lights.write();
            match lights.get(&key) {
                Some(existing) if existing.config() == &config => {
                    debug!("Light {} already configured", config.address);
                    return Ok(existing.clone());
                }
                _ => {}
            }

            let light = Arc::new(Light::new(config, self.transport.clone()));
            let replaced = lights.insert(key, light.clone());

            info!(
                "Added light {} ({}) with profile {}",
                light.name(),
                light.address(),
                light.profile().identity().name
            );
            let _ = self.light_added_tx.send(light.clone());

            (light, replaced)
        };

        if let Some(old) = replaced {
            debug!("Replacing configuration for {}", old.address());
            if let Err(e) = old.shutdown().await {
                warn!("Error shutting down replaced light {}: {}", old.address(), e);
            }
        }

        Ok(light)
    }

    /// Get a light by address. Case-insensitive.
    pub fn light(&self, address: &str) -> Option<Arc<Light<T>>> {
        self.lights.read().get(&normalize_address(address)).cloned()
    }

    /// Get all lights, keyed by normalized address.
    pub fn lights(&self) -> HashMap<String, Arc<Light<T>>> {
        self.lights.read().clone()
    }

    /// Get the number of configured lights.
    pub fn light_count(&self) -> usize {
        self.lights.read().len()
    }

    /// Subscribe to newly added lights.
    pub fn subscribe_light_added(&self) -> broadcast::Receiver<Arc<Light<T>>> {
        self.light_added_tx.subscribe()
    }

    /// Remove a light and close its link. Returns whether it was present.
    pub async fn remove_light(&self, address: &str) -> Result<bool> {
        let removed = self.lights.write().remove(&normalize_address(address));

        match removed {
            Some(light) => {
                info!("Removing light {}", light.address());
                light.shutdown().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clean shutdown of all lights.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down light manager");

        let lights: Vec<_> = self.lights.write().drain().map(|(_, light)| light).collect();
        for light in lights {
            if let Err(e) = light.shutdown().await {
                warn!("Error shutting down light {}: {}", light.address(), e);
            }
        }

        Ok(())
    }
}

fn normalize_address(address: &str) -> String {
    address.trim().to_uppercase()
}
