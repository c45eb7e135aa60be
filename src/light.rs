//! Light struct and methods.
//!
//! Represents a single MeRGBW light. Commands are encoded by the light's
//! profile and sent through its connection manager; the cached state is
//! only updated after the packets for a command have been written.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ble::connection::{ConnectionManager, ConnectionState};
use crate::ble::transport::BleTransport;
use crate::config::LightConfig;
use crate::data::{LightState, RgbColor, Schedule, TurnOnOptions};
use crate::error::{Error, Result};
use crate::protocol::{Capability, LightCommand, LightProfile, MusicModeInput};

/// Manufacturer reported in [`DeviceInfo`].
pub const MANUFACTURER: &str = "MeRGBW";

/// Handle for a registered state listener. Dropping it unregisters the
/// listener.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister the listener now.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Listener id, unique per light.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// Static description of a light for a host device registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// BLE address.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Manufacturer name.
    pub manufacturer: &'static str,
    /// Model (the profile's display name).
    pub model: &'static str,
}

/// Represents a single MeRGBW light.
pub struct Light<T: BleTransport> {
    config: LightConfig,
    profile: Arc<dyn LightProfile>,
    connection: ConnectionManager<T>,
    state: RwLock<LightState>,
    state_tx: broadcast::Sender<LightState>,
    callback_counter: AtomicU64,
}

impl<T: BleTransport> std::fmt::Debug for Light<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Light")
            .field("address", &self.config.address)
            .field("profile", &self.profile.identity().name)
            .field("connection", &self.connection.state())
            .field("state", &*self.state.read())
            .finish()
    }
}

impl<T: BleTransport> Light<T> {
    /// Create a light using the profile named in its configuration.
    pub fn new(config: LightConfig, transport: Arc<T>) -> Self {
        let profile = config.profile.create_profile();
        Self::with_profile(config, profile, transport)
    }

    /// Create a light with an explicit profile.
    pub fn with_profile(
        config: LightConfig,
        profile: Arc<dyn LightProfile>,
        transport: Arc<T>,
    ) -> Self {
        let connection = ConnectionManager::new(
            transport,
            config.address.clone(),
            profile.identity().write_characteristic,
            config.idle_timeout,
        );
        let (state_tx, _) = broadcast::channel(16);

        debug!(
            "Created light {} with profile {}",
            config.address,
            profile.identity().name
        );

        Self {
            config,
            profile,
            connection,
            state: RwLock::new(LightState::default()),
            state_tx,
            callback_counter: AtomicU64::new(0),
        }
    }

    // === Identification ===

    /// BLE address.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Display name.
    pub fn name(&self) -> &str {
        self.config.display_name()
    }

    /// The configuration this light was created from.
    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    /// The active protocol profile.
    pub fn profile(&self) -> &Arc<dyn LightProfile> {
        &self.profile
    }

    /// Effect names in display order.
    pub fn effects(&self) -> &[String] {
        self.profile.effects()
    }

    /// Check whether the profile implements an optional command.
    pub fn supports(&self, capability: Capability) -> bool {
        self.profile.supports(capability)
    }

    /// Registry description of this light.
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifier: self.config.address.clone(),
            name: self.name().to_string(),
            manufacturer: MANUFACTURER,
            model: self.profile.identity().name,
        }
    }

    // === State ===

    /// Last-known state.
    pub fn state(&self) -> LightState {
        self.state.read().clone()
    }

    /// Subscribe to state snapshots, sent after every successful change.
    pub fn subscribe_state(&self) -> broadcast::Receiver<LightState> {
        self.state_tx.subscribe()
    }

    /// Run `callback` with every new state snapshot.
    pub fn on_state_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&LightState) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.state_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(state) = rx.recv().await {
                callback(&state);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    // === Connection ===

    /// Get the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The connection manager for this light.
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Close the link once any in-flight command has finished.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down light {}", self.config.address);
        self.connection.shutdown().await
    }

    // === Commands ===

    /// Switch the light on or off.
    pub async fn power(&self, on: bool) -> Result<LightState> {
        self.dispatch(&LightCommand::Power(on), |state| state.is_on = Some(on))
            .await?;
        Ok(self.state())
    }

    /// Switch the light off.
    pub async fn turn_off(&self) -> Result<LightState> {
        self.power(false).await
    }

    /// Switch the light on, then apply colour or effect, then brightness.
    ///
    /// The effect name is checked against the catalog before anything is
    /// sent. Each step updates the cached state as soon as its own packets
    /// are written, so a failure part-way leaves the earlier steps applied.
    pub async fn turn_on(&self, options: TurnOnOptions) -> Result<LightState> {
        let effect = match (&options.color, &options.effect) {
            (None, Some(effect)) => Some(self.validate_scene(effect)?),
            _ => None,
        };

        self.dispatch(&LightCommand::Power(true), |state| state.is_on = Some(true))
            .await?;

        if let Some(color) = options.color {
            self.dispatch(&LightCommand::Color(color), move |state| {
                state.color = Some(color);
                state.effect = None;
            })
            .await?;
        } else if let Some(effect) = effect {
            let command = LightCommand::Scene(effect.clone());
            self.dispatch(&command, move |state| state.effect = Some(effect))
                .await?;
        } else if !self.state.read().has_color_or_effect() {
            self.update_state(|state| state.color = Some(RgbColor::WHITE));
        }

        if let Some(brightness) = options.brightness {
            self.dispatch(
                &LightCommand::Brightness(u16::from(brightness)),
                move |state| state.brightness = Some(brightness),
            )
            .await?;
        } else if self.state.read().brightness.is_none() {
            self.update_state(|state| state.brightness = Some(u8::MAX));
        }

        Ok(self.state())
    }

    /// Set a solid colour. Clears the active effect.
    pub async fn set_color(&self, color: RgbColor) -> Result<LightState> {
        self.dispatch(&LightCommand::Color(color), move |state| {
            state.color = Some(color);
            state.effect = None;
        })
        .await?;
        Ok(self.state())
    }

    /// Set brightness on the 0-255 host scale.
    pub async fn set_brightness(&self, brightness: u8) -> Result<LightState> {
        self.dispatch(
            &LightCommand::Brightness(u16::from(brightness)),
            move |state| state.brightness = Some(brightness),
        )
        .await?;
        Ok(self.state())
    }

    /// Select a scene by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownScene`] without sending anything if the name
    /// is not in the profile's catalog.
    pub async fn set_scene(&self, name: &str) -> Result<LightState> {
        let effect = self.validate_scene(name)?;
        let command = LightCommand::Scene(effect.clone());

        self.dispatch(&command, move |state| state.effect = Some(effect))
            .await?;
        Ok(self.state())
    }

    /// Set full white at full brightness.
    pub async fn set_white(&self) -> Result<LightState> {
        self.dispatch(&LightCommand::White, |state| {
            state.color = Some(RgbColor::WHITE);
            state.brightness = Some(u8::MAX);
            state.is_on = Some(true);
            state.effect = None;
        })
        .await?;
        Ok(self.state())
    }

    /// Select a scene by numeric id. Skipped if the profile lacks
    /// [`Capability::SceneById`].
    pub async fn set_scene_by_id(&self, id: u16, param: Option<u16>) -> Result<LightState> {
        let effect = self
            .profile
            .effect_for_scene_id(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Scene {}", id));

        self.dispatch(&LightCommand::SceneById { id, param }, move |state| {
            state.effect = Some(effect)
        })
        .await?;
        Ok(self.state())
    }

    /// Select a music mode by number (1-6) or alias. Skipped if the profile
    /// lacks [`Capability::MusicMode`] or the alias is unknown.
    pub async fn set_music_mode(&self, mode: impl Into<MusicModeInput>) -> Result<LightState> {
        let mode = mode.into();
        if mode.resolve().is_none() {
            warn!("Unknown music mode {:?}, skipping", mode);
        }

        self.dispatch(&LightCommand::MusicMode(mode), |_| {}).await?;
        Ok(self.state())
    }

    /// Set music sensitivity (0-100). Skipped if unsupported.
    pub async fn set_music_sensitivity(&self, value: i32) -> Result<LightState> {
        self.dispatch(&LightCommand::MusicSensitivity(value), |_| {})
            .await?;
        Ok(self.state())
    }

    /// Program the on/off timer. Skipped if unsupported.
    pub async fn set_schedule(&self, schedule: Schedule) -> Result<LightState> {
        self.dispatch(&LightCommand::Schedule(schedule), |_| {})
            .await?;
        Ok(self.state())
    }

    /// Encode and send a command, then apply `update` to the cached state.
    ///
    /// `update` runs under the connection's command lock, so cache updates
    /// happen in write order. It is skipped when nothing is written.
    async fn dispatch<F>(&self, command: &LightCommand, update: F) -> Result<()>
    where
        F: FnOnce(&mut LightState) + Send,
    {
        let packets = match self.profile.encode(command) {
            Some(packets) => packets,
            None => {
                debug!(
                    "{} does not support {}, skipping",
                    self.profile.identity().name,
                    command.name()
                );
                return Ok(());
            }
        };

        if packets.is_empty() {
            debug!("Nothing to send for {} on {}", command.name(), self.address());
            return Ok(());
        }

        debug!(
            "Sending {} ({} packets) to {}",
            command.name(),
            packets.len(),
            self.address()
        );
        self.connection
            .execute_with(&packets, || self.update_state(update))
            .await
    }

    fn validate_scene(&self, name: &str) -> Result<String> {
        self.profile
            .find_effect(name)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownScene {
                name: name.to_string(),
                profile: self.profile.identity().name.to_string(),
            })
    }

    fn update_state(&self, apply: impl FnOnce(&mut LightState)) {
        let snapshot = {
            let mut state = self.state.write();
            apply(&mut state);
            state.clone()
        };

        let _ = self.state_tx.send(snapshot);
    }
}
