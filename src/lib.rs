// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # mergbw-light-ble
//!
//! A cross-platform Rust library for controlling MeRGBW RGB lights over
//! Bluetooth Low Energy.
//!
//! Two device variants are supported, each with its own packet encoding:
//!
//! - **Sunset Light**: power, RGB colour, brightness and 20 named scenes.
//! - **Hexagon Light**: power, hue/saturation colour, brightness, 117
//!   catalogued scenes, scenes by raw id, music modes, music sensitivity
//!   and an on/off schedule.
//!
//! ## Features
//!
//! - **Packet Encoding**: Framed, checksummed command packets per profile
//! - **Lazy Connections**: The link is opened on the first command
//! - **Idle Disconnect**: The link is closed after a quiet period
//! - **Ordered Commands**: Multi-packet commands are never interleaved
//! - **State Cache**: Last-known power, colour, brightness and effect
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mergbw_light_ble::{LightConfig, LightManager, ProfileKind, Result, RgbColor};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = LightManager::new().await?;
//!
//!     let light = manager
//!         .add_light(
//!             LightConfig::new("AA:BB:CC:DD:EE:FF").with_profile(ProfileKind::Hexagon),
//!         )
//!         .await?;
//!
//!     light.power(true).await?;
//!     light.set_color(RgbColor::new(255, 64, 0)).await?;
//!     let state = light.set_scene("Aurora").await?;
//!     println!("Effect: {:?}", state.effect);
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. macOS hides MAC addresses, so lights are
//! addressed by their platform identifier instead.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for configuration and state types

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod device_manager;
pub mod error;
pub mod light;
pub mod protocol;
pub mod utils;

// Re-exports for convenience
pub use config::{LightConfig, ProfileKind};
pub use device_manager::LightManager;
pub use error::{Error, Result};
pub use light::{CallbackHandle, DeviceInfo, Light};

// Re-export commonly used types from submodules
pub use ble::connection::{ConnectionEvent, ConnectionState};
pub use ble::platform::BtleplugTransport;
pub use ble::transport::BleTransport;
pub use data::{DaysMask, LightState, RgbColor, Schedule, ScheduleEntry, TurnOnOptions};
pub use protocol::{
    Capability, HexagonProfile, LightCommand, LightProfile, MusicMode, MusicModeInput, Packet,
    SunsetProfile,
};
