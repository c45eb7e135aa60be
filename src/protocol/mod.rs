//! Protocol module for encoding light commands.
//!
//! This module contains the implementations for:
//! - Packet framing and checksum calculation
//! - The device profile interface
//! - The Sunset and Hexagon encoders

pub mod hexagon;
pub mod packet;
pub mod profile;
pub mod sunset;

pub use hexagon::{HexagonProfile, MusicMode, MusicModeInput};
pub use packet::{calculate_checksum, verify_checksum, Packet};
pub use profile::{Capability, LightCommand, LightProfile, ProfileIdentity};
pub use sunset::SunsetProfile;

/// Power on/off.
pub const CMD_POWER: u8 = 0x01;
/// Solid colour.
pub const CMD_COLOR: u8 = 0x03;
/// Brightness.
pub const CMD_BRIGHTNESS: u8 = 0x05;
/// Scene selection.
pub const CMD_SCENE: u8 = 0x06;
/// Music mode (Hexagon).
pub const CMD_MUSIC_MODE: u8 = 0x07;
/// Music sensitivity (Hexagon).
pub const CMD_MUSIC_SENSITIVITY: u8 = 0x08;
/// On/off timer (Hexagon).
pub const CMD_SCHEDULE: u8 = 0x0A;
/// Scene parameter, sent after a scene id (Hexagon).
pub const CMD_SCENE_PARAM: u8 = 0x0F;
