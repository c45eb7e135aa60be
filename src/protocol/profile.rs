//! The device profile interface.
//!
//! A profile turns semantic light commands into the packets one device
//! variant understands. Every profile supports power, colour, brightness,
//! white and scene selection; the remaining commands are optional and a
//! profile that lacks them returns `None` from the matching builder.

use uuid::Uuid;

use crate::data::{RgbColor, Schedule};
use crate::protocol::hexagon::MusicModeInput;
use crate::protocol::packet::Packet;

/// GATT identity of a device variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileIdentity {
    /// Display name (also used as the device model).
    pub name: &'static str,
    /// Primary service UUID.
    pub service_uuid: Uuid,
    /// Characteristic that command packets are written to.
    pub write_characteristic: Uuid,
    /// Characteristic the device notifies on.
    pub notify_characteristic: Uuid,
}

/// Optional commands a profile may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Select a scene by numeric id with an optional parameter.
    SceneById,
    /// Select a music-reactive mode.
    MusicMode,
    /// Set microphone sensitivity for music modes.
    MusicSensitivity,
    /// Program the on/off timer.
    Schedule,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SceneById => write!(f, "scene-by-id"),
            Self::MusicMode => write!(f, "music mode"),
            Self::MusicSensitivity => write!(f, "music sensitivity"),
            Self::Schedule => write!(f, "schedule"),
        }
    }
}

/// A semantic operation on a light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightCommand {
    /// Switch on or off.
    Power(bool),
    /// Set a solid colour.
    Color(RgbColor),
    /// Set brightness on the host 0-255 scale. Larger values are clamped.
    Brightness(u16),
    /// Select a scene from the profile's catalog by name.
    Scene(String),
    /// Set full white.
    White,
    /// Select a scene by id.
    SceneById {
        /// Scene id.
        id: u16,
        /// Scene parameter, or the profile default.
        param: Option<u16>,
    },
    /// Select a music-reactive mode.
    MusicMode(MusicModeInput),
    /// Set music sensitivity (0-100, clamped).
    MusicSensitivity(i32),
    /// Program the on/off timer.
    Schedule(Schedule),
}

impl LightCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Power(_) => "power",
            Self::Color(_) => "color",
            Self::Brightness(_) => "brightness",
            Self::Scene(_) => "scene",
            Self::White => "white",
            Self::SceneById { .. } => "scene_by_id",
            Self::MusicMode(_) => "music_mode",
            Self::MusicSensitivity(_) => "music_sensitivity",
            Self::Schedule(_) => "schedule",
        }
    }

    /// The optional capability this command needs, if any.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            Self::SceneById { .. } => Some(Capability::SceneById),
            Self::MusicMode(_) => Some(Capability::MusicMode),
            Self::MusicSensitivity(_) => Some(Capability::MusicSensitivity),
            Self::Schedule(_) => Some(Capability::Schedule),
            _ => None,
        }
    }
}

/// Packet encoder for one device variant.
///
/// Implementations are immutable after construction and every builder is a
/// pure function of the profile and its arguments. An empty packet list
/// means "nothing to send" (for example an unknown scene name).
pub trait LightProfile: Send + Sync + std::fmt::Debug {
    /// GATT identity of this variant.
    fn identity(&self) -> &ProfileIdentity;

    /// Effect names in display order.
    fn effects(&self) -> &[String];

    /// Find the catalog spelling of an effect name, ignoring case.
    fn find_effect(&self, name: &str) -> Option<&str> {
        self.effects()
            .iter()
            .find(|effect| effect.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Encode power on/off.
    fn build_power(&self, on: bool) -> Vec<Packet>;

    /// Encode a solid colour.
    fn build_color(&self, color: RgbColor) -> Vec<Packet>;

    /// Encode a host-scale brightness.
    fn build_brightness(&self, brightness: u16) -> Vec<Packet>;

    /// Encode scene selection by name. Unknown names produce no packets.
    fn build_scene(&self, name: &str) -> Vec<Packet>;

    /// Encode full white.
    fn build_white(&self) -> Vec<Packet> {
        self.build_color(RgbColor::WHITE)
    }

    /// Optional commands this profile implements.
    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Check whether an optional command is implemented.
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Encode scene selection by id.
    fn build_scene_by_id(&self, _id: u16, _param: Option<u16>) -> Option<Vec<Packet>> {
        None
    }

    /// Encode a music mode.
    fn build_music_mode(&self, _mode: &MusicModeInput) -> Option<Vec<Packet>> {
        None
    }

    /// Encode music sensitivity.
    fn build_music_sensitivity(&self, _value: i32) -> Option<Vec<Packet>> {
        None
    }

    /// Encode the on/off timer.
    fn build_schedule(&self, _schedule: &Schedule) -> Option<Vec<Packet>> {
        None
    }

    /// Catalog name of a scene id, if the profile has one.
    fn effect_for_scene_id(&self, _id: u16) -> Option<&str> {
        None
    }

    /// Encode any command.
    ///
    /// Returns `None` when the profile does not implement the command's
    /// capability.
    fn encode(&self, command: &LightCommand) -> Option<Vec<Packet>> {
        match command {
            LightCommand::Power(on) => Some(self.build_power(*on)),
            LightCommand::Color(color) => Some(self.build_color(*color)),
            LightCommand::Brightness(value) => Some(self.build_brightness(*value)),
            LightCommand::Scene(name) => Some(self.build_scene(name)),
            LightCommand::White => Some(self.build_white()),
            LightCommand::SceneById { id, param } => self.build_scene_by_id(*id, *param),
            LightCommand::MusicMode(mode) => self.build_music_mode(mode),
            LightCommand::MusicSensitivity(value) => self.build_music_sensitivity(*value),
            LightCommand::Schedule(schedule) => self.build_schedule(schedule),
        }
    }
}
