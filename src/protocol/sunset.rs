//! Sunset Light (legacy) encoder.
//!
//! Raw RGB colour, brightness as a 0-100 percentage and a single parameter
//! byte per scene. No optional commands.

use std::collections::HashMap;

use crate::ble::uuids::{LIGHT_NOTIFY_UUID, LIGHT_SERVICE_UUID, LIGHT_WRITE_UUID};
use crate::data::RgbColor;
use crate::protocol::packet::Packet;
use crate::protocol::profile::{LightProfile, ProfileIdentity};
use crate::protocol::{CMD_BRIGHTNESS, CMD_COLOR, CMD_POWER, CMD_SCENE};
use crate::utils::scale_brightness;

/// Device brightness ceiling.
const BRIGHTNESS_MAX: u16 = 100;

/// Scenes in display order with their parameter byte.
///
/// Some scenes share a parameter byte on the device.
const SCENES: [(&str, u8); 20] = [
    ("Fantasy", 0x80),
    ("Sunset", 0x82),
    ("Forest", 0x82),
    ("Ghost", 0x84),
    ("Sunrise", 0x83),
    ("Midsummer", 0x85),
    ("Tropicaltwilight", 0x86),
    ("Green Prairie", 0x81),
    ("Rubyglow", 0x89),
    ("Aurora", 0x89),
    ("Savanah", 0x8B),
    ("Alarm", 0x88),
    ("Lake Placid", 0x8C),
    ("Neon", 0x8D),
    ("Sundowner", 0x8E),
    ("Bluestar", 0x8F),
    ("Redrose", 0x90),
    ("Rating", 0x91),
    ("Disco", 0x87),
    ("Autumn", 0x93),
];

/// Encoder for Sunset Light fixtures.
#[derive(Debug, Clone)]
pub struct SunsetProfile {
    identity: ProfileIdentity,
    effects: Vec<String>,
    scene_params: HashMap<String, u8>,
}

impl SunsetProfile {
    /// Display name of this variant.
    pub const NAME: &'static str = "Sunset Light";

    /// Create the profile.
    pub fn new() -> Self {
        Self {
            identity: ProfileIdentity {
                name: Self::NAME,
                service_uuid: LIGHT_SERVICE_UUID,
                write_characteristic: LIGHT_WRITE_UUID,
                notify_characteristic: LIGHT_NOTIFY_UUID,
            },
            effects: SCENES.iter().map(|(name, _)| name.to_string()).collect(),
            scene_params: SCENES
                .iter()
                .map(|(name, param)| (name.to_lowercase(), *param))
                .collect(),
        }
    }

    /// Scene parameter byte for a name, ignoring case.
    pub fn scene_param(&self, name: &str) -> Option<u8> {
        self.scene_params.get(&name.to_lowercase()).copied()
    }
}

impl Default for SunsetProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl LightProfile for SunsetProfile {
    fn identity(&self) -> &ProfileIdentity {
        &self.identity
    }

    fn effects(&self) -> &[String] {
        &self.effects
    }

    fn build_power(&self, on: bool) -> Vec<Packet> {
        vec![Packet::frame(CMD_POWER, &[u8::from(on)])]
    }

    fn build_color(&self, color: RgbColor) -> Vec<Packet> {
        vec![Packet::frame(CMD_COLOR, &color.to_array())]
    }

    fn build_brightness(&self, brightness: u16) -> Vec<Packet> {
        let percent = scale_brightness(brightness, BRIGHTNESS_MAX) as u8;
        vec![Packet::frame(CMD_BRIGHTNESS, &[percent])]
    }

    fn build_scene(&self, name: &str) -> Vec<Packet> {
        match self.scene_param(name) {
            Some(param) => vec![Packet::frame(CMD_SCENE, &[param])],
            None => Vec::new(),
        }
    }
}
