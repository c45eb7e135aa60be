//! Hexagon Light encoder.
//!
//! Colour is sent as hue/saturation (value is left to the brightness
//! command), brightness on a 0-1000 scale, and scenes by a 16-bit id
//! followed by a scene parameter packet. Also supports music modes and the
//! on/off timer.
//!
//! Scene ids come from packet captures of the vendor app and are split into
//! three catalogs. The "other" catalog holds every id in `1..=0x75` not
//! claimed by the classic or festival catalogs.

use std::collections::{BTreeSet, HashMap};

use crate::ble::uuids::{LIGHT_NOTIFY_UUID, LIGHT_SERVICE_UUID, LIGHT_WRITE_UUID};
use crate::data::{RgbColor, Schedule};
use crate::protocol::packet::Packet;
use crate::protocol::profile::{Capability, LightProfile, ProfileIdentity};
use crate::protocol::{
    CMD_BRIGHTNESS, CMD_COLOR, CMD_MUSIC_MODE, CMD_MUSIC_SENSITIVITY, CMD_POWER, CMD_SCENE,
    CMD_SCENE_PARAM, CMD_SCHEDULE,
};
use crate::utils::{rgb_to_hue_saturation, scale_brightness};

/// Device brightness ceiling.
const BRIGHTNESS_MAX: u16 = 1000;

/// Saturation ceiling.
const SATURATION_MAX: f64 = 1000.0;

/// Scene parameter sent when the caller gives none.
pub const DEFAULT_SCENE_PARAM: u16 = 0x3200;

/// Highest catalogued scene id. `build_scene_by_id` accepts any id.
pub const MAX_SCENE_ID: u16 = 0x75;

const CLASSIC_SCENES: [(&str, u16); 18] = [
    ("Symphony", 0x0002),
    ("Energy", 0x0003),
    ("Jump", 0x0004),
    ("Vitality", 0x0007),
    ("Accumulation", 0x0010),
    ("Chase", 0x0017),
    ("Space-time", 0x002D),
    ("Ephemeral", 0x0023),
    ("Flow", 0x0037),
    ("Forest", 0x000D),
    ("Neon Lights", 0x0030),
    ("Green Jade", 0x0047),
    ("Running", 0x005B),
    ("Pink Light", 0x006D),
    ("Alarm", 0x0071),
    ("Aurora", 0x003B),
    ("Rainbow", 0x001A),
    ("Melody", 0x0020),
];

const FESTIVAL_SCENES: [(&str, u16); 15] = [
    ("Christmas", 0x0008),
    ("Halloween", 0x000B),
    ("Valentine's Day", 0x0066),
    ("New Year", 0x0005),
    ("Candlelight", 0x0074),
    ("Birthday", 0x006F),
    ("Ghost", 0x0006),
    ("Party", 0x000C),
    ("Carnival", 0x001D),
    ("Disco", 0x0001),
    ("Sweet", 0x0009),
    ("Romantic", 0x000A),
    ("Dating", 0x000E),
    ("Ball", 0x000F),
    ("Game", 0x0011),
];

/// Names for the "other" catalog, assigned to its ids in ascending order.
const OTHER_SCENE_NAMES: [&str; 75] = [
    "Cycling",
    "Fantasy color",
    "Seven-color energy",
    "Seven-color jump",
    "Red-green-blue jump",
    "Yellow-cyan-purple jump",
    "Seven-color strobe",
    "Red-green-blue strobe",
    "Yellow-cyan-purple strobe",
    "Seven-color gradient",
    "Red-yellow alternating gradient",
    "Red-purple alternating gradient",
    "Green-cyan alternating gradient",
    "Green-yellow alternating gradient",
    "Blue-purple alternating gradient",
    "Red accumulation",
    "Green accumulation",
    "Blue accumulation",
    "Yellow accumulation",
    "Cyan accumulation",
    "Purple accumulation",
    "White accumulation",
    "Seven-color chase",
    "Red-green-blue chase",
    "Yellow-cyan-purple chase",
    "Seven-color drift",
    "Red-green-blue drift",
    "Yellow-cyan-purple drift",
    "Seven-color brushing",
    "Red-green-blue brushing",
    "Yellow-cyan brushing",
    "Seven-color melody closing",
    "Red-green-blue melody closing",
    "Yellow-cyan-purple melody closing",
    "Seven-color opening and closing",
    "Red-green-blue opening and closing",
    "Yellow-cyan-purple opening and closing",
    "Red opening and closing",
    "Green opening and closing",
    "Blue opening and closing",
    "Yellow opening and closing",
    "Cyan opening and closing",
    "Purple opening and closing",
    "White opening and closing",
    "Seven-color light and dark transition",
    "Red-green-blue light and dark transition",
    "Purple-cyan-yellow light and dark transition",
    "Six-color dark transition red",
    "Six-color dark transition green",
    "Six-color dark transition blue",
    "Six-color dark transition cyan",
    "Six-color dark transition yellow",
    "Six-color dark transition purple",
    "Six-color dark transition white",
    "Seven-color flowing water",
    "Red-green-blue flowing water",
    "Cyan-yellow-purple flowing water",
    "Red-green flowing water",
    "Green-blue flowing water",
    "Yellow-blue flowing water",
    "Yellow-cyan flowing water",
    "Cyan-purple flowing water",
    "Black-and-white flowing water",
    "White-red-white flow",
    "White-green-white flow",
    "White-blue-white flow",
    "White-yellow-white flow",
    "White-cyan-white flow",
    "White-purple-white flow",
    "Red-white-red flow",
    "Green-white-green flow",
    "Blue-white-blue flow",
    "Yellow-white-yellow flow",
    "Cyan-white-cyan flow",
    "Purple-white-purple flow",
];

const CAPABILITIES: [Capability; 4] = [
    Capability::SceneById,
    Capability::MusicMode,
    Capability::MusicSensitivity,
    Capability::Schedule,
];

/// Music-reactive modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MusicMode {
    /// Spectrum 1 (1).
    Spectrum1 = 1,
    /// Spectrum 2 (2).
    Spectrum2 = 2,
    /// Spectrum 3 (3).
    Spectrum3 = 3,
    /// Flowing (4).
    Flowing = 4,
    /// Rolling (5).
    Rolling = 5,
    /// Rhythm (6).
    Rhythm = 6,
}

impl MusicMode {
    /// Look up a mode by its alias, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "spectrum1" => Some(Self::Spectrum1),
            "spectrum2" => Some(Self::Spectrum2),
            "spectrum3" => Some(Self::Spectrum3),
            "flowing" => Some(Self::Flowing),
            "rolling" => Some(Self::Rolling),
            "rhythm" => Some(Self::Rhythm),
            _ => None,
        }
    }

    /// Mode for a number, clamped into `1..=6`.
    pub fn from_number(value: i64) -> Self {
        match value.clamp(1, 6) {
            1 => Self::Spectrum1,
            2 => Self::Spectrum2,
            3 => Self::Spectrum3,
            4 => Self::Flowing,
            5 => Self::Rolling,
            _ => Self::Rhythm,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(self) -> u8 {
        self as u8
    }
}

/// A music mode as a caller may supply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicModeInput {
    /// Numeric mode, clamped into `1..=6`.
    Number(i64),
    /// Alias such as `"rolling"`.
    Name(String),
}

impl MusicModeInput {
    /// Resolve to a mode. Unknown aliases resolve to `None`.
    pub fn resolve(&self) -> Option<MusicMode> {
        match self {
            Self::Number(value) => Some(MusicMode::from_number(*value)),
            Self::Name(name) => MusicMode::from_name(name),
        }
    }
}

impl From<i64> for MusicModeInput {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for MusicModeInput {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for MusicModeInput {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<MusicMode> for MusicModeInput {
    fn from(mode: MusicMode) -> Self {
        Self::Number(i64::from(mode.to_raw()))
    }
}

/// Encoder for Hexagon Light fixtures.
#[derive(Debug, Clone)]
pub struct HexagonProfile {
    identity: ProfileIdentity,
    effects: Vec<String>,
    scene_ids: HashMap<String, u16>,
    scene_names: HashMap<u16, usize>,
}

impl HexagonProfile {
    /// Display name of this variant.
    pub const NAME: &'static str = "Hexagon Light";

    /// Create the profile, building the scene catalogs.
    pub fn new() -> Self {
        let claimed: BTreeSet<u16> = CLASSIC_SCENES
            .iter()
            .chain(FESTIVAL_SCENES.iter())
            .map(|(_, id)| *id)
            .collect();
        let other_ids: Vec<u16> = (1..=MAX_SCENE_ID)
            .filter(|id| !claimed.contains(id))
            .collect();

        let mut catalog: Vec<(String, u16)> = CLASSIC_SCENES
            .iter()
            .chain(FESTIVAL_SCENES.iter())
            .map(|(name, id)| (name.to_string(), *id))
            .collect();

        for (idx, id) in other_ids.iter().enumerate() {
            let name = match OTHER_SCENE_NAMES.get(idx) {
                Some(name) => name.to_string(),
                None => format!("Other {:02} (id {})", idx + 1, id),
            };
            catalog.push((name, *id));
        }

        let scene_ids = catalog
            .iter()
            .map(|(name, id)| (name.to_lowercase(), *id))
            .collect();
        let scene_names = catalog
            .iter()
            .enumerate()
            .map(|(idx, (_, id))| (*id, idx))
            .collect();
        let effects = catalog.into_iter().map(|(name, _)| name).collect();

        Self {
            identity: ProfileIdentity {
                name: Self::NAME,
                service_uuid: LIGHT_SERVICE_UUID,
                write_characteristic: LIGHT_WRITE_UUID,
                notify_characteristic: LIGHT_NOTIFY_UUID,
            },
            effects,
            scene_ids,
            scene_names,
        }
    }

    /// Scene id for a name, ignoring case.
    pub fn scene_id(&self, name: &str) -> Option<u16> {
        self.scene_ids.get(&name.to_lowercase()).copied()
    }

    fn scene_packets(&self, id: u16, param: u16) -> Vec<Packet> {
        vec![
            Packet::frame(CMD_SCENE, &id.to_be_bytes()),
            Packet::frame(CMD_SCENE_PARAM, &param.to_be_bytes()),
        ]
    }
}

impl Default for HexagonProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl LightProfile for HexagonProfile {
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
        let (hue, saturation) = rgb_to_hue_saturation(color.r, color.g, color.b);
        let hue_deg = ((hue * 360.0) as u16).min(359);
        let sat = (saturation * SATURATION_MAX) as u16;

        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&hue_deg.to_be_bytes());
        payload[2..].copy_from_slice(&sat.to_be_bytes());

        vec![Packet::frame(CMD_COLOR, &payload)]
    }

    fn build_brightness(&self, brightness: u16) -> Vec<Packet> {
        let scaled = scale_brightness(brightness, BRIGHTNESS_MAX);
        vec![Packet::frame(CMD_BRIGHTNESS, &scaled.to_be_bytes())]
    }

    fn build_scene(&self, name: &str) -> Vec<Packet> {
        match self.scene_id(name) {
            Some(id) => self.scene_packets(id, DEFAULT_SCENE_PARAM),
            None => Vec::new(),
        }
    }

    fn capabilities(&self) -> &'static [Capability] {
        &CAPABILITIES
    }

    fn build_scene_by_id(&self, id: u16, param: Option<u16>) -> Option<Vec<Packet>> {
        Some(self.scene_packets(id, param.unwrap_or(DEFAULT_SCENE_PARAM)))
    }

    fn build_music_mode(&self, mode: &MusicModeInput) -> Option<Vec<Packet>> {
        let packets = match mode.resolve() {
            Some(mode) => vec![Packet::frame(CMD_MUSIC_MODE, &[mode.to_raw()])],
            None => Vec::new(),
        };
        Some(packets)
    }

    fn build_music_sensitivity(&self, value: i32) -> Option<Vec<Packet>> {
        let clamped = value.clamp(0, 100) as u8;
        Some(vec![Packet::frame(CMD_MUSIC_SENSITIVITY, &[clamped])])
    }

    fn build_schedule(&self, schedule: &Schedule) -> Option<Vec<Packet>> {
        Some(vec![Packet::frame(CMD_SCHEDULE, &schedule.to_payload())])
    }

    fn effect_for_scene_id(&self, id: u16) -> Option<&str> {
        self.scene_names
            .get(&id)
            .and_then(|idx| self.effects.get(*idx))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DaysMask, ScheduleEntry};
    use crate::protocol::profile::LightCommand;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_power_matches_sunset_framing() {
        let profile = HexagonProfile::new();
        let packet = &profile.build_power(true)[0];
        assert_eq!(packet.as_bytes(), &[0x55, 0x01, 0xFF, 0x06, 0x01, 0xA2]);
    }

    #[test]
    fn test_color_red() {
        let profile = HexagonProfile::new();
        let packet = &profile.build_color(RgbColor::new(255, 0, 0))[0];
        assert_eq!(packet.command(), 0x03);
        assert_eq!(&packet.payload()[0..2], &[0x00, 0x00]);
        assert_eq!(&packet.payload()[2..4], &[0x03, 0xE8]);
    }

    #[test]
    fn test_color_ignores_value() {
        let profile = HexagonProfile::new();
        let green = &profile.build_color(RgbColor::new(0, 255, 0))[0];
        assert_eq!(
            green.as_bytes(),
            &[0x55, 0x03, 0xFF, 0x09, 0x00, 0x78, 0x03, 0xE8, 0x3A]
        );

        let dim_green = &profile.build_color(RgbColor::new(0, 40, 0))[0];
        assert_eq!(dim_green.payload(), green.payload());
    }

    #[test]
    fn test_color_mixed() {
        let profile = HexagonProfile::new();
        let packet = &profile.build_color(RgbColor::new(10, 20, 30))[0];
        // hue 210 deg, saturation 666
        assert_eq!(packet.payload(), &[0x00, 0xD2, 0x02, 0x9A]);
    }

    #[test]
    fn test_brightness_scaling() {
        let profile = HexagonProfile::new();
        assert_eq!(profile.build_brightness(255)[0].payload(), &[0x03, 0xE8]);
        assert_eq!(profile.build_brightness(0)[0].payload(), &[0x00, 0x00]);
        assert_eq!(profile.build_brightness(400)[0].payload(), &[0x03, 0xE8]);
        assert_eq!(
            profile.build_brightness(128)[0].as_bytes(),
            &[0x55, 0x05, 0xFF, 0x07, 0x01, 0xF5, 0xA7]
        );
    }

    #[test]
    fn test_scene_by_name_emits_two_packets() {
        let profile = HexagonProfile::new();
        let packets = profile.build_scene("symphony");
        assert_eq!(packets.len(), 2);
        assert_eq!(
            packets[0].as_bytes(),
            &[0x55, 0x06, 0xFF, 0x07, 0x00, 0x02, 0x9B]
        );
        assert_eq!(
            packets[1].as_bytes(),
            &[0x55, 0x0F, 0xFF, 0x07, 0x32, 0x00, 0x62]
        );
    }

    #[test]
    fn test_scene_by_id_with_param() {
        let profile = HexagonProfile::new();
        let packets = profile.build_scene_by_id(0x1234, Some(0x5678)).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].command(), 0x06);
        assert_eq!(packets[0].payload(), &[0x12, 0x34]);
        assert_eq!(packets[1].command(), 0x0F);
        assert_eq!(packets[1].payload(), &[0x56, 0x78]);
    }

    #[test]
    fn test_scene_by_id_default_param() {
        let profile = HexagonProfile::new();
        let packets = profile.build_scene_by_id(7, None).unwrap();
        assert_eq!(packets[1].payload(), &[0x32, 0x00]);
    }

    #[test]
    fn test_unknown_scene_is_empty() {
        let profile = HexagonProfile::new();
        assert!(profile.build_scene("not-a-scene").is_empty());
    }

    #[test]
    fn test_catalog_covers_every_id() {
        let profile = HexagonProfile::new();
        assert_eq!(profile.effects().len(), MAX_SCENE_ID as usize);

        let ids: BTreeSet<u16> = profile
            .effects()
            .iter()
            .filter_map(|name| profile.scene_id(name))
            .collect();
        assert_eq!(ids, (1..=MAX_SCENE_ID).collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_catalog_order_and_ids() {
        let profile = HexagonProfile::new();
        assert_eq!(profile.effects()[0], "Symphony");
        assert_eq!(profile.effects()[18], "Christmas");
        assert_eq!(profile.effects()[33], "Cycling");
        assert_eq!(profile.scene_id("Cycling"), Some(18));
        assert_eq!(profile.scene_id("purple-white-purple flow"), Some(104));
        assert_eq!(profile.scene_id("Valentine's Day"), Some(0x66));
    }

    #[test]
    fn test_other_catalog_placeholders() {
        let profile = HexagonProfile::new();
        let last = profile.effects().last().unwrap();
        assert_eq!(last, "Other 84 (id 117)");
        assert_eq!(profile.scene_id("other 76 (id 105)"), Some(105));
    }

    #[test]
    fn test_effect_for_scene_id() {
        let profile = HexagonProfile::new();
        assert_eq!(profile.effect_for_scene_id(0x0002), Some("Symphony"));
        assert_eq!(profile.effect_for_scene_id(0x1234), None);
    }

    #[test]
    fn test_music_mode_by_name_and_number() {
        let profile = HexagonProfile::new();
        let packet = &profile.build_music_mode(&"rolling".into()).unwrap()[0];
        assert_eq!(packet.command(), 0x07);
        assert_eq!(packet.payload(), &[5]);

        let packet = &profile.build_music_mode(&"RHYTHM".into()).unwrap()[0];
        assert_eq!(packet.payload(), &[6]);

        let packet = &profile.build_music_mode(&MusicModeInput::Number(0)).unwrap()[0];
        assert_eq!(packet.payload(), &[1]);

        let packet = &profile.build_music_mode(&MusicModeInput::Number(42)).unwrap()[0];
        assert_eq!(packet.payload(), &[6]);
    }

    #[test]
    fn test_music_mode_unknown_name_is_empty() {
        let profile = HexagonProfile::new();
        assert_eq!(profile.build_music_mode(&"flow".into()), Some(Vec::new()));
    }

    #[test]
    fn test_music_sensitivity_clamps() {
        let profile = HexagonProfile::new();
        let packet = &profile.build_music_sensitivity(60).unwrap()[0];
        assert_eq!(packet.command(), 0x08);
        assert_eq!(packet.payload(), &[60]);
        assert_eq!(profile.build_music_sensitivity(-5).unwrap()[0].payload(), &[0]);
        assert_eq!(profile.build_music_sensitivity(250).unwrap()[0].payload(), &[100]);
    }

    #[test]
    fn test_schedule_packet() {
        let profile = HexagonProfile::new();
        let schedule = Schedule::new(
            ScheduleEntry::at(10, 5, DaysMask(0x03)),
            ScheduleEntry {
                enabled: false,
                hour: 20,
                minute: 10,
                days: DaysMask::ALL,
            },
        );
        let packet = &profile.build_schedule(&schedule).unwrap()[0];
        assert_eq!(packet.command(), 0x0A);
        assert_eq!(packet.payload(), &[1, 10, 5, 0x03, 0, 20, 10, 0x7F]);
        assert_eq!(packet.checksum(), 0xE2);
    }

    #[test]
    fn test_capabilities_match_builders() {
        let profile = HexagonProfile::new();
        for capability in CAPABILITIES {
            assert!(profile.supports(capability));
        }
        assert!(profile
            .encode(&LightCommand::SceneById { id: 3, param: None })
            .is_some());
    }
}
