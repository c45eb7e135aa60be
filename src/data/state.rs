//! Observed light state.
//!
//! The lights have no read-back channel, so everything here is what this
//! library last successfully told the device.

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RgbColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl RgbColor {
    /// Full white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array.
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<(u8, u8, u8)> for RgbColor {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl std::fmt::Display for RgbColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Last-known state of a light.
///
/// Fields are `None` until a command has set them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightState {
    /// Whether the light is on.
    pub is_on: Option<bool>,
    /// Brightness on the 0-255 host scale.
    pub brightness: Option<u8>,
    /// Last colour set.
    pub color: Option<RgbColor>,
    /// Active effect name.
    pub effect: Option<String>,
}

impl LightState {
    /// Check if the light is known to be on.
    pub fn is_on(&self) -> bool {
        self.is_on.unwrap_or(false)
    }

    /// Check if either a colour or an effect is known.
    pub fn has_color_or_effect(&self) -> bool {
        self.color.is_some() || self.effect.is_some()
    }
}

/// Optional parts of a turn-on request.
///
/// Colour takes precedence over effect when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnOnOptions {
    /// Colour to apply after powering on.
    pub color: Option<RgbColor>,
    /// Effect to select after powering on.
    pub effect: Option<String>,
    /// Brightness (0-255) to apply last.
    pub brightness: Option<u8>,
}

impl TurnOnOptions {
    /// Turn on without changing colour, effect or brightness.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the colour.
    pub fn with_color(mut self, color: RgbColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the effect.
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effect = Some(effect.into());
        self
    }

    /// Set the brightness.
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }
}
