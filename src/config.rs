//! Per-light configuration.
//!
//! The host persists an address and a profile key for each light. This
//! crate only reads them.

use std::sync::Arc;
use std::time::Duration;

use crate::ble::connection::DEFAULT_IDLE_TIMEOUT;
use crate::error::{Error, Result};
use crate::protocol::{HexagonProfile, LightProfile, SunsetProfile};

/// Device variant selected for a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Option<String>", into = "String"))]
pub enum ProfileKind {
    /// Sunset Light (the default).
    #[default]
    Sunset,
    /// Hexagon Light.
    Hexagon,
}

impl ProfileKind {
    /// Persisted key for the Sunset profile.
    pub const SUNSET_KEY: &'static str = "sunset_light";
    /// Persisted key for the Hexagon profile.
    pub const HEXAGON_KEY: &'static str = "hexagon_light";

    /// Map a persisted key to a profile. Missing or unknown keys select Sunset.
    pub fn from_key(key: Option<&str>) -> Self {
        match key {
            Some(Self::HEXAGON_KEY) => Self::Hexagon,
            _ => Self::Sunset,
        }
    }

    /// Guess the profile from an advertised device name.
    pub fn guess_from_name(name: &str) -> Self {
        if name.to_lowercase().contains("hexagon") {
            Self::Hexagon
        } else {
            Self::Sunset
        }
    }

    /// All profiles as `(key, label)` pairs, for a host selection list.
    pub fn all() -> [(&'static str, &'static str); 2] {
        [
            (Self::SUNSET_KEY, SunsetProfile::NAME),
            (Self::HEXAGON_KEY, HexagonProfile::NAME),
        ]
    }

    /// Persisted key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sunset => Self::SUNSET_KEY,
            Self::Hexagon => Self::HEXAGON_KEY,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sunset => SunsetProfile::NAME,
            Self::Hexagon => HexagonProfile::NAME,
        }
    }

    /// Build the encoder for this variant.
    pub fn create_profile(&self) -> Arc<dyn LightProfile> {
        match self {
            Self::Sunset => Arc::new(SunsetProfile::new()),
            Self::Hexagon => Arc::new(HexagonProfile::new()),
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl From<Option<String>> for ProfileKind {
    fn from(key: Option<String>) -> Self {
        Self::from_key(key.as_deref())
    }
}

impl From<ProfileKind> for String {
    fn from(kind: ProfileKind) -> Self {
        kind.key().to_string()
    }
}

/// Configuration for one light.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightConfig {
    /// BLE address (MAC, or platform identifier where MACs are hidden).
    pub address: String,
    /// Device variant.
    #[cfg_attr(feature = "serde", serde(default))]
    pub profile: ProfileKind,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Quiet period before the link is closed.
    #[cfg_attr(feature = "serde", serde(default = "default_idle_timeout"))]
    pub idle_timeout: Duration,
}

#[cfg(feature = "serde")]
fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

impl LightConfig {
    /// Default display name.
    pub const DEFAULT_NAME: &'static str = "MeRGBW Light";

    /// Create a configuration with the default profile and idle timeout.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            profile: ProfileKind::default(),
            name: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Create a configuration from persisted entry data.
    pub fn from_entry(address: impl Into<String>, profile_key: Option<&str>) -> Self {
        Self::new(address).with_profile(ProfileKind::from_key(profile_key))
    }

    /// Set the profile.
    pub fn with_profile(mut self, profile: ProfileKind) -> Self {
        self.profile = profile;
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Display name, falling back to [`Self::DEFAULT_NAME`].
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(Self::DEFAULT_NAME)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "address".to_string(),
                value: self.address.clone(),
            });
        }

        if self.idle_timeout.is_zero() {
            return Err(Error::InvalidParameter {
                name: "idle_timeout".to_string(),
                value: format!("{:?}", self.idle_timeout),
            });
        }

        Ok(())
    }
}
