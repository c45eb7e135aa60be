//! On/off timer schedule.

use chrono::Weekday;

use crate::error::{Error, Result};

/// Bitmask of weekdays: bit 0 is Monday, bit 6 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DaysMask(pub u8);

impl DaysMask {
    /// No days.
    pub const NONE: Self = Self(0);
    /// Every day of the week.
    pub const ALL: Self = Self(0x7F);

    /// Build a mask from weekdays.
    pub fn from_weekdays<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        let bits = days
            .into_iter()
            .fold(0u8, |mask, day| mask | (1 << day.num_days_from_monday()));
        Self(bits)
    }

    /// Build a mask from day names such as `"mon"` or `"Tuesday"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a name that is not a weekday.
    pub fn from_day_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let days = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                name.parse::<Weekday>().map_err(|_| Error::InvalidParameter {
                    name: "weekday".to_string(),
                    value: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_weekdays(days))
    }

    /// Check whether `day` is set.
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    /// Raw mask limited to the seven day bits.
    pub fn bits(&self) -> u8 {
        self.0 & Self::ALL.0
    }
}

/// One half of a schedule (the on timer or the off timer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleEntry {
    /// Whether this timer is active.
    pub enabled: bool,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Days the timer repeats on.
    pub days: DaysMask,
}

impl ScheduleEntry {
    /// Create an enabled timer.
    pub fn at(hour: u8, minute: u8, days: DaysMask) -> Self {
        Self {
            enabled: true,
            hour,
            minute,
            days,
        }
    }

    /// A disabled timer.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Wire bytes: enabled flag, hour, minute, days, clamped to their ranges.
    pub(crate) fn to_bytes(self) -> [u8; 4] {
        [
            u8::from(self.enabled),
            self.hour.min(23),
            self.minute.min(59),
            self.days.0.min(0x7F),
        ]
    }
}

/// Combined on/off timer programmed into the light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    /// Timer that turns the light on.
    pub on: ScheduleEntry,
    /// Timer that turns the light off.
    pub off: ScheduleEntry,
}

impl Schedule {
    /// Create a schedule from its two timers.
    pub fn new(on: ScheduleEntry, off: ScheduleEntry) -> Self {
        Self { on, off }
    }

    /// The 8-byte payload: on fields followed by off fields.
    pub(crate) fn to_payload(self) -> [u8; 8] {
        let on = self.on.to_bytes();
        let off = self.off.to_bytes();
        [on[0], on[1], on[2], on[3], off[0], off[1], off[2], off[3]]
    }
}
