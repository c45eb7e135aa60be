//! Data structures for light state and schedules.

pub mod schedule;
pub mod state;

pub use schedule::{DaysMask, Schedule, ScheduleEntry};
pub use state::{LightState, RgbColor, TurnOnOptions};
