//! Firmware clock adapter for the shared core.

use core::ops::Add;
use core::time::Duration;

use embassy_time::{Duration as EmbassyDuration, Instant};
use shutter_core::timing::MonotonicInstant;

/// `embassy_time::Instant` measured in core `Duration`s.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self::from(Instant::now())
    }

    #[cfg(test)]
    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(
            self.0
                .checked_add(EmbassyDuration::from_micros(micros))
                .unwrap_or(Instant::MAX),
        )
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}
