//! Time primitives shared by the scheduler, telemetry, and blocking feedback paths.

use core::ops::Add;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

/// Monotonic instant supplied by the platform (embassy ticks, host clock, or a test mock).
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Blocks on `delay` for `duration`, saturating at `u32::MAX` microseconds.
pub fn block_for<D: DelayNs>(delay: &mut D, duration: Duration) {
    if duration.is_zero() {
        return;
    }

    let micros = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
    delay.delay_us(micros);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn zero_duration_does_not_touch_delay() {
        let mut delay = RecordingDelay { total_ns: 0 };
        block_for(&mut delay, Duration::ZERO);
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn blocks_for_whole_duration() {
        let mut delay = RecordingDelay { total_ns: 0 };
        block_for(&mut delay, Duration::from_millis(125));
        assert_eq!(delay.total_ns, 125_000_000);
    }
}
