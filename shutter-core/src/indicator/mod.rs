//! Visual feedback protocol.
//!
//! [`IndicatorSignal`] maps abstract [`FeedbackEvent`]s onto short colored
//! pulse trains driven through the platform [`Indicator`]. Every pulse blocks
//! the caller for its on-time plus the inter-pulse gap, which bounds the tick
//! jitter the scheduler can observe.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::timing::block_for;

/// On-time for connection and self-test pulses.
pub const PULSE_ON: Duration = Duration::from_millis(100);
/// Gap between pulses (on-time x 1.25).
pub const PULSE_GAP: Duration = Duration::from_millis(125);
/// Number of pulses emitted on a connection edge.
pub const EDGE_PULSE_COUNT: usize = 3;
/// On-time for the trigger success flash.
pub const SUCCESS_PULSE: Duration = Duration::from_millis(50);
/// On-time for the no-peer failure flash.
pub const NO_PEER_PULSE: Duration = Duration::from_millis(100);
/// Default global brightness applied by LED drivers (0-255).
pub const DEFAULT_BRIGHTNESS: u8 = 60;

/// 8-bit RGB triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn is_off(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }

    /// Scales every channel by `brightness / 255`.
    #[must_use]
    pub const fn scaled(self, brightness: u8) -> Self {
        Self {
            r: scale_channel(self.r, brightness),
            g: scale_channel(self.g, brightness),
            b: scale_channel(self.b, brightness),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn scale_channel(value: u8, brightness: u8) -> u8 {
    // Product / 255 never exceeds 255.
    ((value as u16 * brightness as u16) / 255) as u8
}

/// A single pulse request handed to the indicator driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorCommand {
    pub color: Rgb,
    pub duration: Duration,
}

impl IndicatorCommand {
    #[must_use]
    pub const fn new(color: Rgb, duration: Duration) -> Self {
        Self { color, duration }
    }
}

/// Feedback events surfaced to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// Boot-time red/green/blue sweep.
    SelfTest,
    Connected,
    Disconnected,
    TriggerSent,
    NoPeer,
}

/// Pulse train rendered for a [`FeedbackEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedbackPattern {
    pub colors: &'static [Rgb],
    pub on: Duration,
    pub gap: Duration,
    /// Whether the gap also follows the final pulse.
    pub trailing_gap: bool,
}

impl FeedbackPattern {
    /// Total time the pattern blocks its caller.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        let pulses = u32::try_from(self.colors.len()).unwrap_or(u32::MAX);
        let gaps = if self.trailing_gap {
            pulses
        } else {
            pulses.saturating_sub(1)
        };
        self.on * pulses + self.gap * gaps
    }
}

const SELF_TEST_COLORS: [Rgb; 3] = [Rgb::RED, Rgb::GREEN, Rgb::BLUE];
const CONNECTED_COLORS: [Rgb; EDGE_PULSE_COUNT] = [Rgb::BLUE; EDGE_PULSE_COUNT];
const DISCONNECTED_COLORS: [Rgb; EDGE_PULSE_COUNT] = [Rgb::RED; EDGE_PULSE_COUNT];
const SUCCESS_COLORS: [Rgb; 1] = [Rgb::WHITE];
const NO_PEER_COLORS: [Rgb; 1] = [Rgb::RED];

impl FeedbackEvent {
    /// Returns the pulse pattern for this event.
    #[must_use]
    pub const fn pattern(self) -> FeedbackPattern {
        match self {
            FeedbackEvent::SelfTest => FeedbackPattern {
                colors: &SELF_TEST_COLORS,
                on: PULSE_ON,
                gap: PULSE_GAP,
                trailing_gap: false,
            },
            FeedbackEvent::Connected => FeedbackPattern {
                colors: &CONNECTED_COLORS,
                on: PULSE_ON,
                gap: PULSE_GAP,
                trailing_gap: true,
            },
            FeedbackEvent::Disconnected => FeedbackPattern {
                colors: &DISCONNECTED_COLORS,
                on: PULSE_ON,
                gap: PULSE_GAP,
                trailing_gap: true,
            },
            FeedbackEvent::TriggerSent => FeedbackPattern {
                colors: &SUCCESS_COLORS,
                on: SUCCESS_PULSE,
                gap: Duration::ZERO,
                trailing_gap: false,
            },
            FeedbackEvent::NoPeer => FeedbackPattern {
                colors: &NO_PEER_COLORS,
                on: NO_PEER_PULSE,
                gap: Duration::ZERO,
                trailing_gap: false,
            },
        }
    }
}

/// Indicator light capability.
pub trait Indicator {
    /// Drives `color` for `duration`, then turns the light off. Blocks for `duration`.
    fn pulse(&mut self, color: Rgb, duration: Duration);
}

/// Renders feedback events onto an [`Indicator`].
pub struct IndicatorSignal<S> {
    indicator: S,
    driving: Rgb,
}

impl<S> IndicatorSignal<S>
where
    S: Indicator,
{
    #[must_use]
    pub const fn new(indicator: S) -> Self {
        Self {
            indicator,
            driving: Rgb::OFF,
        }
    }

    /// Plays the pattern for `event`, returning the number of pulses emitted.
    pub fn signal<D: DelayNs>(&mut self, event: FeedbackEvent, delay: &mut D) -> usize {
        let pattern = event.pattern();
        let last = pattern.colors.len().saturating_sub(1);

        for (index, color) in pattern.colors.iter().enumerate() {
            self.emit(IndicatorCommand::new(*color, pattern.on));
            if index < last || pattern.trailing_gap {
                block_for(delay, pattern.gap);
            }
        }

        pattern.colors.len()
    }

    /// Color currently driven; always [`Rgb::OFF`] between pulses.
    #[must_use]
    pub const fn driving(&self) -> Rgb {
        self.driving
    }

    #[must_use]
    pub fn indicator(&self) -> &S {
        &self.indicator
    }

    pub fn indicator_mut(&mut self) -> &mut S {
        &mut self.indicator
    }

    fn emit(&mut self, command: IndicatorCommand) {
        self.driving = command.color;
        self.indicator.pulse(command.color, command.duration);
        self.driving = Rgb::OFF;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, RecordingIndicator, StepDelay};

    #[test]
    fn edge_patterns_pulse_three_times_with_trailing_gap() {
        let pattern = FeedbackEvent::Connected.pattern();
        assert_eq!(pattern.colors, &[Rgb::BLUE; 3]);
        assert_eq!(pattern.total_duration(), Duration::from_millis(675));

        let pattern = FeedbackEvent::Disconnected.pattern();
        assert_eq!(pattern.colors, &[Rgb::RED; 3]);
    }

    #[test]
    fn self_test_sweeps_red_green_blue() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut signal = IndicatorSignal::new(RecordingIndicator::new(&clock));

        let pulses = signal.signal(FeedbackEvent::SelfTest, &mut delay);

        assert_eq!(pulses, 3);
        let colors: heapless::Vec<Rgb, 8> =
            signal.indicator().pulses().iter().map(|p| p.color).collect();
        assert_eq!(colors.as_slice(), &[Rgb::RED, Rgb::GREEN, Rgb::BLUE]);
        // Two gaps between three pulses, no trailing gap.
        assert_eq!(clock.now_micros(), 300_000 + 250_000);
        assert!(signal.driving().is_off());
    }

    #[test]
    fn trigger_feedback_is_a_single_short_flash() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut signal = IndicatorSignal::new(RecordingIndicator::new(&clock));

        signal.signal(FeedbackEvent::TriggerSent, &mut delay);
        signal.signal(FeedbackEvent::NoPeer, &mut delay);

        let pulses = signal.indicator().pulses();
        assert_eq!(
            pulses.as_slice(),
            &[
                IndicatorCommand::new(Rgb::WHITE, SUCCESS_PULSE),
                IndicatorCommand::new(Rgb::RED, NO_PEER_PULSE),
            ]
        );
    }

    #[test]
    fn brightness_scaling_is_proportional() {
        assert_eq!(Rgb::WHITE.scaled(255), Rgb::WHITE);
        assert_eq!(Rgb::WHITE.scaled(0), Rgb::OFF);
        assert_eq!(Rgb::new(255, 128, 0).scaled(DEFAULT_BRIGHTNESS), Rgb::new(60, 30, 0));
    }
}
