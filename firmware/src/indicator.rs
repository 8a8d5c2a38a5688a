//! RGB status LED on three GPIO lines.

use core::time::Duration;

use embassy_time::{Duration as EmbassyDuration, block_for};
use esp_hal::gpio::{Level, Output};
use shutter_core::indicator::{Indicator, Rgb};

/// Discrete RGB LED, one active-high GPIO per channel.
///
/// Channels are switched, not dimmed: a component that scales to zero at the
/// configured brightness stays dark.
pub struct GpioRgbIndicator<'d> {
    red: Output<'d>,
    green: Output<'d>,
    blue: Output<'d>,
    brightness: u8,
}

impl<'d> GpioRgbIndicator<'d> {
    pub fn new(red: Output<'d>, green: Output<'d>, blue: Output<'d>, brightness: u8) -> Self {
        let mut indicator = Self {
            red,
            green,
            blue,
            brightness,
        };
        indicator.drive(Rgb::OFF);
        indicator
    }

    fn drive(&mut self, color: Rgb) {
        let lit = color.scaled(self.brightness);
        self.red.set_level(level(lit.r));
        self.green.set_level(level(lit.g));
        self.blue.set_level(level(lit.b));
    }
}

impl Indicator for GpioRgbIndicator<'_> {
    fn pulse(&mut self, color: Rgb, duration: Duration) {
        self.drive(color);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        block_for(EmbassyDuration::from_micros(micros));
        self.drive(Rgb::OFF);
    }
}

fn level(component: u8) -> Level {
    if component > 0 { Level::High } else { Level::Low }
}
