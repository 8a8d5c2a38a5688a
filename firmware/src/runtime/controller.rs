//! Blocking controller loop pinned to the second core.

use core::time::Duration;

use embassy_time::{Delay, Duration as EmbassyDuration, block_for};
use esp_hal::gpio::Input;
use shutter_core::debounce::PinInput;
use shutter_core::orchestrator::ShutterOrchestrator;

use crate::console::ConsoleTransport;
use crate::indicator::GpioRgbIndicator;
use crate::instant::FirmwareInstant;
use crate::link::{self, BleLink};
use crate::telemetry;

/// Pause between controller ticks.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

pub type FirmwareShutter = ShutterOrchestrator<
    FirmwareInstant,
    BleLink,
    GpioRgbIndicator<'static>,
    Delay,
    PinInput<Input<'static>>,
>;

pub fn run(mut shutter: FirmwareShutter, mut transport: ConsoleTransport) -> ! {
    shutter.start(FirmwareInstant::now());
    defmt::info!(
        "controller: running key={=u16:#x} brightness={}",
        shutter.config().key.usage(),
        shutter.config().brightness
    );

    let mut cursor = None;
    let mut dropped = 0;
    let pause = EmbassyDuration::from_millis(
        u64::try_from(TICK_PERIOD.as_millis()).unwrap_or(u64::MAX),
    );

    loop {
        let report = shutter.tick(FirmwareInstant::now(), &mut transport);
        if let Some(reply) = report.reply.as_ref() {
            defmt::debug!("controller: reply {=str}", reply.message());
        }
        cursor = telemetry::drain(shutter.telemetry(), cursor);

        let total = link::dropped_reports();
        if total != dropped {
            defmt::warn!("controller: {} reports dropped (queue full)", total - dropped);
            dropped = total;
        }

        block_for(pause);
    }
}
