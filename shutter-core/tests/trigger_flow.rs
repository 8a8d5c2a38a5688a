mod support;

use shutter_core::debounce::{DebounceOutcome, HoldPolicy};
use shutter_core::hid::{ConsumerKey, ConsumerReport};
use shutter_core::indicator::Rgb;
use shutter_core::orchestrator::ShutterConfig;
use shutter_core::telemetry::TelemetryEventKind;
use shutter_core::trigger::{TriggerError, TriggerSource};

use support::Harness;

#[test]
fn fire_without_peer_sends_nothing() {
    let mut harness = Harness::new();

    let reply = harness.command("shoot");

    assert!(!reply.is_success());
    assert_eq!(reply.message(), "no peer connected");
    assert!(harness.link().reports.is_empty());
    assert_eq!(harness.led().pulses, vec![(Rgb::RED, core::time::Duration::from_millis(100))]);
    assert_eq!(
        harness.fire_seconds(TelemetryEventKind::TriggerNoPeer(TriggerSource::Control)),
        vec![0]
    );
}

#[test]
fn fire_with_peer_presses_then_releases() {
    let mut harness = Harness::new();
    harness.set_peers(1);
    harness.tick();

    assert_eq!(harness.command("shoot now").to_string(), "OK fired");

    let reports = &harness.link().reports;
    assert_eq!(reports.len(), 2);
    let (pressed_at, pressed) = reports[0];
    let (released_at, released) = reports[1];
    assert_eq!(pressed, ConsumerReport::pressed(ConsumerKey::VolumeDown));
    assert!(released.is_release());
    assert_eq!(released_at.as_millis() - pressed_at.as_millis(), 50);
    assert_eq!(harness.led().pulses.last().map(|(color, _)| *color), Some(Rgb::WHITE));
}

#[test]
fn held_button_fires_once() {
    let mut harness = Harness::new();
    harness.set_peers(1);
    harness.tick();

    harness.shutter.input_mut().pressed = true;
    let fired = (0..10)
        .filter(|_| matches!(harness.tick().button, Some(DebounceOutcome::Fired(_))))
        .count();

    assert_eq!(fired, 1);
    assert_eq!(harness.link().reports.len(), 2);

    harness.shutter.input_mut().pressed = false;
    let before = harness.clock.now();
    assert_eq!(harness.tick().button, Some(DebounceOutcome::Released));
    assert_eq!(harness.clock.now(), before);

    harness.shutter.input_mut().pressed = true;
    assert_eq!(harness.tick().button, Some(DebounceOutcome::Fired(Ok(()))));
    assert_eq!(harness.link().reports.len(), 4);
}

#[test]
fn blocking_hold_waits_for_release_then_settles() {
    let mut harness = Harness::with_config(ShutterConfig {
        hold_policy: HoldPolicy::BlockUntilRelease,
        ..ShutterConfig::default()
    });
    harness.set_peers(1);
    harness.tick();

    let button = harness.shutter.input_mut();
    button.pressed = true;
    button.reads_until_release = Some(30);
    let before = harness.clock.now();

    assert_eq!(harness.tick().button, Some(DebounceOutcome::Fired(Ok(()))));
    // 50 ms hold, 50 ms success pulse, the release polls, then the 50 ms settle.
    assert!(harness.clock.now().as_millis() - before.as_millis() >= 150);
    assert!(!harness.shutter.input_mut().pressed);

    assert_eq!(harness.tick().button, None);
    assert_eq!(
        harness
            .shutter
            .telemetry()
            .oldest_first()
            .filter(|record| record.event == TelemetryEventKind::TriggerSent(TriggerSource::Button))
            .count(),
        1
    );
}

#[test]
fn button_without_peer_reports_no_peer() {
    let mut harness = Harness::new();
    harness.shutter.input_mut().pressed = true;

    let report = harness.tick();

    assert_eq!(
        report.button,
        Some(DebounceOutcome::Fired(Err(TriggerError::NoPeer)))
    );
    assert_eq!(report.reports_sent(), 0);
    assert!(harness.link().reports.is_empty());
}

#[test]
fn volume_up_key_is_configurable() {
    let mut harness = Harness::with_config(ShutterConfig {
        key: ConsumerKey::VolumeUp,
        hold_policy: HoldPolicy::Latch,
        ..ShutterConfig::default()
    });
    harness.set_peers(1);
    harness.tick();

    harness.command("shoot");

    assert_eq!(harness.link().reports[0].1.usage(), 0x00E9);
}
