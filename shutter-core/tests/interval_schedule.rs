mod support;

use shutter_core::scheduler::TaskMode;
use shutter_core::telemetry::TelemetryEventKind;
use shutter_core::trigger::TriggerSource;

use support::Harness;

const REPEATING_SENT: TelemetryEventKind = TelemetryEventKind::TriggerSent(TriggerSource::Repeating);

fn connected_harness() -> Harness {
    let mut harness = Harness::new();
    harness.set_peers(1);
    harness.tick();
    harness
}

#[test]
fn repeating_five_seconds_fires_on_cadence() {
    let mut harness = connected_harness();
    harness.clock.set_secs(0);
    assert!(harness.command("shoot every 5").is_success());

    harness.run_until_secs(1, 15);

    assert_eq!(harness.fire_seconds(REPEATING_SENT), vec![5, 10, 15]);
    assert_eq!(harness.link().reports.len(), 6);
}

#[test]
fn stalled_loop_fires_once_then_rebases() {
    let mut harness = connected_harness();
    harness.clock.set_secs(0);
    harness.command("shoot every interval=5");

    harness.run_until_secs(1, 4);
    // Nothing ticks between t=4 and t=16.
    harness.run_until_secs(16, 21);

    assert_eq!(harness.fire_seconds(REPEATING_SENT), vec![16, 21]);
}

#[test]
fn delayed_shot_fires_exactly_once() {
    let mut harness = connected_harness();
    harness.clock.set_secs(10);
    let reply = harness.command("shoot after 3s");
    assert_eq!(reply.message(), "shooting in 3s");

    harness.run_until_secs(11, 30);

    assert_eq!(
        harness.fire_seconds(TelemetryEventKind::TriggerSent(TriggerSource::Delayed)),
        vec![13]
    );
    assert_eq!(harness.shutter.scheduler().task().mode(), TaskMode::None);
}

#[test]
fn cancel_stops_repeating_task() {
    let mut harness = connected_harness();
    harness.clock.set_secs(0);
    harness.command("shoot every 2");
    harness.run_until_secs(1, 4);

    harness.clock.set_secs(5);
    assert_eq!(harness.command("cancel").message(), "canceled repeating task");
    harness.run_until_secs(6, 20);

    assert_eq!(harness.fire_seconds(REPEATING_SENT), vec![2, 4]);
}

#[test]
fn rejected_intervals_leave_task_untouched() {
    let mut harness = connected_harness();
    harness.clock.set_secs(0);
    harness.command("shoot every 5");

    let zero = harness.command("shoot after 0");
    let negative = harness.command("shoot every -1");

    assert!(!zero.is_success());
    assert_eq!(negative.message(), "invalid interval value: '-1'");
    let task = harness.shutter.scheduler().task();
    assert_eq!(task.mode(), TaskMode::Repeating);
    assert_eq!(task.interval().map(|interval| interval.get()), Some(5));
}

#[test]
fn latest_arm_wins() {
    let mut harness = connected_harness();
    harness.clock.set_secs(0);
    harness.command("shoot every 2");
    harness.command("shoot after 7");
    harness.command("shoot every 4");
    harness.command("cancel");
    harness.command("shoot after 1");

    assert_eq!(harness.shutter.scheduler().task().mode(), TaskMode::OneShot);
    harness.run_until_secs(1, 12);
    assert_eq!(
        harness.fire_seconds(TelemetryEventKind::TriggerSent(TriggerSource::Delayed)),
        vec![1]
    );
    assert!(harness.fire_seconds(REPEATING_SENT).is_empty());
}
