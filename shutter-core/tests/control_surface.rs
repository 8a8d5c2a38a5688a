mod support;

use shutter_core::control::{ControlRequest, Inbound};
use shutter_core::scheduler::TaskMode;

use support::Harness;

#[test]
fn status_reflects_task_and_link() {
    let mut harness = Harness::new();
    assert_eq!(
        harness.command("status").to_string(),
        "OK task=idle peers=0 advertising"
    );

    harness.set_peers(1);
    harness.tick();
    harness.clock.set_secs(0);
    harness.command("shoot every 5");
    harness.clock.set_secs(2);

    assert_eq!(
        harness.command("status").message(),
        "task=repeating interval=5s next=+3.0s peers=1 connected"
    );
}

#[test]
fn help_lists_and_describes_commands() {
    let mut harness = Harness::new();

    assert_eq!(
        harness.command("help").message(),
        "commands: shoot cancel status help (help <command> for details)"
    );
    assert_eq!(
        harness.command("help shoot").message(),
        "shoot [now | after <secs> | every <secs>]: fire the shutter now, once after a delay, or repeatedly"
    );

    let unknown = harness.command("help focus");
    assert!(!unknown.is_success());
    assert_eq!(
        unknown.message(),
        "unknown help topic 'focus'; topics: shoot cancel status help"
    );
}

#[test]
fn malformed_lines_are_parse_errors() {
    let mut harness = Harness::new();

    for line in ["shoot later", "shoot every", "zoom", "shoot after 5 6"] {
        let reply = harness.command(line);
        assert!(!reply.is_success(), "{line}");
        assert!(reply.message().starts_with("parse error: "), "{line}");
    }
    assert_eq!(harness.shutter.scheduler().task().mode(), TaskMode::None);
}

#[test]
fn typed_requests_bypass_the_grammar() {
    let mut harness = Harness::new();
    harness
        .transport
        .inbox
        .push_back(Inbound::Request(ControlRequest::ArmDelayed { seconds: 9 }));

    let report = harness.tick();

    assert_eq!(report.request, Some(ControlRequest::ArmDelayed { seconds: 9 }));
    assert_eq!(harness.transport.replies[0].message(), "shooting in 9s");
    assert_eq!(harness.shutter.scheduler().task().mode(), TaskMode::OneShot);
}

#[test]
fn one_request_per_tick() {
    let mut harness = Harness::new();
    harness.transport.line("status");
    harness.transport.line("cancel");

    harness.tick();
    assert_eq!(harness.transport.replies.len(), 1);
    harness.tick();
    assert_eq!(harness.transport.replies.len(), 2);
    assert_eq!(harness.transport.replies[1].message(), "nothing armed");
}
