#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::ops::Add;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use shutter_core::connection::PeerLink;
use shutter_core::control::{CommandLine, ControlTransport, Inbound, Reply};
use shutter_core::debounce::TriggerInput;
use shutter_core::hid::ConsumerReport;
use shutter_core::indicator::{Indicator, Rgb};
use shutter_core::orchestrator::{ShutterConfig, ShutterOrchestrator};
use shutter_core::telemetry::TelemetryEventKind;
use shutter_core::timing::MonotonicInstant;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(pub u64);

impl SimInstant {
    pub fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + u64::try_from(rhs.as_micros()).expect("duration fits"))
    }
}

impl MonotonicInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Virtual microsecond clock shared by every fake.
#[derive(Clone, Debug, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now(&self) -> SimInstant {
        SimInstant(self.0.get())
    }

    pub fn advance(&self, by: Duration) {
        self.0
            .set(self.0.get() + u64::try_from(by.as_micros()).expect("duration fits"));
    }

    /// Jumps to `secs`. Pulses played during a tick may leave the clock past
    /// the second that tick started on; the jump discards that.
    pub fn set_secs(&self, secs: u64) {
        self.0.set(secs * 1_000_000);
    }
}

pub struct SimDelay(pub Clock);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(Duration::from_nanos(u64::from(ns)));
    }
}

pub struct SimLed {
    clock: Clock,
    pub pulses: Vec<(Rgb, Duration)>,
}

impl SimLed {
    pub fn count(&self, color: Rgb) -> usize {
        self.pulses.iter().filter(|(c, _)| *c == color).count()
    }
}

impl Indicator for SimLed {
    fn pulse(&mut self, color: Rgb, duration: Duration) {
        self.pulses.push((color, duration));
        self.clock.advance(duration);
    }
}

pub struct SimLink {
    clock: Clock,
    pub peers: usize,
    pub reports: Vec<(SimInstant, ConsumerReport)>,
    pub restarts: usize,
}

impl PeerLink for SimLink {
    fn connected_peer_count(&self) -> usize {
        self.peers
    }

    fn send_report(&mut self, report: ConsumerReport) {
        self.reports.push((self.clock.now(), report));
    }

    fn restart_discovery(&mut self) {
        self.restarts += 1;
    }
}

#[derive(Default)]
pub struct SimButton {
    pub pressed: bool,
    /// Reads left before a held button lets go by itself.
    pub reads_until_release: Option<usize>,
}

impl TriggerInput for SimButton {
    fn is_asserted(&mut self) -> bool {
        if self.pressed {
            match self.reads_until_release {
                Some(0) => {
                    self.pressed = false;
                    self.reads_until_release = None;
                }
                Some(left) => self.reads_until_release = Some(left - 1),
                None => {}
            }
        }
        self.pressed
    }
}

#[derive(Default)]
pub struct QueueTransport {
    pub inbox: VecDeque<Inbound>,
    pub replies: Vec<Reply>,
}

impl QueueTransport {
    pub fn line(&mut self, line: &str) {
        let line = CommandLine::try_from(line).expect("line fits");
        self.inbox.push_back(Inbound::Line(line));
    }
}

impl ControlTransport for QueueTransport {
    fn poll(&mut self) -> Option<Inbound> {
        self.inbox.pop_front()
    }

    fn reply(&mut self, reply: Reply) {
        self.replies.push(reply);
    }
}

pub type Shutter = ShutterOrchestrator<SimInstant, SimLink, SimLed, SimDelay, SimButton>;

pub struct Harness {
    pub clock: Clock,
    pub shutter: Shutter,
    pub transport: QueueTransport,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ShutterConfig::default())
    }

    pub fn with_config(config: ShutterConfig) -> Self {
        let clock = Clock::default();
        let shutter = ShutterOrchestrator::new(
            config,
            SimLink {
                clock: clock.clone(),
                peers: 0,
                reports: Vec::new(),
                restarts: 0,
            },
            SimLed {
                clock: clock.clone(),
                pulses: Vec::new(),
            },
            SimDelay(clock.clone()),
            SimButton::default(),
        );
        Self {
            clock,
            shutter,
            transport: QueueTransport::default(),
        }
    }

    pub fn set_peers(&mut self, peers: usize) {
        self.shutter.link_mut().peers = peers;
    }

    pub fn tick(&mut self) -> shutter_core::orchestrator::TickReport {
        let now = self.clock.now();
        self.shutter.tick(now, &mut self.transport)
    }

    /// Ticks once per second from the current second up to and including `until`.
    pub fn run_until_secs(&mut self, from: u64, until: u64) {
        for second in from..=until {
            self.clock.set_secs(second);
            self.tick();
        }
    }

    /// Send `line`, tick once, and return the reply.
    pub fn command(&mut self, line: &str) -> Reply {
        self.transport.line(line);
        self.tick();
        self.transport.replies.pop().expect("reply sent")
    }

    pub fn led(&self) -> &SimLed {
        self.shutter.indicator()
    }

    pub fn link(&self) -> &SimLink {
        self.shutter.link()
    }

    /// Whole-second timestamps of trigger attempts matching `event`.
    pub fn fire_seconds(&self, event: TelemetryEventKind) -> Vec<u64> {
        self.shutter
            .telemetry()
            .oldest_first()
            .filter(|record| record.event == event)
            .map(|record| record.timestamp.0 / 1_000_000)
            .collect()
    }
}
