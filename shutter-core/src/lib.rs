#![no_std]

// Shared logic for the BLE shutter remote.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library; platforms plug in through the capability traits
// (`PeerLink`, `Indicator`, `TriggerInput`, `ControlTransport`) and a
// `MonotonicInstant`.

pub mod connection;
pub mod control;
pub mod debounce;
pub mod hid;
pub mod indicator;
pub mod orchestrator;
pub mod scheduler;
pub mod telemetry;
pub mod timing;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing {
    use core::cell::Cell;
    use core::ops::Add;
    use core::time::Duration;

    use embedded_hal::delay::DelayNs;
    use heapless::{Deque, Vec};

    use crate::connection::PeerLink;
    use crate::control::{CommandLine, ControlTransport, Inbound, Reply};
    use crate::debounce::TriggerInput;
    use crate::hid::ConsumerReport;
    use crate::indicator::{Indicator, IndicatorCommand, Rgb};
    use crate::timing::MonotonicInstant;
    use crate::trigger::{Trigger, TriggerError};

    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
    pub struct MockInstant(pub u64);

    impl MockInstant {
        pub const fn from_secs(secs: u64) -> Self {
            Self(secs * 1_000_000)
        }

        pub const fn from_millis(millis: u64) -> Self {
            Self(millis * 1_000)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            let micros = u64::try_from(rhs.as_micros()).expect("duration fits in u64");
            Self(self.0 + micros)
        }
    }

    impl MonotonicInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    /// Shared virtual clock advanced by the fake delay and indicator.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        nanos: Cell<u64>,
    }

    impl ManualClock {
        pub const fn new() -> Self {
            Self {
                nanos: Cell::new(0),
            }
        }

        pub fn now(&self) -> MockInstant {
            MockInstant(self.now_micros())
        }

        pub fn now_micros(&self) -> u64 {
            self.nanos.get() / 1_000
        }

        pub fn advance(&self, by: Duration) {
            let nanos = u64::try_from(by.as_nanos()).expect("duration fits in u64");
            self.nanos.set(self.nanos.get() + nanos);
        }
    }

    pub struct StepDelay<'a> {
        clock: &'a ManualClock,
    }

    impl<'a> StepDelay<'a> {
        pub const fn new(clock: &'a ManualClock) -> Self {
            Self { clock }
        }
    }

    impl DelayNs for StepDelay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            self.clock.advance(Duration::from_nanos(u64::from(ns)));
        }
    }

    pub struct RecordingIndicator<'a> {
        clock: &'a ManualClock,
        pulses: Vec<IndicatorCommand, 64>,
    }

    impl<'a> RecordingIndicator<'a> {
        pub const fn new(clock: &'a ManualClock) -> Self {
            Self {
                clock,
                pulses: Vec::new(),
            }
        }

        pub fn pulses(&self) -> &Vec<IndicatorCommand, 64> {
            &self.pulses
        }

        pub fn count_color(&self, color: Rgb) -> usize {
            self.pulses.iter().filter(|p| p.color == color).count()
        }

        pub fn clear(&mut self) {
            self.pulses.clear();
        }
    }

    impl Indicator for RecordingIndicator<'_> {
        fn pulse(&mut self, color: Rgb, duration: Duration) {
            self.pulses
                .push(IndicatorCommand::new(color, duration))
                .expect("pulse log capacity");
            self.clock.advance(duration);
        }
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SentReport {
        pub report: ConsumerReport,
        pub at_micros: u64,
    }

    pub struct FakeLink<'a> {
        clock: &'a ManualClock,
        peers: usize,
        reports: Vec<SentReport, 64>,
        restarts: usize,
        drops: u32,
    }

    impl<'a> FakeLink<'a> {
        pub const fn new(clock: &'a ManualClock) -> Self {
            Self {
                clock,
                peers: 0,
                reports: Vec::new(),
                restarts: 0,
                drops: 0,
            }
        }

        /// Counts a peer drop the way a link does before lowering its count.
        pub fn record_drop(&mut self) {
            self.drops = self.drops.wrapping_add(1);
        }

        pub fn set_peers(&mut self, peers: usize) {
            self.peers = peers;
        }

        pub fn reports(&self) -> &Vec<SentReport, 64> {
            &self.reports
        }

        pub fn restarts(&self) -> usize {
            self.restarts
        }
    }

    impl PeerLink for FakeLink<'_> {
        fn connected_peer_count(&self) -> usize {
            self.peers
        }

        fn send_report(&mut self, report: ConsumerReport) {
            self.reports
                .push(SentReport {
                    report,
                    at_micros: self.clock.now_micros(),
                })
                .expect("report log capacity");
        }

        fn restart_discovery(&mut self) {
            self.restarts += 1;
        }

        fn disconnect_count(&self) -> u32 {
            self.drops
        }
    }

    /// Input whose level is set by the test, optionally releasing itself
    /// after a number of asserted reads.
    #[derive(Debug, Default)]
    pub struct FakeInput {
        asserted: bool,
        release_after: Option<usize>,
        reads: usize,
    }

    impl FakeInput {
        pub const fn new() -> Self {
            Self {
                asserted: false,
                release_after: None,
                reads: 0,
            }
        }

        pub const fn releasing_after(mut self, reads: usize) -> Self {
            self.release_after = Some(reads);
            self
        }

        pub fn set(&mut self, asserted: bool) {
            self.asserted = asserted;
            self.reads = 0;
        }
    }

    impl TriggerInput for FakeInput {
        fn is_asserted(&mut self) -> bool {
            if self.asserted {
                self.reads += 1;
                if self.release_after.is_some_and(|limit| self.reads > limit) {
                    self.asserted = false;
                }
            }
            self.asserted
        }
    }

    #[derive(Debug)]
    pub struct CountingTrigger {
        fires: usize,
        result: Result<(), TriggerError>,
    }

    impl CountingTrigger {
        pub const fn new() -> Self {
            Self {
                fires: 0,
                result: Ok(()),
            }
        }

        pub const fn failing(error: TriggerError) -> Self {
            Self {
                fires: 0,
                result: Err(error),
            }
        }

        pub fn fires(&self) -> usize {
            self.fires
        }
    }

    impl Trigger for CountingTrigger {
        fn fire(&mut self) -> Result<(), TriggerError> {
            self.fires += 1;
            self.result
        }
    }

    /// Transport fed from a queue, recording every reply.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        inbox: Deque<Inbound, 8>,
        replies: Vec<Reply, 8>,
    }

    impl ScriptedTransport {
        pub const fn new() -> Self {
            Self {
                inbox: Deque::new(),
                replies: Vec::new(),
            }
        }

        pub fn push(&mut self, inbound: Inbound) {
            self.inbox.push_back(inbound).expect("inbox capacity");
        }

        pub fn push_line(&mut self, line: &str) {
            let line = CommandLine::try_from(line).expect("line fits");
            self.push(Inbound::Line(line));
        }

        pub fn replies(&self) -> &Vec<Reply, 8> {
            &self.replies
        }
    }

    impl ControlTransport for ScriptedTransport {
        fn poll(&mut self) -> Option<Inbound> {
            self.inbox.pop_front()
        }

        fn reply(&mut self, reply: Reply) {
            self.replies.push(reply).expect("reply log capacity");
        }
    }
}
