//! Single-threaded coordinator shared by the firmware and the emulator.
//!
//! [`ShutterOrchestrator`] owns every component and its collaborators and
//! runs them in a fixed order on each tick:
//!
//! 1. connection monitor,
//! 2. control surface (at most one inbound request per tick),
//! 3. interval scheduler,
//! 4. input debouncer.
//!
//! All waits inside a tick are blocking delays; the caller decides how often
//! to tick and supplies the current instant.

use embedded_hal::delay::DelayNs;

use crate::connection::{ConnectionEdge, ConnectionMonitor, ConnectionState, PeerLink};
use crate::control::{
    ControlAck, ControlError, ControlOutcome, ControlRequest, ControlSurface, ControlTransport,
    Reply,
};
use crate::debounce::{DebounceOutcome, HoldPolicy, InputDebouncer, TriggerInput};
use crate::hid::ConsumerKey;
use crate::indicator::{DEFAULT_BRIGHTNESS, FeedbackEvent, Indicator, IndicatorSignal};
use crate::scheduler::{IntervalScheduler, ScheduledFire, TaskMode};
use crate::telemetry::TelemetryRecorder;
use crate::timing::MonotonicInstant;
use crate::trigger::{TriggerActuator, TriggerError, TriggerSource};

/// Runtime configuration chosen at start-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShutterConfig {
    /// Consumer key sent on every fire.
    pub key: ConsumerKey,
    pub hold_policy: HoldPolicy,
    /// Global indicator brightness applied by LED drivers (0-255).
    pub brightness: u8,
}

impl Default for ShutterConfig {
    fn default() -> Self {
        Self {
            key: ConsumerKey::default(),
            hold_policy: HoldPolicy::default(),
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OrchestratorState {
    /// Constructed, self-test not yet played.
    Booting,
    Running,
}

/// Everything a single tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub edge: Option<ConnectionEdge>,
    pub request: Option<ControlRequest>,
    pub reply: Option<Reply>,
    pub scheduled: Option<ScheduledFire>,
    pub button: Option<DebounceOutcome>,
}

impl TickReport {
    /// Number of press/release pairs that reached a peer during the tick.
    #[must_use]
    pub fn reports_sent(&self) -> usize {
        let control = matches!(
            (self.request, self.reply.as_ref()),
            (Some(ControlRequest::FireNow), Some(reply)) if reply.is_success()
        );
        let scheduled = self.scheduled.is_some_and(|fire| fire.result.is_ok());
        let button = matches!(self.button, Some(DebounceOutcome::Fired(Ok(()))));
        usize::from(control) + usize::from(scheduled) + usize::from(button)
    }
}

pub struct ShutterOrchestrator<I, L, S, D, In>
where
    I: MonotonicInstant,
{
    config: ShutterConfig,
    state: OrchestratorState,
    link: L,
    signal: IndicatorSignal<S>,
    delay: D,
    input: In,
    monitor: ConnectionMonitor,
    actuator: TriggerActuator,
    scheduler: IntervalScheduler<I>,
    debouncer: InputDebouncer,
    telemetry: TelemetryRecorder<I>,
}

impl<I, L, S, D, In> ShutterOrchestrator<I, L, S, D, In>
where
    I: MonotonicInstant,
    L: PeerLink,
    S: Indicator,
    D: DelayNs,
    In: TriggerInput,
{
    pub fn new(config: ShutterConfig, link: L, indicator: S, delay: D, input: In) -> Self {
        Self {
            config,
            state: OrchestratorState::Booting,
            link,
            signal: IndicatorSignal::new(indicator),
            delay,
            input,
            monitor: ConnectionMonitor::new(),
            actuator: TriggerActuator::new(config.key),
            scheduler: IntervalScheduler::new(),
            debouncer: InputDebouncer::new(config.hold_policy),
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Plays the boot self-test and marks the orchestrator running.
    pub fn start(&mut self, now: I) {
        self.signal.signal(FeedbackEvent::SelfTest, &mut self.delay);
        self.telemetry.record_boot(now);
        self.state = OrchestratorState::Running;
    }

    /// Runs one pass of every component.
    pub fn tick<C>(&mut self, now: I, transport: &mut C) -> TickReport
    where
        C: ControlTransport,
    {
        let mut report = TickReport {
            edge: self
                .monitor
                .tick(&mut self.link, &mut self.signal, &mut self.delay),
            ..TickReport::default()
        };

        match report.edge {
            Some(edge @ ConnectionEdge::Connected { .. }) => {
                self.telemetry.record_connection_edge(edge, now);
            }
            Some(edge @ ConnectionEdge::Disconnected) => {
                self.telemetry.record_connection_edge(edge, now);
                self.telemetry.record_discovery_restart(now);
            }
            None => {}
        }

        if let Some(inbound) = transport.poll() {
            let mut trigger = self
                .actuator
                .bind(&mut self.link, &mut self.signal, &mut self.delay);
            let outcome = ControlSurface::new(&mut self.scheduler, &mut trigger, self.monitor.state())
                .respond(&inbound, now);
            record_control(&mut self.telemetry, &outcome, now);

            let reply = outcome.reply();
            report.request = outcome.request;
            transport.reply(reply.clone());
            report.reply = Some(reply);
        }

        report.scheduled = {
            let mut trigger = self
                .actuator
                .bind(&mut self.link, &mut self.signal, &mut self.delay);
            self.scheduler.tick(now, &mut trigger)
        };
        if let Some(fire) = report.scheduled {
            let source = match fire.mode {
                TaskMode::Repeating => TriggerSource::Repeating,
                TaskMode::OneShot | TaskMode::None => TriggerSource::Delayed,
            };
            self.telemetry.record_trigger(source, fire.result, now);
        }

        report.button = {
            let mut trigger = self
                .actuator
                .bind(&mut self.link, &mut self.signal, &mut self.delay);
            self.debouncer.tick(&mut self.input, &mut trigger)
        };
        if let Some(DebounceOutcome::Fired(result)) = report.button {
            self.telemetry
                .record_trigger(TriggerSource::Button, result, now);
        }

        report
    }

    #[must_use]
    pub const fn config(&self) -> &ShutterConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionState {
        self.monitor.state()
    }

    #[must_use]
    pub const fn scheduler(&self) -> &IntervalScheduler<I> {
        &self.scheduler
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }

    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    #[must_use]
    pub fn indicator(&self) -> &S {
        self.signal.indicator()
    }

    pub fn input_mut(&mut self) -> &mut In {
        &mut self.input
    }
}

fn record_control<I: MonotonicInstant>(
    telemetry: &mut TelemetryRecorder<I>,
    outcome: &ControlOutcome<'_>,
    now: I,
) {
    match (outcome.request, &outcome.result) {
        (Some(ControlRequest::FireNow), Ok(_)) => {
            telemetry.record_trigger(TriggerSource::Control, Ok(()), now);
        }
        (Some(ControlRequest::FireNow), Err(ControlError::NoPeer)) => {
            telemetry.record_trigger(TriggerSource::Control, Err(TriggerError::NoPeer), now);
        }
        (_, Ok(ControlAck::Armed { mode, interval })) => {
            telemetry.record_armed(*mode, *interval, now);
        }
        (_, Ok(ControlAck::Canceled(mode))) if mode.is_armed() => {
            telemetry.record_canceled(*mode, now);
        }
        (_, Err(ControlError::InvalidInterval { requested })) => {
            telemetry.record_rejected(*requested, now);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Inbound, NoTransport};
    use crate::indicator::Rgb;
    use crate::telemetry::TelemetryEventKind;
    use crate::testing::{
        FakeInput, FakeLink, ManualClock, MockInstant, RecordingIndicator, ScriptedTransport,
        StepDelay,
    };

    type Rig<'a> = ShutterOrchestrator<
        MockInstant,
        FakeLink<'a>,
        RecordingIndicator<'a>,
        StepDelay<'a>,
        FakeInput,
    >;

    fn rig(clock: &ManualClock) -> Rig<'_> {
        ShutterOrchestrator::new(
            ShutterConfig::default(),
            FakeLink::new(clock),
            RecordingIndicator::new(clock),
            StepDelay::new(clock),
            FakeInput::new(),
        )
    }

    fn events(orchestrator: &Rig<'_>) -> heapless::Vec<TelemetryEventKind, 16> {
        orchestrator
            .telemetry()
            .oldest_first()
            .map(|record| record.event)
            .collect()
    }

    #[test]
    fn start_plays_self_test_and_records_boot() {
        let clock = ManualClock::new();
        let mut orchestrator = rig(&clock);
        assert_eq!(orchestrator.state(), OrchestratorState::Booting);

        orchestrator.start(clock.now());

        let colors: heapless::Vec<Rgb, 4> = orchestrator
            .indicator()
            .pulses()
            .iter()
            .map(|pulse| pulse.color)
            .collect();
        assert_eq!(colors.as_slice(), &[Rgb::RED, Rgb::GREEN, Rgb::BLUE]);
        assert_eq!(events(&orchestrator).as_slice(), &[TelemetryEventKind::Booted]);
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
    }

    #[test]
    fn components_run_in_fixed_order() {
        let clock = ManualClock::new();
        let mut orchestrator = rig(&clock);
        let mut transport = ScriptedTransport::new();

        // Arm a repeating task due at t=1s, then line everything up for one tick.
        transport.push(Inbound::Request(ControlRequest::ArmRepeating { seconds: 1 }));
        orchestrator.tick(MockInstant(0), &mut transport);

        orchestrator.link_mut().set_peers(1);
        transport.push(Inbound::Request(ControlRequest::FireNow));
        orchestrator.input_mut().set(true);
        let report = orchestrator.tick(MockInstant::from_secs(1), &mut transport);

        assert_eq!(report.edge, Some(ConnectionEdge::Connected { peers: 1 }));
        assert_eq!(report.reports_sent(), 3);
        assert_eq!(
            events(&orchestrator).as_slice(),
            &[
                TelemetryEventKind::TaskArmed(TaskMode::Repeating),
                TelemetryEventKind::PeerConnected,
                TelemetryEventKind::TriggerSent(TriggerSource::Control),
                TelemetryEventKind::TriggerSent(TriggerSource::Repeating),
                TelemetryEventKind::TriggerSent(TriggerSource::Button),
            ]
        );
        assert_eq!(orchestrator.link().reports().len(), 6);
    }

    #[test]
    fn disconnect_records_discovery_restart() {
        let clock = ManualClock::new();
        let mut orchestrator = rig(&clock);
        orchestrator.link_mut().set_peers(1);
        orchestrator.tick(clock.now(), &mut NoTransport);
        orchestrator.link_mut().set_peers(0);
        orchestrator.tick(clock.now(), &mut NoTransport);

        assert_eq!(orchestrator.link().restarts(), 1);
        assert_eq!(
            events(&orchestrator).as_slice(),
            &[
                TelemetryEventKind::PeerConnected,
                TelemetryEventKind::PeerDisconnected,
                TelemetryEventKind::DiscoveryRestarted,
            ]
        );
    }

    #[test]
    fn control_replies_reach_the_transport() {
        let clock = ManualClock::new();
        let mut orchestrator = rig(&clock);
        let mut transport = ScriptedTransport::new();

        transport.push_line("shoot every 0");
        transport.push_line("shoot");
        transport.push_line("cancel");
        for _ in 0..3 {
            orchestrator.tick(clock.now(), &mut transport);
        }

        let messages: heapless::Vec<&str, 4> =
            transport.replies().iter().map(Reply::message).collect();
        assert_eq!(
            messages.as_slice(),
            &["invalid interval value: '0'", "no peer connected", "nothing armed"]
        );
        assert_eq!(
            events(&orchestrator).as_slice(),
            &[
                TelemetryEventKind::IntervalRejected,
                TelemetryEventKind::TriggerNoPeer(TriggerSource::Control),
            ]
        );
        assert!(orchestrator.link().reports().is_empty());
    }

    #[test]
    fn config_selects_key_and_hold_policy() {
        let clock = ManualClock::new();
        let config = ShutterConfig {
            key: ConsumerKey::VolumeUp,
            hold_policy: HoldPolicy::BlockUntilRelease,
            ..ShutterConfig::default()
        };
        let mut orchestrator = ShutterOrchestrator::new(
            config,
            FakeLink::new(&clock),
            RecordingIndicator::new(&clock),
            StepDelay::new(&clock),
            FakeInput::new().releasing_after(5),
        );
        orchestrator.link_mut().set_peers(1);
        orchestrator.input_mut().set(true);

        let report = orchestrator.tick(clock.now(), &mut NoTransport);

        assert_eq!(report.button, Some(DebounceOutcome::Fired(Ok(()))));
        assert_eq!(
            orchestrator.link().reports()[0].report.usage(),
            ConsumerKey::VolumeUp.usage()
        );
        assert_eq!(orchestrator.config().brightness, DEFAULT_BRIGHTNESS);
    }
}
