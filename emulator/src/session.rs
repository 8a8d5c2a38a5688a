use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use shutter_core::connection::{ConnectionEdge, PeerLink};
use shutter_core::control::{CommandLine, ControlTransport, Inbound, MAX_LINE_LEN, Reply};
use shutter_core::debounce::{DebounceOutcome, TriggerInput};
use shutter_core::hid::ConsumerReport;
use shutter_core::indicator::{Indicator, Rgb};
use shutter_core::orchestrator::{ShutterConfig, ShutterOrchestrator};
use shutter_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord};
use shutter_core::timing::MonotonicInstant;
use shutter_core::trigger::TriggerError;

/// Virtual time between ticks unless `--tick-ms` overrides it.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const DEFAULT_TRANSCRIPT: &str = "transcripts/emulator.log";
/// Longest span a single `:advance` may cover (one day).
pub const MAX_ADVANCE_SECS: u64 = 86_400;

pub const META_HELP: &[(&str, &str)] = &[
    (":connect", "a peer connects (repeat for more peers)"),
    (":disconnect", "every peer drops"),
    (":press", "hold the trigger button"),
    (":release", "release the trigger button"),
    (":advance <secs>", "run ticks for <secs> of virtual time"),
    (":log", "print telemetry recorded since the last :log"),
    (":help", "show this list"),
];

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub transcript: PathBuf,
    pub tick: Duration,
    pub shutter: ShutterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transcript: PathBuf::from(DEFAULT_TRANSCRIPT),
            tick: DEFAULT_TICK,
            shutter: ShutterConfig::default(),
        }
    }
}

/// Instant on the emulator's virtual timeline, measured from boot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualInstant(Duration);

impl VirtualInstant {
    pub fn since_boot(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl MonotonicInstant for VirtualInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

#[derive(Clone, Debug, Default)]
struct VirtualClock(Rc<Cell<Duration>>);

impl VirtualClock {
    fn now(&self) -> VirtualInstant {
        VirtualInstant(self.0.get())
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    fn advance_to(&self, at: VirtualInstant) {
        if at.0 > self.0.get() {
            self.0.set(at.0);
        }
    }
}

struct VirtualDelay(VirtualClock);

impl DelayNs for VirtualDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(Duration::from_nanos(u64::from(ns)));
    }
}

#[derive(Copy, Clone, Debug)]
enum SimEvent {
    Pulse { color: Rgb, duration: Duration },
    Report(ConsumerReport),
    DiscoveryRestart,
}

type EventLog = Rc<RefCell<Vec<(VirtualInstant, SimEvent)>>>;

struct SimLed {
    clock: VirtualClock,
    events: EventLog,
}

impl Indicator for SimLed {
    fn pulse(&mut self, color: Rgb, duration: Duration) {
        self.events
            .borrow_mut()
            .push((self.clock.now(), SimEvent::Pulse { color, duration }));
        self.clock.advance(duration);
    }
}

struct SimLink {
    clock: VirtualClock,
    peers: Rc<Cell<usize>>,
    events: EventLog,
}

impl PeerLink for SimLink {
    fn connected_peer_count(&self) -> usize {
        self.peers.get()
    }

    fn send_report(&mut self, report: ConsumerReport) {
        self.events
            .borrow_mut()
            .push((self.clock.now(), SimEvent::Report(report)));
    }

    fn restart_discovery(&mut self) {
        self.events
            .borrow_mut()
            .push((self.clock.now(), SimEvent::DiscoveryRestart));
    }
}

struct SimButton(Rc<Cell<bool>>);

impl TriggerInput for SimButton {
    fn is_asserted(&mut self) -> bool {
        self.0.get()
    }
}

#[derive(Default)]
struct LineTransport {
    inbox: VecDeque<Inbound>,
    replies: Vec<Reply>,
}

impl ControlTransport for LineTransport {
    fn poll(&mut self) -> Option<Inbound> {
        self.inbox.pop_front()
    }

    fn reply(&mut self, reply: Reply) {
        self.replies.push(reply);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputKind {
    Reply { ok: bool },
    Pulse(Rgb),
    Report,
    Link,
    Telemetry,
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct Output {
    pub kind: OutputKind,
    pub text: String,
}

impl Output {
    fn new(kind: OutputKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

type Shutter = ShutterOrchestrator<VirtualInstant, SimLink, SimLed, VirtualDelay, SimButton>;

pub struct Session {
    shutter: Shutter,
    clock: VirtualClock,
    peers: Rc<Cell<usize>>,
    button: Rc<Cell<bool>>,
    events: EventLog,
    transport: LineTransport,
    transcript: TranscriptLogger,
    tick: Duration,
    telemetry_cursor: Option<EventId>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> io::Result<Self> {
        let clock = VirtualClock::default();
        let peers = Rc::new(Cell::new(0));
        let button = Rc::new(Cell::new(false));
        let events = EventLog::default();

        let shutter = ShutterOrchestrator::new(
            config.shutter,
            SimLink {
                clock: clock.clone(),
                peers: Rc::clone(&peers),
                events: Rc::clone(&events),
            },
            SimLed {
                clock: clock.clone(),
                events: Rc::clone(&events),
            },
            VirtualDelay(clock.clone()),
            SimButton(Rc::clone(&button)),
        );

        Ok(Self {
            shutter,
            clock,
            peers,
            button,
            events,
            transport: LineTransport::default(),
            transcript: TranscriptLogger::new(&config.transcript)?,
            tick: config.tick,
            telemetry_cursor: None,
        })
    }

    /// Plays the boot self-test.
    pub fn boot(&mut self) -> io::Result<Vec<Output>> {
        let at = self.clock.now();
        self.shutter.start(at);
        let mut outputs = vec![Output::new(
            OutputKind::Info,
            format!(
                "booted key={} brightness={}",
                self.shutter.config().key,
                self.shutter.config().brightness
            ),
        )];
        outputs.extend(self.drain_events());
        self.record_output(at, &outputs)?;
        Ok(outputs)
    }

    pub fn handle_line(&mut self, line: &str) -> io::Result<Vec<Output>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let at = self.clock.now();
        self.transcript.append_line(at, TranscriptRole::Host, trimmed)?;

        let outputs = match trimmed.strip_prefix(':') {
            Some(meta) => self.handle_meta(meta),
            None => self.handle_console(trimmed),
        };

        self.record_output(at, &outputs)?;
        Ok(outputs)
    }

    fn handle_console(&mut self, line: &str) -> Vec<Output> {
        match CommandLine::try_from(line) {
            Ok(line) => {
                self.transport.inbox.push_back(Inbound::Line(line));
                self.tick_once()
            }
            Err(_) => vec![Output::new(
                OutputKind::Error,
                format!("ERR line exceeds {MAX_LINE_LEN} bytes"),
            )],
        }
    }

    fn handle_meta(&mut self, meta: &str) -> Vec<Output> {
        let mut words = meta.split_whitespace();
        let name = words.next().unwrap_or_default();
        let argument = words.next();

        match name.to_ascii_lowercase().as_str() {
            "connect" => {
                self.peers.set(self.peers.get() + 1);
                self.tick_once()
            }
            "disconnect" => {
                self.peers.set(0);
                self.tick_once()
            }
            "press" => {
                self.button.set(true);
                self.tick_once()
            }
            "release" => {
                self.button.set(false);
                self.tick_once()
            }
            "advance" => match argument.map(str::parse::<u64>) {
                Some(Ok(secs)) if secs <= MAX_ADVANCE_SECS => {
                    self.run_for(Duration::from_secs(secs))
                }
                Some(Ok(_)) => vec![Output::new(
                    OutputKind::Error,
                    format!("ERR :advance is limited to {MAX_ADVANCE_SECS} seconds"),
                )],
                _ => vec![Output::new(
                    OutputKind::Error,
                    "ERR :advance expects whole seconds, e.g. `:advance 5`",
                )],
            },
            "log" => self.drain_telemetry(),
            "help" => META_HELP
                .iter()
                .map(|(usage, summary)| {
                    Output::new(OutputKind::Info, format!("{usage:<16} {summary}"))
                })
                .collect(),
            other => vec![Output::new(
                OutputKind::Error,
                format!("ERR unknown emulator command `:{other}` (try :help)"),
            )],
        }
    }

    /// Ticks at the configured cadence until `span` of virtual time has passed.
    pub fn run_for(&mut self, span: Duration) -> Vec<Output> {
        let deadline = self.clock.now() + span;
        let mut outputs = Vec::new();
        while self.clock.now() < deadline {
            outputs.extend(self.tick_once());
        }
        outputs
    }

    fn tick_once(&mut self) -> Vec<Output> {
        let now = self.clock.now();
        let report = self.shutter.tick(now, &mut self.transport);

        let mut outputs = Vec::new();
        match report.edge {
            Some(ConnectionEdge::Connected { peers }) => {
                outputs.push(Output::new(
                    OutputKind::Link,
                    format!("{} link up peers={peers}", stamp(now)),
                ));
            }
            Some(ConnectionEdge::Disconnected) => {
                outputs.push(Output::new(
                    OutputKind::Link,
                    format!("{} link down", stamp(now)),
                ));
            }
            None => {}
        }
        if let Some(fire) = report.scheduled {
            outputs.push(Output::new(
                OutputKind::Info,
                format!(
                    "{} {} task fired: {}",
                    stamp(now),
                    fire.mode,
                    describe_result(fire.result)
                ),
            ));
        }
        if let Some(DebounceOutcome::Fired(result)) = report.button {
            outputs.push(Output::new(
                OutputKind::Info,
                format!("{} button fired: {}", stamp(now), describe_result(result)),
            ));
        }
        outputs.extend(self.drain_events());
        outputs.extend(self.transport.replies.drain(..).map(|reply| {
            Output::new(
                OutputKind::Reply {
                    ok: reply.is_success(),
                },
                reply.to_string(),
            )
        }));

        self.clock.advance_to(now + self.tick);
        outputs
    }

    fn drain_events(&mut self) -> Vec<Output> {
        self.events
            .borrow_mut()
            .drain(..)
            .map(|(at, event)| match event {
                SimEvent::Pulse { color, duration } => Output::new(
                    OutputKind::Pulse(color),
                    format!(
                        "{} led {} {}ms",
                        stamp(at),
                        color_name(color),
                        duration.as_millis()
                    ),
                ),
                SimEvent::Report(report) if report.is_release() => {
                    Output::new(OutputKind::Report, format!("{} hid release", stamp(at)))
                }
                SimEvent::Report(report) => Output::new(
                    OutputKind::Report,
                    format!("{} hid press usage=0x{:04X}", stamp(at), report.usage()),
                ),
                SimEvent::DiscoveryRestart => Output::new(
                    OutputKind::Link,
                    format!("{} discovery restarted", stamp(at)),
                ),
            })
            .collect()
    }

    fn drain_telemetry(&mut self) -> Vec<Output> {
        let telemetry = self.shutter.telemetry();
        let outputs: Vec<Output> = telemetry
            .newer_than(self.telemetry_cursor)
            .map(|record| Output::new(OutputKind::Telemetry, describe_record(record)))
            .collect();
        if let Some(latest) = telemetry.latest() {
            self.telemetry_cursor = Some(latest.id);
        }
        if outputs.is_empty() {
            return vec![Output::new(OutputKind::Telemetry, "no new telemetry")];
        }
        outputs
    }

    fn record_output(&mut self, at: VirtualInstant, outputs: &[Output]) -> io::Result<()> {
        for output in outputs {
            self.transcript
                .append_line(at, TranscriptRole::Emulator, &output.text)?;
        }
        Ok(())
    }
}

fn stamp(at: VirtualInstant) -> String {
    format!("[{:>8.3}s]", at.since_boot().as_secs_f64())
}

fn describe_result(result: Result<(), TriggerError>) -> String {
    match result {
        Ok(()) => "sent".to_string(),
        Err(err) => err.to_string(),
    }
}

fn describe_record(record: &TelemetryRecord<VirtualInstant>) -> String {
    let mut line = format!(
        "#{:<3} {} {}",
        record.id,
        stamp(record.timestamp),
        record.event
    );
    match record.details {
        TelemetryPayload::Link(link) => {
            line.push_str(&format!(" peers={}", link.peers));
            if let Some(elapsed) = link.elapsed_since_previous {
                line.push_str(&format!(" since-last={}ms", elapsed.as_millis()));
            }
        }
        TelemetryPayload::Trigger(trigger) => {
            if let Some(elapsed) = trigger.elapsed_since_previous {
                line.push_str(&format!(" since-last={}ms", elapsed.as_millis()));
            }
        }
        TelemetryPayload::Schedule(schedule) => {
            if let Some(secs) = schedule.interval_secs {
                line.push_str(&format!(" interval={secs}s"));
            }
            if let Some(requested) = schedule.rejected {
                line.push_str(&format!(" requested={requested}"));
            }
        }
        TelemetryPayload::None => {}
    }
    line
}

pub fn color_name(color: Rgb) -> String {
    match color {
        Rgb::RED => "red".to_string(),
        Rgb::GREEN => "green".to_string(),
        Rgb::BLUE => "blue".to_string(),
        Rgb::WHITE => "white".to_string(),
        Rgb::OFF => "off".to_string(),
        Rgb { r, g, b } => format!("#{r:02x}{g:02x}{b:02x}"),
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Shutter remote emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since boot"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        at: VirtualInstant,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.since_boot().as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
