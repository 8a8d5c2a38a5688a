//! Remote control surface.
//!
//! [`ControlSurface`] is a short-lived view over the scheduler, the trigger,
//! and the observed connection state. Requests arrive typed
//! ([`ControlRequest`]) or as console lines parsed by [`grammar`]; every
//! outcome renders into a [`Reply`] with a success flag and a short message.

pub mod catalog;
pub mod grammar;
pub mod status;

use core::fmt::{self, Write as _};

use heapless::String;

use crate::connection::ConnectionState;
use crate::scheduler::{IntervalScheduler, IntervalSecs, ScheduleError, TaskMode};
use crate::timing::MonotonicInstant;
use crate::trigger::{Trigger, TriggerError};

use self::catalog::CommandTag;
use self::grammar::{Command, ParseError, ShootCommand};
use self::status::{StatusFormatter, StatusSnapshot};

/// Longest console line accepted from a transport.
pub const MAX_LINE_LEN: usize = 64;
/// Capacity of a reply message; longer messages are truncated.
pub const REPLY_CAPACITY: usize = 192;

pub type CommandLine = String<MAX_LINE_LEN>;

/// Logical operations exposed to remote callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    FireNow,
    ArmDelayed { seconds: i64 },
    ArmRepeating { seconds: i64 },
    Cancel,
    Status,
    Help { topic: Option<CommandTag> },
}

/// Successful control outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAck {
    Fired,
    Armed { mode: TaskMode, interval: IntervalSecs },
    /// Mode that was stopped; [`TaskMode::None`] when nothing was armed.
    Canceled(TaskMode),
    Status(StatusSnapshot),
    Help { topic: Option<CommandTag> },
}

impl fmt::Display for ControlAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAck::Fired => f.write_str("fired"),
            ControlAck::Armed {
                mode: TaskMode::Repeating,
                interval,
            } => write!(f, "shooting every {interval}"),
            ControlAck::Armed { interval, .. } => write!(f, "shooting in {interval}"),
            ControlAck::Canceled(TaskMode::None) => f.write_str("nothing armed"),
            ControlAck::Canceled(mode) => write!(f, "canceled {mode} task"),
            ControlAck::Status(snapshot) => fmt::Display::fmt(&StatusFormatter::new(snapshot), f),
            ControlAck::Help { topic: None } => {
                f.write_str("commands:")?;
                for spec in catalog::commands() {
                    write!(f, " {}", spec.name)?;
                }
                f.write_str(" (help <command> for details)")
            }
            ControlAck::Help { topic: Some(tag) } => {
                let spec = catalog::command(*tag);
                write!(f, "{}: {}", spec.usage, spec.summary)
            }
        }
    }
}

/// Control failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlError<'a> {
    Parse(ParseError<'a>),
    InvalidInterval { requested: i64 },
    NoPeer,
    UnknownTopic(&'a str),
}

impl fmt::Display for ControlError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Parse(err) => write!(f, "parse error: {err}"),
            ControlError::InvalidInterval { requested } => fmt::Display::fmt(
                &ScheduleError::InvalidInterval {
                    requested: *requested,
                },
                f,
            ),
            ControlError::NoPeer => fmt::Display::fmt(&TriggerError::NoPeer, f),
            ControlError::UnknownTopic(topic) => {
                write!(f, "unknown help topic '{topic}'; topics:")?;
                for spec in catalog::commands() {
                    write!(f, " {}", spec.name)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> From<ParseError<'a>> for ControlError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<ScheduleError> for ControlError<'_> {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::InvalidInterval { requested } => Self::InvalidInterval { requested },
        }
    }
}

impl From<TriggerError> for ControlError<'_> {
    fn from(error: TriggerError) -> Self {
        match error {
            TriggerError::NoPeer => Self::NoPeer,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    Success,
    Failure,
}

/// Rendered response handed back to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub outcome: ReplyOutcome,
    pub message: String<REPLY_CAPACITY>,
}

impl Reply {
    #[must_use]
    pub fn new(outcome: ReplyOutcome, message: &dyn fmt::Display) -> Self {
        let mut text = String::new();
        // A full buffer keeps the prefix that fit.
        let _ = write!(TruncatingWriter(&mut text), "{message}");
        Self {
            outcome,
            message: text,
        }
    }

    #[must_use]
    pub fn from_result(result: &Result<ControlAck, ControlError<'_>>) -> Self {
        match result {
            Ok(ack) => Self::new(ReplyOutcome::Success, ack),
            Err(err) => Self::new(ReplyOutcome::Failure, err),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Success)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.outcome {
            ReplyOutcome::Success => "OK",
            ReplyOutcome::Failure => "ERR",
        };
        write!(f, "{tag} {}", self.message)
    }
}

struct TruncatingWriter<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> fmt::Write for TruncatingWriter<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            self.0.push(ch).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Inbound traffic from a control transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Request(ControlRequest),
    Line(CommandLine),
}

/// Carries control requests in and replies out.
pub trait ControlTransport {
    /// Returns the next pending request without blocking.
    fn poll(&mut self) -> Option<Inbound>;

    fn reply(&mut self, reply: Reply);
}

/// Transport with no remote end.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTransport;

impl ControlTransport for NoTransport {
    fn poll(&mut self) -> Option<Inbound> {
        None
    }

    fn reply(&mut self, _: Reply) {}
}

/// Validating front-end over the scheduler and trigger.
pub struct ControlSurface<'a, I, T> {
    scheduler: &'a mut IntervalScheduler<I>,
    trigger: &'a mut T,
    connection: &'a ConnectionState,
}

impl<'a, I, T> ControlSurface<'a, I, T>
where
    I: MonotonicInstant,
    T: Trigger,
{
    pub fn new(
        scheduler: &'a mut IntervalScheduler<I>,
        trigger: &'a mut T,
        connection: &'a ConnectionState,
    ) -> Self {
        Self {
            scheduler,
            trigger,
            connection,
        }
    }

    /// # Errors
    ///
    /// [`ControlError::NoPeer`] when nothing is connected.
    pub fn fire_now(&mut self) -> Result<ControlAck, ControlError<'static>> {
        self.trigger.fire()?;
        Ok(ControlAck::Fired)
    }

    /// # Errors
    ///
    /// [`ControlError::InvalidInterval`] for `seconds <= 0`; the armed task is kept.
    pub fn arm_delayed(&mut self, seconds: i64, now: I) -> Result<ControlAck, ControlError<'static>> {
        IntervalSecs::from_seconds(seconds)?;
        let interval = self.scheduler.arm_one_shot(seconds, now)?;
        Ok(ControlAck::Armed {
            mode: TaskMode::OneShot,
            interval,
        })
    }

    /// # Errors
    ///
    /// [`ControlError::InvalidInterval`] for `seconds <= 0`; the armed task is kept.
    pub fn arm_repeating(
        &mut self,
        seconds: i64,
        now: I,
    ) -> Result<ControlAck, ControlError<'static>> {
        IntervalSecs::from_seconds(seconds)?;
        let interval = self.scheduler.arm_repeating(seconds, now)?;
        Ok(ControlAck::Armed {
            mode: TaskMode::Repeating,
            interval,
        })
    }

    pub fn cancel(&mut self) -> ControlAck {
        ControlAck::Canceled(self.scheduler.cancel())
    }

    #[must_use]
    pub fn status(&self, now: I) -> StatusSnapshot {
        StatusSnapshot::capture(self.scheduler, self.connection, now)
    }

    /// Runs a typed request.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the underlying operation.
    pub fn execute(
        &mut self,
        request: ControlRequest,
        now: I,
    ) -> Result<ControlAck, ControlError<'static>> {
        match request {
            ControlRequest::FireNow => self.fire_now(),
            ControlRequest::ArmDelayed { seconds } => self.arm_delayed(seconds, now),
            ControlRequest::ArmRepeating { seconds } => self.arm_repeating(seconds, now),
            ControlRequest::Cancel => Ok(self.cancel()),
            ControlRequest::Status => Ok(ControlAck::Status(self.status(now))),
            ControlRequest::Help { topic } => Ok(ControlAck::Help { topic }),
        }
    }

    /// Parses and runs a console line.
    ///
    /// # Errors
    ///
    /// Parse failures and unknown help topics, plus anything [`Self::execute`] returns.
    pub fn execute_line<'l>(&mut self, line: &'l str, now: I) -> Result<ControlAck, ControlError<'l>> {
        let request = to_request(grammar::parse(line)?)?;
        Ok(self.execute(request, now)?)
    }

    /// Runs a request from either inbound form.
    pub fn respond<'l>(&mut self, inbound: &'l Inbound, now: I) -> ControlOutcome<'l> {
        match resolve(inbound) {
            Ok(request) => ControlOutcome {
                request: Some(request),
                result: self.execute(request, now),
            },
            Err(err) => ControlOutcome {
                request: None,
                result: Err(err),
            },
        }
    }
}

/// Result of handling one inbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlOutcome<'a> {
    /// Request that ran, `None` when the line did not resolve to one.
    pub request: Option<ControlRequest>,
    pub result: Result<ControlAck, ControlError<'a>>,
}

impl ControlOutcome<'_> {
    #[must_use]
    pub fn reply(&self) -> Reply {
        Reply::from_result(&self.result)
    }
}

/// Resolves an inbound message into a logical request.
///
/// # Errors
///
/// Parse failures and unknown help topics for console lines.
pub fn resolve(inbound: &Inbound) -> Result<ControlRequest, ControlError<'_>> {
    match inbound {
        Inbound::Request(request) => Ok(*request),
        Inbound::Line(line) => to_request(grammar::parse(line)?),
    }
}

/// Maps a parsed console command onto its logical request.
///
/// # Errors
///
/// [`ControlError::UnknownTopic`] when `help` names a command that does not exist.
pub fn to_request(command: Command<'_>) -> Result<ControlRequest, ControlError<'_>> {
    Ok(match command {
        Command::Shoot(ShootCommand::Now) => ControlRequest::FireNow,
        Command::Shoot(ShootCommand::After(seconds)) => ControlRequest::ArmDelayed { seconds },
        Command::Shoot(ShootCommand::Every(seconds)) => ControlRequest::ArmRepeating { seconds },
        Command::Cancel => ControlRequest::Cancel,
        Command::Status => ControlRequest::Status,
        Command::Help { topic: None } => ControlRequest::Help { topic: None },
        Command::Help { topic: Some(name) } => ControlRequest::Help {
            topic: Some(
                catalog::find(name)
                    .ok_or(ControlError::UnknownTopic(name))?
                    .tag,
            ),
        },
    })
}
