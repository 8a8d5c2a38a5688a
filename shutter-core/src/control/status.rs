//! Status snapshot returned by the `Status` control operation.
//!
//! [`StatusFormatter`] keeps the textual rendering identical between the
//! firmware console and the emulator.

use core::fmt;
use core::time::Duration;

use crate::connection::ConnectionState;
use crate::scheduler::{IntervalScheduler, IntervalSecs, TaskMode};
use crate::timing::MonotonicInstant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode: TaskMode,
    /// Time until the armed task fires, zero when overdue.
    pub remaining: Option<Duration>,
    pub interval: Option<IntervalSecs>,
    pub peers: usize,
}

impl StatusSnapshot {
    /// Captures the scheduler and connection state at `now`.
    #[must_use]
    pub fn capture<I: MonotonicInstant>(
        scheduler: &IntervalScheduler<I>,
        connection: &ConnectionState,
        now: I,
    ) -> Self {
        Self {
            mode: scheduler.task().mode(),
            remaining: scheduler.remaining(now),
            interval: scheduler.task().interval(),
            peers: connection.peer_count,
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.peers > 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the task part (e.g. `task=repeating interval=5s next=+2.4s`).
    pub fn write_task<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "task={}", self.snapshot.mode)?;
        if let Some(interval) = self.snapshot.interval {
            write!(writer, " interval={interval}")?;
        }
        if self.snapshot.mode.is_armed() {
            writer.write_str(" next=")?;
            write_duration(writer, self.snapshot.remaining)?;
        }
        Ok(())
    }

    /// Writes the link part (e.g. `peers=1 connected`).
    pub fn write_link<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "peers={} {}",
            self.snapshot.peers,
            if self.snapshot.is_connected() {
                "connected"
            } else {
                "advertising"
            }
        )
    }
}

impl fmt::Display for StatusFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_task(f)?;
        f.write_str(" ")?;
        self.write_link(f)
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            write!(writer, "+{}.{}s", millis / 1_000, (millis % 1_000) / 100)
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
