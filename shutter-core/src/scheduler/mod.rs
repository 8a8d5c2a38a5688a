//! Delayed and repeating trigger scheduling.
//!
//! [`IntervalScheduler`] owns at most one [`ScheduledTask`]. Arming always
//! replaces whatever was armed before; one-shot tasks disarm themselves the
//! moment they fire, repeating tasks stay armed until cancelled.
//!
//! Repeating tasks rebase their next deadline from the tick that fired them
//! (`next = now + interval`). A stalled tick loop therefore produces a single
//! late fire instead of a burst of catch-up fires, at the cost of drifting by
//! the per-tick latency over long runs.

use core::fmt;
use core::num::NonZeroU64;
use core::time::Duration;

use crate::timing::MonotonicInstant;
use crate::trigger::{Trigger, TriggerError};

/// Whole-second interval, always at least one second.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct IntervalSecs(NonZeroU64);

impl IntervalSecs {
    /// Validates an externally supplied second count.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInterval`] for zero or negative values.
    pub fn from_seconds(seconds: i64) -> Result<Self, ScheduleError> {
        u64::try_from(seconds)
            .ok()
            .and_then(NonZeroU64::new)
            .map(Self)
            .ok_or(ScheduleError::InvalidInterval { requested: seconds })
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl fmt::Display for IntervalSecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.get())
    }
}

/// Errors reported by the scheduler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScheduleError {
    /// Interval below one second; the armed task is left untouched.
    InvalidInterval { requested: i64 },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InvalidInterval { requested } => {
                write!(f, "invalid interval value: '{requested}'")
            }
        }
    }
}

/// Scheduling mode of the armed task.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TaskMode {
    #[default]
    None,
    OneShot,
    Repeating,
}

impl TaskMode {
    #[must_use]
    pub const fn is_armed(self) -> bool {
        !matches!(self, TaskMode::None)
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskMode::None => "idle",
            TaskMode::OneShot => "delayed",
            TaskMode::Repeating => "repeating",
        })
    }
}

/// The single task owned by the scheduler.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScheduledTask<I> {
    #[default]
    None,
    OneShot {
        delay: IntervalSecs,
        next_fire: I,
    },
    Repeating {
        interval: IntervalSecs,
        next_fire: I,
    },
}

impl<I: Copy> ScheduledTask<I> {
    #[must_use]
    pub const fn mode(&self) -> TaskMode {
        match self {
            ScheduledTask::None => TaskMode::None,
            ScheduledTask::OneShot { .. } => TaskMode::OneShot,
            ScheduledTask::Repeating { .. } => TaskMode::Repeating,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Option<IntervalSecs> {
        match self {
            ScheduledTask::None => None,
            ScheduledTask::OneShot { delay, .. } => Some(*delay),
            ScheduledTask::Repeating { interval, .. } => Some(*interval),
        }
    }

    #[must_use]
    pub const fn next_fire(&self) -> Option<I> {
        match self {
            ScheduledTask::None => None,
            ScheduledTask::OneShot { next_fire, .. }
            | ScheduledTask::Repeating { next_fire, .. } => Some(*next_fire),
        }
    }
}

/// Result of a scheduler tick that reached its deadline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScheduledFire {
    /// Mode of the task that fired.
    pub mode: TaskMode,
    pub result: Result<(), TriggerError>,
}

/// Decides, tick by tick, when the armed task fires.
#[derive(Debug)]
pub struct IntervalScheduler<I> {
    task: ScheduledTask<I>,
}

impl<I> Default for IntervalScheduler<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> IntervalScheduler<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            task: ScheduledTask::None,
        }
    }

    #[must_use]
    pub const fn task(&self) -> &ScheduledTask<I> {
        &self.task
    }

    /// Disarms the current task. Idempotent.
    pub fn cancel(&mut self) -> TaskMode
    where
        I: Copy,
    {
        let previous = self.task.mode();
        self.task = ScheduledTask::None;
        previous
    }
}

impl<I> IntervalScheduler<I>
where
    I: MonotonicInstant,
{
    /// Replaces the current task with a one-shot firing `delay_seconds` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInterval`] when `delay_seconds < 1`.
    pub fn arm_one_shot(&mut self, delay_seconds: i64, now: I) -> Result<IntervalSecs, ScheduleError> {
        let delay = IntervalSecs::from_seconds(delay_seconds)?;
        self.task = ScheduledTask::OneShot {
            delay,
            next_fire: now + delay.as_duration(),
        };
        Ok(delay)
    }

    /// Replaces the current task with one firing every `interval_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInterval`] when `interval_seconds < 1`.
    pub fn arm_repeating(
        &mut self,
        interval_seconds: i64,
        now: I,
    ) -> Result<IntervalSecs, ScheduleError> {
        let interval = IntervalSecs::from_seconds(interval_seconds)?;
        self.task = ScheduledTask::Repeating {
            interval,
            next_fire: now + interval.as_duration(),
        };
        Ok(interval)
    }

    /// Time left until the armed task fires, zero if overdue.
    #[must_use]
    pub fn remaining(&self, now: I) -> Option<Duration> {
        self.task
            .next_fire()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Fires the armed task through `trigger` once its deadline has passed.
    pub fn tick<T: Trigger>(&mut self, now: I, trigger: &mut T) -> Option<ScheduledFire> {
        match self.task {
            ScheduledTask::None => None,
            ScheduledTask::OneShot { next_fire, .. } if now >= next_fire => {
                self.task = ScheduledTask::None;
                Some(ScheduledFire {
                    mode: TaskMode::OneShot,
                    result: trigger.fire(),
                })
            }
            ScheduledTask::Repeating {
                interval,
                next_fire,
            } if now >= next_fire => {
                self.task = ScheduledTask::Repeating {
                    interval,
                    next_fire: now + interval.as_duration(),
                };
                Some(ScheduledFire {
                    mode: TaskMode::Repeating,
                    result: trigger.fire(),
                })
            }
            ScheduledTask::OneShot { .. } | ScheduledTask::Repeating { .. } => None,
        }
    }
}
