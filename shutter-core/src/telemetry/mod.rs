//! Telemetry event catalog and recorder shared by firmware and host targets.
//!
//! Events serialize to compact `u16` codes for transport over diagnostics
//! channels. Payloads carry the elapsed time since the previous record of the
//! same family (link edges, trigger attempts) so that cadence and reconnect
//! behaviour can be read straight off a log.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::connection::ConnectionEdge;
use crate::scheduler::{IntervalSecs, TaskMode};
use crate::timing::MonotonicInstant;
use crate::trigger::{TriggerError, TriggerSource};

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Booted,
    PeerConnected,
    PeerDisconnected,
    DiscoveryRestarted,
    TriggerSent(TriggerSource),
    TriggerNoPeer(TriggerSource),
    TaskArmed(TaskMode),
    TaskCanceled(TaskMode),
    IntervalRejected,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Booted => f.write_str("booted"),
            TelemetryEventKind::PeerConnected => f.write_str("peer-connected"),
            TelemetryEventKind::PeerDisconnected => f.write_str("peer-disconnected"),
            TelemetryEventKind::DiscoveryRestarted => f.write_str("discovery-restarted"),
            TelemetryEventKind::TriggerSent(source) => write!(f, "trigger-sent {source}"),
            TelemetryEventKind::TriggerNoPeer(source) => write!(f, "trigger-no-peer {source}"),
            TelemetryEventKind::TaskArmed(mode) => write!(f, "task-armed {mode}"),
            TelemetryEventKind::TaskCanceled(mode) => write!(f, "task-canceled {mode}"),
            TelemetryEventKind::IntervalRejected => f.write_str("interval-rejected"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const BOOTED_CODE: u16 = 0x0001;
    const PEER_CONNECTED_CODE: u16 = 0x0002;
    const PEER_DISCONNECTED_CODE: u16 = 0x0003;
    const DISCOVERY_RESTARTED_CODE: u16 = 0x0004;
    const INTERVAL_REJECTED_CODE: u16 = 0x0005;
    const TRIGGER_SENT_BASE: u16 = 0x0010;
    const TRIGGER_NO_PEER_BASE: u16 = 0x0014;
    const TASK_ARMED_BASE: u16 = 0x0018;
    const TASK_CANCELED_BASE: u16 = 0x001C;
    const FAMILY_WIDTH: u16 = 4;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::Booted => Self::BOOTED_CODE,
            TelemetryEventKind::PeerConnected => Self::PEER_CONNECTED_CODE,
            TelemetryEventKind::PeerDisconnected => Self::PEER_DISCONNECTED_CODE,
            TelemetryEventKind::DiscoveryRestarted => Self::DISCOVERY_RESTARTED_CODE,
            TelemetryEventKind::IntervalRejected => Self::INTERVAL_REJECTED_CODE,
            TelemetryEventKind::TriggerSent(source) => {
                Self::TRIGGER_SENT_BASE + source_index(source)
            }
            TelemetryEventKind::TriggerNoPeer(source) => {
                Self::TRIGGER_NO_PEER_BASE + source_index(source)
            }
            TelemetryEventKind::TaskArmed(mode) => Self::TASK_ARMED_BASE + mode_index(mode),
            TelemetryEventKind::TaskCanceled(mode) => Self::TASK_CANCELED_BASE + mode_index(mode),
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let family = |base: u16| {
            (base..base + Self::FAMILY_WIDTH)
                .contains(&code)
                .then(|| code - base)
        };

        match code {
            Self::BOOTED_CODE => TelemetryEventKind::Booted,
            Self::PEER_CONNECTED_CODE => TelemetryEventKind::PeerConnected,
            Self::PEER_DISCONNECTED_CODE => TelemetryEventKind::PeerDisconnected,
            Self::DISCOVERY_RESTARTED_CODE => TelemetryEventKind::DiscoveryRestarted,
            Self::INTERVAL_REJECTED_CODE => TelemetryEventKind::IntervalRejected,
            _ => {
                if let Some(source) = family(Self::TRIGGER_SENT_BASE).and_then(source_from_index) {
                    TelemetryEventKind::TriggerSent(source)
                } else if let Some(source) =
                    family(Self::TRIGGER_NO_PEER_BASE).and_then(source_from_index)
                {
                    TelemetryEventKind::TriggerNoPeer(source)
                } else if let Some(mode) = family(Self::TASK_ARMED_BASE).and_then(mode_from_index)
                {
                    TelemetryEventKind::TaskArmed(mode)
                } else if let Some(mode) =
                    family(Self::TASK_CANCELED_BASE).and_then(mode_from_index)
                {
                    TelemetryEventKind::TaskCanceled(mode)
                } else {
                    TelemetryEventKind::Custom(code)
                }
            }
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Link(LinkTelemetry),
    Trigger(TriggerTelemetry),
    Schedule(ScheduleTelemetry),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Connection edge payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkTelemetry {
    pub peers: u8,
    /// Time since the previous connection edge.
    pub elapsed_since_previous: Option<Duration>,
}

/// Trigger attempt payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriggerTelemetry {
    /// Time since the previous trigger attempt, successful or not.
    pub elapsed_since_previous: Option<Duration>,
}

/// Scheduler change payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduleTelemetry {
    pub interval_secs: Option<u64>,
    /// Raw value supplied by the caller when it was rejected.
    pub rejected: Option<i64>,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<I>
where
    I: Copy,
{
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

pub type TelemetryRing<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<I>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    I: Copy,
{
    ring: TelemetryRing<I, CAPACITY>,
    last_edge_at: Option<I>,
    last_trigger_at: Option<I>,
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> TelemetryRecorder<I, CAPACITY>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_edge_at: None,
            last_trigger_at: None,
            next_event_id: 0,
        }
    }

    /// Returns the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<I>> {
        self.ring.oldest_ordered()
    }

    /// Records newer than `cursor`, oldest first. `None` yields everything retained.
    pub fn newer_than(
        &self,
        cursor: Option<EventId>,
    ) -> impl Iterator<Item = &TelemetryRecord<I>> + '_ {
        self.ring
            .oldest_ordered()
            .filter(move |record| cursor.is_none_or(|seen| record.id > seen))
    }

    pub fn latest(&self) -> Option<&TelemetryRecord<I>> {
        self.ring.recent()
    }

    pub fn record_boot(&mut self, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::Booted,
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records a connection edge with elapsed time since the previous edge.
    pub fn record_connection_edge(&mut self, edge: ConnectionEdge, timestamp: I) -> EventId {
        let elapsed = self
            .last_edge_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_edge_at = Some(timestamp);

        let (event, peers) = match edge {
            ConnectionEdge::Connected { peers } => (TelemetryEventKind::PeerConnected, peers),
            ConnectionEdge::Disconnected => (TelemetryEventKind::PeerDisconnected, 0),
        };
        let payload = TelemetryPayload::Link(LinkTelemetry {
            peers: truncate_count(peers),
            elapsed_since_previous: elapsed,
        });

        self.record(event, payload, timestamp)
    }

    pub fn record_discovery_restart(&mut self, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::DiscoveryRestarted,
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records a trigger attempt with elapsed time since the previous attempt.
    pub fn record_trigger(
        &mut self,
        source: TriggerSource,
        result: Result<(), TriggerError>,
        timestamp: I,
    ) -> EventId {
        let elapsed = self
            .last_trigger_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_trigger_at = Some(timestamp);

        let event = match result {
            Ok(()) => TelemetryEventKind::TriggerSent(source),
            Err(TriggerError::NoPeer) => TelemetryEventKind::TriggerNoPeer(source),
        };
        let payload = TelemetryPayload::Trigger(TriggerTelemetry {
            elapsed_since_previous: elapsed,
        });

        self.record(event, payload, timestamp)
    }

    pub fn record_armed(&mut self, mode: TaskMode, interval: IntervalSecs, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::TaskArmed(mode),
            TelemetryPayload::Schedule(ScheduleTelemetry {
                interval_secs: Some(interval.get()),
                rejected: None,
            }),
            timestamp,
        )
    }

    pub fn record_canceled(&mut self, mode: TaskMode, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::TaskCanceled(mode),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    pub fn record_rejected(&mut self, requested: i64, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::IntervalRejected,
            TelemetryPayload::Schedule(ScheduleTelemetry {
                interval_secs: None,
                rejected: Some(requested),
            }),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<I, const CAPACITY: usize> Default for TelemetryRecorder<I, CAPACITY>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

const fn source_index(source: TriggerSource) -> u16 {
    match source {
        TriggerSource::Button => 0,
        TriggerSource::Control => 1,
        TriggerSource::Delayed => 2,
        TriggerSource::Repeating => 3,
    }
}

fn source_from_index(index: u16) -> Option<TriggerSource> {
    match index {
        0 => Some(TriggerSource::Button),
        1 => Some(TriggerSource::Control),
        2 => Some(TriggerSource::Delayed),
        3 => Some(TriggerSource::Repeating),
        _ => None,
    }
}

const fn mode_index(mode: TaskMode) -> u16 {
    match mode {
        TaskMode::None => 0,
        TaskMode::OneShot => 1,
        TaskMode::Repeating => 2,
    }
}

fn mode_from_index(index: u16) -> Option<TaskMode> {
    match index {
        0 => Some(TaskMode::None),
        1 => Some(TaskMode::OneShot),
        2 => Some(TaskMode::Repeating),
        _ => None,
    }
}
