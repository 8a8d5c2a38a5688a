#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Mirrors controller telemetry to defmt (or stdout on host builds).

use shutter_core::telemetry::{
    EventId, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

use crate::instant::FirmwareInstant;

/// Logs every record newer than `cursor` and returns the new cursor.
pub fn drain(
    recorder: &TelemetryRecorder<FirmwareInstant>,
    cursor: Option<EventId>,
) -> Option<EventId> {
    let mut latest = cursor;
    for record in recorder.newer_than(cursor) {
        log_record(record);
        latest = Some(record.id);
    }
    latest
}

fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let code = record.event.to_raw();
    let timestamp_us = record.timestamp.as_micros();
    let (delta_us, value) = match record.details {
        TelemetryPayload::Link(link) => (
            link.elapsed_since_previous.map(micros),
            Some(i64::from(link.peers)),
        ),
        TelemetryPayload::Trigger(trigger) => (
            trigger.elapsed_since_previous.map(micros),
            None,
        ),
        TelemetryPayload::Schedule(schedule) => (
            None,
            schedule
                .interval_secs
                .and_then(|secs| i64::try_from(secs).ok())
                .or(schedule.rejected),
        ),
        TelemetryPayload::None => (None, None),
    };

    emit_log(record.id, code, timestamp_us, delta_us, value);
}

fn micros(elapsed: core::time::Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(target_os = "none")]
fn emit_log(id: EventId, code: u16, timestamp_us: u64, delta_us: Option<u64>, value: Option<i64>) {
    let event = shutter_core::telemetry::TelemetryEventKind::from_raw(code);
    match (delta_us, value) {
        (Some(delta), _) => defmt::info!(
            "telemetry #{} {=str} t={}us Δ={}us",
            id,
            event_label(event),
            timestamp_us,
            delta
        ),
        (None, Some(value)) => defmt::info!(
            "telemetry #{} {=str} t={}us value={}",
            id,
            event_label(event),
            timestamp_us,
            value
        ),
        (None, None) => defmt::info!(
            "telemetry #{} {=str} t={}us",
            id,
            event_label(event),
            timestamp_us
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: EventId, code: u16, timestamp_us: u64, delta_us: Option<u64>, value: Option<i64>) {
    let event = shutter_core::telemetry::TelemetryEventKind::from_raw(code);
    match (delta_us, value) {
        (Some(delta), _) => println!("telemetry #{id} {event} t={timestamp_us}us Δ={delta}us"),
        (None, Some(value)) => println!("telemetry #{id} {event} t={timestamp_us}us value={value}"),
        (None, None) => println!("telemetry #{id} {event} t={timestamp_us}us"),
    }
}

#[cfg(target_os = "none")]
const fn event_label(event: shutter_core::telemetry::TelemetryEventKind) -> &'static str {
    use shutter_core::scheduler::TaskMode;
    use shutter_core::telemetry::TelemetryEventKind as Kind;
    use shutter_core::trigger::TriggerSource;

    match event {
        Kind::Booted => "booted",
        Kind::PeerConnected => "peer-connected",
        Kind::PeerDisconnected => "peer-disconnected",
        Kind::DiscoveryRestarted => "discovery-restarted",
        Kind::IntervalRejected => "interval-rejected",
        Kind::TriggerSent(TriggerSource::Button) => "trigger-sent button",
        Kind::TriggerSent(TriggerSource::Control) => "trigger-sent control",
        Kind::TriggerSent(TriggerSource::Delayed) => "trigger-sent delayed",
        Kind::TriggerSent(TriggerSource::Repeating) => "trigger-sent repeating",
        Kind::TriggerNoPeer(_) => "trigger-no-peer",
        Kind::TaskArmed(TaskMode::Repeating) => "task-armed repeating",
        Kind::TaskArmed(_) => "task-armed delayed",
        Kind::TaskCanceled(_) => "task-canceled",
        Kind::Custom(_) => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_core::connection::ConnectionEdge;
    use shutter_core::trigger::TriggerSource;

    fn at(micros: u64) -> FirmwareInstant {
        FirmwareInstant::from_micros(micros)
    }

    #[test]
    fn drain_advances_cursor_past_logged_records() {
        let mut recorder = TelemetryRecorder::new();
        recorder.record_boot(at(0));
        recorder.record_connection_edge(ConnectionEdge::Connected { peers: 1 }, at(100));

        let cursor = drain(&recorder, None);
        assert_eq!(cursor, Some(1));
        assert_eq!(drain(&recorder, cursor), cursor);

        recorder.record_trigger(TriggerSource::Button, Ok(()), at(250));
        assert_eq!(drain(&recorder, cursor), Some(2));
    }

    #[test]
    fn empty_recorder_keeps_cursor() {
        let recorder = TelemetryRecorder::<FirmwareInstant>::new();
        assert_eq!(drain(&recorder, None), None);
    }
}
