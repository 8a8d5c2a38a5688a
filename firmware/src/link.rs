#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Cross-core plumbing between the controller loop and the BLE host.
//!
//! The controller runs on the second core and never awaits. It reads the
//! peer count from an atomic, pushes reports into a channel drained by the
//! GATT task, and raises a signal when discovery should restart.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};
use shutter_core::connection::PeerLink;
use shutter_core::hid::ConsumerReport;

/// Press/release pairs buffered while the GATT task is busy notifying.
pub const REPORT_QUEUE_DEPTH: usize = 8;

pub type ReportQueue = Channel<CriticalSectionRawMutex, ConsumerReport, REPORT_QUEUE_DEPTH>;
pub type ReportSender = Sender<'static, CriticalSectionRawMutex, ConsumerReport, REPORT_QUEUE_DEPTH>;
pub type ReportReceiver =
    Receiver<'static, CriticalSectionRawMutex, ConsumerReport, REPORT_QUEUE_DEPTH>;
pub type DiscoverySignal = Signal<CriticalSectionRawMutex, ()>;

pub static REPORTS: ReportQueue = Channel::new();
pub static DISCOVERY_RESTART: DiscoverySignal = Signal::new();

static PEER_COUNT: AtomicUsize = AtomicUsize::new(0);
static DISCONNECTS: AtomicU32 = AtomicU32::new(0);
static DROPPED_REPORTS: AtomicU32 = AtomicU32::new(0);

/// Called by the BLE task when a central connects.
pub fn peer_connected() -> usize {
    PEER_COUNT.fetch_add(1, Ordering::AcqRel) + 1
}

/// Called by the BLE task when a central goes away.
///
/// The drop is counted before the peer count falls, so a controller that
/// reads the count first never sees the same drop twice.
pub fn peer_disconnected() -> usize {
    DISCONNECTS.fetch_add(1, Ordering::AcqRel);
    let previous = PEER_COUNT
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            Some(count.saturating_sub(1))
        })
        .unwrap_or(0);
    previous.saturating_sub(1)
}

pub fn peer_count() -> usize {
    PEER_COUNT.load(Ordering::Acquire)
}

pub fn disconnects() -> u32 {
    DISCONNECTS.load(Ordering::Acquire)
}

/// Reports lost because the queue was full.
pub fn dropped_reports() -> u32 {
    DROPPED_REPORTS.load(Ordering::Relaxed)
}

/// [`PeerLink`] view used by the controller loop.
pub struct BleLink {
    reports: ReportSender,
    discovery: &'static DiscoverySignal,
}

impl BleLink {
    pub fn new(reports: ReportSender, discovery: &'static DiscoverySignal) -> Self {
        Self { reports, discovery }
    }
}

impl PeerLink for BleLink {
    fn connected_peer_count(&self) -> usize {
        peer_count()
    }

    fn send_report(&mut self, report: ConsumerReport) {
        if self.reports.try_send(report).is_err() {
            DROPPED_REPORTS.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn restart_discovery(&mut self) {
        self.discovery.signal(());
    }

    fn disconnect_count(&self) -> u32 {
        disconnects()
    }
}
