//! Peer connection lifecycle.
//!
//! [`ConnectionMonitor`] is the only place that reacts to peer-count changes:
//! it flashes the indicator on connect/disconnect edges and re-arms discovery
//! after the last peer drops, exactly once per edge. A peer that connects and
//! drops between two ticks is caught through [`PeerLink::disconnect_count`]
//! and handled as a disconnect edge.

use embedded_hal::delay::DelayNs;

use crate::hid::ConsumerReport;
use crate::indicator::{FeedbackEvent, Indicator, IndicatorSignal};

/// Wireless peer capability.
pub trait PeerLink {
    /// Number of peers currently connected.
    fn connected_peer_count(&self) -> usize;

    /// Publishes an input report to every connected peer.
    fn send_report(&mut self, report: ConsumerReport);

    /// Restarts discovery advertising after the last peer dropped.
    fn restart_discovery(&mut self);

    /// Running count of peer drops, wrapping.
    ///
    /// Read after [`Self::connected_peer_count`]; a link must count a drop
    /// before it lowers the peer count. Links that cannot miss a drop keep
    /// the default.
    fn disconnect_count(&self) -> u32 {
        0
    }
}

/// Connection state observed by the monitor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Peer count sampled on the most recent tick.
    pub peer_count: usize,
    /// Whether a peer was connected as of the previous tick.
    pub was_connected: bool,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.peer_count > 0
    }
}

/// Connection edge detected by [`ConnectionMonitor::tick`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEdge {
    Connected { peers: usize },
    Disconnected,
}

/// Edge-detects peer connectivity.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    seen_drops: u32,
}

impl ConnectionMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState {
                peer_count: 0,
                was_connected: false,
            },
            seen_drops: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Samples the link and reacts to connect/disconnect edges.
    pub fn tick<L, S, D>(
        &mut self,
        link: &mut L,
        signal: &mut IndicatorSignal<S>,
        delay: &mut D,
    ) -> Option<ConnectionEdge>
    where
        L: PeerLink,
        S: Indicator,
        D: DelayNs,
    {
        let peers = link.connected_peer_count();
        let drops = link.disconnect_count();
        let unseen_drop = drops != self.seen_drops;
        self.seen_drops = drops;
        self.state.peer_count = peers;
        let connected = peers > 0;

        match (self.state.was_connected, connected) {
            (false, true) => {
                signal.signal(FeedbackEvent::Connected, delay);
                self.state.was_connected = true;
                Some(ConnectionEdge::Connected { peers })
            }
            (was_connected, false) if was_connected || unseen_drop => {
                signal.signal(FeedbackEvent::Disconnected, delay);
                self.state.was_connected = false;
                link.restart_discovery();
                Some(ConnectionEdge::Disconnected)
            }
            _ => None,
        }
    }
}
