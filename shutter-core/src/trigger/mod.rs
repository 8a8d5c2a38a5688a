//! Two-phase shutter actuation.

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::connection::PeerLink;
use crate::hid::{ConsumerKey, ConsumerReport};
use crate::indicator::{FeedbackEvent, Indicator, IndicatorSignal};
use crate::timing::block_for;

/// Hold between the press and release reports so the peer registers a discrete key-down.
pub const PRESS_HOLD: Duration = Duration::from_millis(50);

/// Reasons a fire attempt did not reach a peer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerError {
    /// No peer was connected; nothing was sent.
    NoPeer,
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerError::NoPeer => f.write_str("no peer connected"),
        }
    }
}

/// Origin of a fire request, carried into telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerSource {
    Button,
    Control,
    Delayed,
    Repeating,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerSource::Button => "button",
            TriggerSource::Control => "control",
            TriggerSource::Delayed => "delayed",
            TriggerSource::Repeating => "repeating",
        })
    }
}

/// Anything that can issue the remote action.
pub trait Trigger {
    fn fire(&mut self) -> Result<(), TriggerError>;
}

/// Sends the press/release report pair.
#[derive(Copy, Clone, Debug)]
pub struct TriggerActuator {
    key: ConsumerKey,
}

impl Default for TriggerActuator {
    fn default() -> Self {
        Self::new(ConsumerKey::default())
    }
}

impl TriggerActuator {
    #[must_use]
    pub const fn new(key: ConsumerKey) -> Self {
        Self { key }
    }

    #[must_use]
    pub const fn key(&self) -> ConsumerKey {
        self.key
    }

    /// Issues the remote action once.
    ///
    /// With no connected peer this flashes the no-peer indicator and returns
    /// [`TriggerError::NoPeer`] without touching the report channel.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::NoPeer`] when the link reports zero peers.
    pub fn fire<L, S, D>(
        &self,
        link: &mut L,
        signal: &mut IndicatorSignal<S>,
        delay: &mut D,
    ) -> Result<(), TriggerError>
    where
        L: PeerLink,
        S: Indicator,
        D: DelayNs,
    {
        if link.connected_peer_count() == 0 {
            signal.signal(FeedbackEvent::NoPeer, delay);
            return Err(TriggerError::NoPeer);
        }

        link.send_report(ConsumerReport::pressed(self.key));
        block_for(delay, PRESS_HOLD);
        link.send_report(ConsumerReport::RELEASED);
        signal.signal(FeedbackEvent::TriggerSent, delay);
        Ok(())
    }

    /// Borrows the collaborators into a [`Trigger`] handle.
    pub fn bind<'a, L, S, D>(
        &'a self,
        link: &'a mut L,
        signal: &'a mut IndicatorSignal<S>,
        delay: &'a mut D,
    ) -> BoundActuator<'a, L, S, D> {
        BoundActuator {
            actuator: self,
            link,
            signal,
            delay,
        }
    }
}

/// [`TriggerActuator`] bound to its collaborators for the duration of a tick.
pub struct BoundActuator<'a, L, S, D> {
    actuator: &'a TriggerActuator,
    link: &'a mut L,
    signal: &'a mut IndicatorSignal<S>,
    delay: &'a mut D,
}

impl<L, S, D> Trigger for BoundActuator<'_, L, S, D>
where
    L: PeerLink,
    S: Indicator,
    D: DelayNs,
{
    fn fire(&mut self) -> Result<(), TriggerError> {
        self.actuator.fire(self.link, self.signal, self.delay)
    }
}

/// Waits issued through a bound actuator run on the delay it was bound to.
impl<L, S, D> DelayNs for BoundActuator<'_, L, S, D>
where
    D: DelayNs,
{
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }
}
