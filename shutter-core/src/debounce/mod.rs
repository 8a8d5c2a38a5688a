//! Physical trigger input handling.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::timing::block_for;
use crate::trigger::{Trigger, TriggerError};

/// Quiet period after the input is released, absorbing contact bounce.
pub const RELEASE_SETTLE: Duration = Duration::from_millis(50);
/// Poll cadence while [`HoldPolicy::BlockUntilRelease`] waits for release.
pub const RELEASE_POLL: Duration = Duration::from_millis(1);

/// Level-triggered physical input.
pub trait TriggerInput {
    /// `true` while the operator holds the input.
    fn is_asserted(&mut self) -> bool;
}

/// Electrical level that counts as "pressed".
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ActiveLevel {
    #[default]
    Low,
    High,
}

/// Adapts an `embedded-hal` input pin. Read errors count as released.
#[derive(Debug)]
pub struct PinInput<P> {
    pin: P,
    active: ActiveLevel,
}

impl<P> PinInput<P>
where
    P: InputPin,
{
    pub const fn new(pin: P, active: ActiveLevel) -> Self {
        Self { pin, active }
    }
}

impl<P> TriggerInput for PinInput<P>
where
    P: InputPin,
{
    fn is_asserted(&mut self) -> bool {
        match self.active {
            ActiveLevel::Low => self.pin.is_low().unwrap_or(false),
            ActiveLevel::High => self.pin.is_high().unwrap_or(false),
        }
    }
}

/// Input that is never asserted.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoInput;

impl TriggerInput for NoInput {
    fn is_asserted(&mut self) -> bool {
        false
    }
}

/// How a held input is waited out after it fired.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HoldPolicy {
    /// Remember the hold and keep ticking; release is noticed on a later tick
    /// and only clears the hold.
    ///
    /// Hosts that cannot release the input while a tick is running (the
    /// emulator) need this policy.
    #[default]
    Latch,
    /// Stall the tick until the input is released, then settle for
    /// [`RELEASE_SETTLE`].
    ///
    /// Nothing else runs while the input stays asserted. This is the
    /// behaviour of the hardware remote.
    BlockUntilRelease,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DebounceState {
    pub held: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InputEdge {
    Pressed,
    Released,
}

/// What a debouncer tick observed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DebounceOutcome {
    Fired(Result<(), TriggerError>),
    Released,
}

/// Fires the trigger once per physical press.
#[derive(Debug, Default)]
pub struct InputDebouncer {
    state: DebounceState,
    policy: HoldPolicy,
}

impl InputDebouncer {
    #[must_use]
    pub const fn new(policy: HoldPolicy) -> Self {
        Self {
            state: DebounceState { held: false },
            policy,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DebounceState {
        self.state
    }

    /// Samples the input and fires on a press edge.
    ///
    /// `trigger` also paces the [`HoldPolicy::BlockUntilRelease`] waits, so a
    /// trigger bound to the tick's delay keeps a single clock.
    pub fn tick<In, T>(&mut self, input: &mut In, trigger: &mut T) -> Option<DebounceOutcome>
    where
        In: TriggerInput,
        T: Trigger + DelayNs,
    {
        match self.sample(input)? {
            InputEdge::Pressed => {
                let result = trigger.fire();
                if self.policy == HoldPolicy::BlockUntilRelease {
                    while input.is_asserted() {
                        block_for(trigger, RELEASE_POLL);
                    }
                    self.state.held = false;
                    block_for(trigger, RELEASE_SETTLE);
                }
                Some(DebounceOutcome::Fired(result))
            }
            InputEdge::Released => Some(DebounceOutcome::Released),
        }
    }

    fn sample<In: TriggerInput>(&mut self, input: &mut In) -> Option<InputEdge> {
        match (self.state.held, input.is_asserted()) {
            (false, true) => {
                self.state.held = true;
                Some(InputEdge::Pressed)
            }
            (true, false) => {
                self.state.held = false;
                Some(InputEdge::Released)
            }
            _ => None,
        }
    }
}
