#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Behaviour fixed by the remote's hardware.

use shutter_core::debounce::{ActiveLevel, HoldPolicy};
use shutter_core::orchestrator::ShutterConfig;

/// The BOOT strap button pulls GPIO0 low while pressed.
pub const BUTTON_ACTIVE: ActiveLevel = ActiveLevel::Low;

/// Controller configuration for the hardware remote.
///
/// A held button stalls the controller core until it is released; the BLE
/// host and the console keep running on the other core.
pub fn shutter_config() -> ShutterConfig {
    ShutterConfig {
        hold_policy: HoldPolicy::BlockUntilRelease,
        ..ShutterConfig::default()
    }
}
