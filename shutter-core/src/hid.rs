//! Consumer-control HID identity shared by the firmware GATT server and tests.
//!
//! The device exposes a single 16-bit consumer usage input report. Pressing the
//! shutter sends the selected volume key usage; releasing sends usage `0`.

use core::fmt;

/// Input report identifier carried in the report map and report reference descriptor.
pub const REPORT_ID: u8 = 0x01;

/// Size of an encoded [`ConsumerReport`] in bytes.
pub const REPORT_LEN: usize = 2;

/// Consumer-control report map (usage page 0x0C, one 16-bit usage per report).
pub const REPORT_MAP: [u8; 25] = [
    0x05, 0x0C, // Usage Page (Consumer)
    0x09, 0x01, // Usage (Consumer Control)
    0xA1, 0x01, // Collection (Application)
    0x85, REPORT_ID, // Report ID
    0x19, 0x00, // Usage Minimum (0)
    0x2A, 0xFF, 0x00, // Usage Maximum (0x00FF)
    0x15, 0x00, // Logical Minimum (0)
    0x26, 0xFF, 0x03, // Logical Maximum (0x03FF)
    0x75, 0x10, // Report Size (16)
    0x95, 0x01, // Report Count (1)
    0x81, 0x00, // Input (Data, Array)
    0xC0, // End Collection
];

/// Advertised GAP name.
pub const DEVICE_NAME: &str = "shutter";

/// Device information manufacturer string.
pub const MANUFACTURER_NAME: &str = "shutter-remote";

/// GAP appearance (HID keyboard).
pub const APPEARANCE: u16 = 0x03C1;

/// PnP ID characteristic contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PnpId {
    pub vendor_id_source: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_version: u16,
}

impl PnpId {
    /// Encodes the characteristic value (little-endian fields).
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 7] {
        let vendor = self.vendor_id.to_le_bytes();
        let product = self.product_id.to_le_bytes();
        let version = self.product_version.to_le_bytes();
        [
            self.vendor_id_source,
            vendor[0],
            vendor[1],
            product[0],
            product[1],
            version[0],
            version[1],
        ]
    }
}

/// PnP ID advertised through the device information service.
pub const PNP_ID: PnpId = PnpId {
    vendor_id_source: 0x02,
    vendor_id: 0xE502,
    product_id: 0xA111,
    product_version: 0x0210,
};

/// HID information characteristic: bcdHID 1.11, country 0, remote-wake flag.
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, 0x01];

/// Consumer usage sent on the press phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsumerKey {
    VolumeUp,
    #[default]
    VolumeDown,
}

impl ConsumerKey {
    /// Returns the consumer page usage code.
    #[must_use]
    pub const fn usage(self) -> u16 {
        match self {
            ConsumerKey::VolumeUp => 0x00E9,
            ConsumerKey::VolumeDown => 0x00EA,
        }
    }
}

impl fmt::Display for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsumerKey::VolumeUp => "volume-up",
            ConsumerKey::VolumeDown => "volume-down",
        })
    }
}

/// A single consumer-control input report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumerReport {
    usage: u16,
}

impl ConsumerReport {
    /// The all-released report.
    pub const RELEASED: Self = Self { usage: 0 };

    /// Report that holds `key` down.
    #[must_use]
    pub const fn pressed(key: ConsumerKey) -> Self {
        Self { usage: key.usage() }
    }

    #[must_use]
    pub const fn usage(self) -> u16 {
        self.usage
    }

    #[must_use]
    pub const fn is_release(self) -> bool {
        self.usage == 0
    }

    /// Encodes the report payload (without the report id prefix).
    #[must_use]
    pub const fn to_bytes(self) -> [u8; REPORT_LEN] {
        self.usage.to_le_bytes()
    }
}
