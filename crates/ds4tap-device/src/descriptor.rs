use std::fmt;
use std::path::PathBuf;

/// Stable path or handle by which a backend exposes one physical device.
pub type NodeId = Box<str>;

/// Sony Interactive Entertainment.
pub const SONY_VENDOR_ID: u16 = 0x054c;
/// `DualShock` 4, second revision (CUH-ZCT2).
pub const DUALSHOCK4_V2_PRODUCT_ID: u16 = 0x09cc;

/// Node prefix of evdev input devices.
pub const INPUT_EVENT_PREFIX: &str = "/dev/input/event";

/// Identity attributes, as reported by the backend that found the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceIdentity {
    /// Direct HID enumeration.
    Usb { vendor_id: u16, product_id: u16 },
    /// Input subsystem enumeration. Vendor id is the udev `ID_VENDOR_ID`
    /// property, lower-case hex without prefix.
    Input { vendor_id_hex: Box<str>, joystick: bool },
}

/// Snapshot of a discovered device at detection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub node_id: NodeId,
    pub identity: DeviceIdentity,
    /// Node that delivers raw reports, when it differs from `node_id`.
    pub report_node: Option<PathBuf>,
    pub name: Option<String>,
}

impl DeviceDescriptor {
    pub fn usb(node_id: impl Into<NodeId>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            node_id: node_id.into(),
            identity: DeviceIdentity::Usb {
                vendor_id,
                product_id,
            },
            report_node: None,
            name: None,
        }
    }

    pub fn input(
        node_id: impl Into<NodeId>,
        vendor_id_hex: impl Into<Box<str>>,
        joystick: bool,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            identity: DeviceIdentity::Input {
                vendor_id_hex: vendor_id_hex.into(),
                joystick,
            },
            report_node: None,
            name: None,
        }
    }

    #[must_use]
    pub fn with_report_node(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_node = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            DeviceIdentity::Usb {
                vendor_id,
                product_id,
            } => write!(f, "{} [{vendor_id:04x}:{product_id:04x}]", self.node_id)?,
            DeviceIdentity::Input {
                vendor_id_hex,
                joystick,
            } => {
                let kind = if *joystick { "joystick" } else { "input" };
                write!(f, "{} [{vendor_id_hex}, {kind}]", self.node_id)?;
            }
        }
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

/// Controller family the monitor is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDevice {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for TargetDevice {
    fn default() -> Self {
        Self {
            vendor_id: SONY_VENDOR_ID,
            product_id: DUALSHOCK4_V2_PRODUCT_ID,
        }
    }
}

impl TargetDevice {
    /// Whether a discovered device belongs to the target family.
    ///
    /// Input-subsystem devices carry no product id, so they are matched on
    /// vendor, joystick capability and an evdev node instead.
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        match &descriptor.identity {
            DeviceIdentity::Usb {
                vendor_id,
                product_id,
            } => *vendor_id == self.vendor_id && *product_id == self.product_id,
            DeviceIdentity::Input {
                vendor_id_hex,
                joystick,
            } => {
                *joystick
                    && vendor_id_hex.as_ref() == self.vendor_id_hex()
                    && descriptor.node_id.starts_with(INPUT_EVENT_PREFIX)
            }
        }
    }

    fn vendor_id_hex(self) -> String {
        format!("{:04x}", self.vendor_id)
    }
}
