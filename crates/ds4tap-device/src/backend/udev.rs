use std::borrow::Cow;
use std::ffi::OsStr;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use libudev::{Context, Device, Enumerator, EventType, Monitor, MonitorSocket};

use crate::descriptor::DeviceDescriptor;
use crate::error::{Result, TransportError};
use crate::monitor::{HotplugAction, HotplugEvent};
use crate::transport::{Discovery, EventSource, HotplugStream};

const INPUT_SUBSYSTEM: &str = "input";
const HIDRAW_SUBSYSTEM: &str = "hidraw";

/// Input-subsystem discovery and hot-plug events through libudev.
///
/// libudev handles are not thread safe; create one per thread.
pub struct UdevBackend {
    context: Context,
}

impl UdevBackend {
    pub fn new() -> Result<Self> {
        let context = Context::new().map_err(|e| udev_error(&e))?;
        Ok(Self { context })
    }

    /// Finds the hidraw node under the same HID parent as `device`.
    fn report_node(&self, device: &Device) -> Option<PathBuf> {
        let mut parent = device.parent();
        while let Some(candidate) = parent {
            if candidate.property_value("HID_ID").is_some() {
                let mut enumerator = Enumerator::new(&self.context).ok()?;
                enumerator.match_parent(&candidate).ok()?;
                enumerator.match_subsystem(HIDRAW_SUBSYSTEM).ok()?;
                return enumerator
                    .scan_devices()
                    .ok()?
                    .find_map(|hidraw| hidraw.devnode().map(PathBuf::from));
            }
            parent = candidate.parent();
        }
        None
    }

    fn describe(&self, device: &Device) -> Option<DeviceDescriptor> {
        let node = device.devnode()?.to_string_lossy().into_owned();
        let vendor = property(device, "ID_VENDOR_ID").unwrap_or_default();
        let joystick = property(device, "ID_INPUT_JOYSTICK").as_deref() == Some("1");

        let mut descriptor = DeviceDescriptor::input(node, vendor, joystick);
        if joystick {
            if let Some(hidraw) = self.report_node(device) {
                descriptor = descriptor.with_report_node(hidraw);
            }
        }
        if let Some(name) = property(device, "ID_MODEL") {
            descriptor = descriptor.with_name(name);
        }
        Some(descriptor)
    }
}

impl Discovery for UdevBackend {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut enumerator = Enumerator::new(&self.context).map_err(|e| udev_error(&e))?;
        enumerator
            .match_subsystem(INPUT_SUBSYSTEM)
            .map_err(|e| udev_error(&e))?;
        let devices = enumerator.scan_devices().map_err(|e| udev_error(&e))?;
        Ok(devices.filter_map(|device| self.describe(&device)).collect())
    }
}

impl EventSource for UdevBackend {
    fn subscribe(&self) -> Result<HotplugStream> {
        let mut monitor = Monitor::new(&self.context).map_err(|e| udev_error(&e))?;
        monitor
            .match_subsystem(INPUT_SUBSYSTEM)
            .map_err(|e| udev_error(&e))?;
        let socket = monitor.listen().map_err(|e| udev_error(&e))?;
        let backend = UdevBackend::new()?;
        Ok(Box::new(UdevEvents { socket, backend }))
    }
}

struct UdevEvents {
    socket: MonitorSocket,
    backend: UdevBackend,
}

impl Iterator for UdevEvents {
    type Item = HotplugEvent;

    fn next(&mut self) -> Option<HotplugEvent> {
        loop {
            if let Some(event) = self.socket.receive_event() {
                let action = match event.event_type() {
                    EventType::Add => HotplugAction::Add,
                    EventType::Remove => HotplugAction::Remove,
                    EventType::Change => HotplugAction::Change,
                    EventType::Unknown => HotplugAction::Other("unknown".into()),
                };
                // Parent inputN devices carry no node.
                let Some(descriptor) = self.backend.describe(event.device()) else {
                    continue;
                };
                return Some(HotplugEvent { action, descriptor });
            }
            if let Err(err) = wait_readable(self.socket.as_raw_fd()) {
                log::error!("udev monitor socket failed: {err}");
                return None;
            }
        }
    }
}

/// Blocks until `fd` is readable. Retries on signal interruption.
fn wait_readable(fd: i32) -> std::io::Result<()> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        // SAFETY: `pollfd` is a valid, initialised array of one element.
        let ready = unsafe { libc::poll(&mut pollfd, 1, -1) };
        if ready >= 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn property(device: &Device, key: &str) -> Option<String> {
    device
        .property_value(key)
        .map(OsStr::to_string_lossy)
        .map(Cow::into_owned)
}

fn udev_error(err: &libudev::Error) -> TransportError {
    TransportError::Other(format!("udev: {err}"))
}
