use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use hidapi::{HidApi, HidDevice, HidError};

use crate::descriptor::{DeviceDescriptor, DeviceIdentity};
use crate::error::{Result, TransportError};
use crate::transport::{Discovery, ReportSource, Transport};

/// hidapi-backed discovery and transport. Cheap to clone.
#[derive(Clone)]
pub struct HidBackend {
    api: Arc<Mutex<HidApi>>,
    resolver: ReportNodeResolver,
}

impl HidBackend {
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            resolver: ReportNodeResolver::default(),
        })
    }
}

const HIDRAW_LOOKUP_ATTEMPTS: u32 = 10;
const HIDRAW_LOOKUP_DELAY: Duration = Duration::from_millis(50);

/// Picks the node hidapi should open for a descriptor.
///
/// Input-subsystem nodes are evdev devices that hidapi cannot open. Their
/// hidraw sibling is looked up in sysfs, retrying for a short while since
/// the kernel announces the input device before it connects hidraw.
#[derive(Debug, Clone)]
struct ReportNodeResolver {
    sys_root: PathBuf,
    attempts: u32,
    delay: Duration,
}

impl Default for ReportNodeResolver {
    fn default() -> Self {
        Self {
            sys_root: PathBuf::from("/sys"),
            attempts: HIDRAW_LOOKUP_ATTEMPTS,
            delay: HIDRAW_LOOKUP_DELAY,
        }
    }
}

impl ReportNodeResolver {
    fn resolve(&self, descriptor: &DeviceDescriptor) -> Result<PathBuf> {
        if let Some(node) = &descriptor.report_node {
            return Ok(node.clone());
        }
        if let DeviceIdentity::Usb { .. } = descriptor.identity {
            return Ok(PathBuf::from(&*descriptor.node_id));
        }

        for attempt in 0..self.attempts {
            if attempt > 0 {
                std::thread::sleep(self.delay);
            }
            if let Some(node) = self.hidraw_of(&descriptor.node_id) {
                log::debug!("{}: resolved report node {}", descriptor.node_id, node.display());
                return Ok(node);
            }
        }
        Err(TransportError::Other(format!(
            "no hidraw node for {}",
            descriptor.node_id
        )))
    }

    /// `/sys/class/input/eventN/device/device/hidraw/hidrawM` -> `/dev/hidrawM`.
    fn hidraw_of(&self, node_id: &str) -> Option<PathBuf> {
        let event = Path::new(node_id).file_name()?;
        let dir = self
            .sys_root
            .join("class/input")
            .join(event)
            .join("device/device/hidraw");
        std::fs::read_dir(dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name())
            .find(|name| name.to_string_lossy().starts_with("hidraw"))
            .map(|name| Path::new("/dev").join(name))
    }
}

impl Discovery for HidBackend {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        api.refresh_devices()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let devices = api
            .device_list()
            .map(|info| {
                let path = info.path().to_string_lossy();
                let descriptor =
                    DeviceDescriptor::usb(&*path, info.vendor_id(), info.product_id());
                match info.product_string() {
                    Some(name) => descriptor.with_name(name),
                    None => descriptor,
                }
            })
            .collect();
        Ok(devices)
    }
}

impl Transport for HidBackend {
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn ReportSource>> {
        let node = self.resolver.resolve(descriptor)?;
        let path = CString::new(node.to_string_lossy().as_bytes())
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        let device = api.open_path(&path).map_err(|e| {
            TransportError::Other(format!("failed to open {}: {e}", path.to_string_lossy()))
        })?;
        Ok(Box::new(HidReportSource { device }))
    }
}

struct HidReportSource {
    device: HidDevice,
}

impl ReportSource for HidReportSource {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match self.device.read_timeout(buf, timeout_ms) {
            Ok(0) => Err(TransportError::Timeout),
            Ok(len) => Ok(len),
            Err(err) => Err(map_read_error(&err)),
        }
    }
}

// hidapi reports an unplugged device as a generic read error.
fn map_read_error(err: &HidError) -> TransportError {
    TransportError::Disconnected(err.to_string())
}
