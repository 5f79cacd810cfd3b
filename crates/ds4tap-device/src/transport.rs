use std::time::Duration;

use crate::descriptor::DeviceDescriptor;
use crate::error::Result;
use crate::monitor::HotplugEvent;

/// Lazy, blocking sequence of hot-plug events. Infinite for a live
/// subscription.
pub type HotplugStream = Box<dyn Iterator<Item = HotplugEvent>>;

/// Snapshot enumeration of attached devices.
///
/// Implementations return every candidate they see, matching or not;
/// filtering is done by [`TargetDevice`](crate::TargetDevice).
pub trait Discovery {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;
}

/// Subscription to attach/detach notifications. Events that happened before
/// the subscription are not replayed.
pub trait EventSource {
    fn subscribe(&self) -> Result<HotplugStream>;
}

/// Opens devices for reading raw reports.
pub trait Transport: Send + Sync {
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn ReportSource>>;
}

/// An opened device, owned by exactly one reader.
pub trait ReportSource: Send {
    /// Blocks for at most `timeout` waiting for one report.
    ///
    /// Returns the number of bytes written into `buf` (never zero) or
    /// [`TransportError::Timeout`](crate::TransportError::Timeout) when no
    /// report arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}
