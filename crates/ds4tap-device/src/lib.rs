//! Device discovery and report reading for `DualShock` 4 controllers.
//!
//! A [`HotplugMonitor`] walks the attached devices, then follows hot-plug
//! events. Every matching node gets exactly one reader thread, tracked in a
//! [`DeviceRegistry`]. Readers decode reports and publish [`ReaderEvent`]s.

pub mod backend;
mod descriptor;
mod error;
mod monitor;
mod reader;
mod registry;
mod transport;

pub use crate::descriptor::{
    DeviceDescriptor, DeviceIdentity, NodeId, TargetDevice, DUALSHOCK4_V2_PRODUCT_ID,
    INPUT_EVENT_PREFIX, SONY_VENDOR_ID,
};
pub use crate::error::{Result, TransportError};
pub use crate::monitor::{HotplugAction, HotplugEvent, HotplugMonitor, MonitorState};
pub use crate::reader::{
    spawn_reader, ReaderConfig, ReaderEvent, ReaderExit, ReaderHandle, ReaderTask,
    DEFAULT_READ_TIMEOUT,
};
pub use crate::registry::{DeviceRegistry, Registration};
pub use crate::transport::{Discovery, EventSource, HotplugStream, ReportSource, Transport};
