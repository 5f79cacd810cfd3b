use std::io;
use std::sync::Arc;

use crate::descriptor::{DeviceDescriptor, TargetDevice};
use crate::registry::{DeviceRegistry, Registration};

/// What happened to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HotplugAction {
    Add,
    Remove,
    Change,
    Other(Box<str>),
}

impl HotplugAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "add" => HotplugAction::Add,
            "remove" => HotplugAction::Remove,
            "change" => HotplugAction::Change,
            other => HotplugAction::Other(other.into()),
        }
    }
}

/// A device attach/detach notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub descriptor: DeviceDescriptor,
}

impl HotplugEvent {
    pub fn add(descriptor: DeviceDescriptor) -> Self {
        Self {
            action: HotplugAction::Add,
            descriptor,
        }
    }

    pub fn remove(descriptor: DeviceDescriptor) -> Self {
        Self {
            action: HotplugAction::Remove,
            descriptor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Walking the snapshot of already attached devices.
    Draining,
    /// Following the live event stream. Final.
    Live,
}

/// Drives device discovery: drains the attached devices once, then follows
/// the live stream, starting one reader per matching node.
pub struct HotplugMonitor<H, S> {
    target: TargetDevice,
    registry: Arc<DeviceRegistry<H>>,
    start: S,
    state: MonitorState,
}

impl<H, S> HotplugMonitor<H, S>
where
    S: FnMut(&DeviceDescriptor, Registration) -> io::Result<H>,
{
    pub fn new(target: TargetDevice, registry: Arc<DeviceRegistry<H>>, start: S) -> Self {
        Self {
            target,
            registry,
            start,
            state: MonitorState::Draining,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry<H>> {
        &self.registry
    }

    /// Registers every matching device from `snapshot` and switches to the
    /// live state. Returns how many readers were started.
    pub fn drain<I>(&mut self, snapshot: I) -> usize
    where
        I: IntoIterator<Item = DeviceDescriptor>,
    {
        if self.state == MonitorState::Live {
            log::debug!("snapshot ignored, monitor is already live");
            return 0;
        }

        let started = snapshot
            .into_iter()
            .filter(|descriptor| self.offer(descriptor))
            .count();
        self.state = MonitorState::Live;
        log::debug!("initial enumeration done, {started} reader(s) started");
        started
    }

    /// Handles one live event. Returns whether a reader was started.
    ///
    /// Does not change the state; only [`drain`](Self::drain) moves the
    /// monitor to [`MonitorState::Live`].
    pub fn handle_event(&mut self, event: &HotplugEvent) -> bool {
        if event.action != HotplugAction::Add {
            log::trace!("ignoring {:?} for {}", event.action, event.descriptor.node_id);
            return false;
        }
        self.offer(&event.descriptor)
    }

    /// Follows `events` until the stream ends. A live subscription never
    /// ends, so this only returns on backend failure.
    pub fn run<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = HotplugEvent>,
    {
        for event in events {
            self.handle_event(&event);
        }
        log::debug!("hot-plug event stream ended");
    }

    fn offer(&mut self, descriptor: &DeviceDescriptor) -> bool {
        if !self.target.matches(descriptor) {
            return false;
        }

        let start = &mut self.start;
        match self
            .registry
            .try_register(&descriptor.node_id, |registration| start(descriptor, registration))
        {
            Ok(true) => {
                log::info!("controller attached: {descriptor}");
                true
            }
            Ok(false) => {
                log::debug!("{} already has a reader", descriptor.node_id);
                false
            }
            Err(err) => {
                log::error!("failed to start reader for {}: {err}", descriptor.node_id);
                false
            }
        }
    }
}
