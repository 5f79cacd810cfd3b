use std::io;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{select, unbounded, Sender};
use ds4tap_device::{
    spawn_reader, DeviceDescriptor, DeviceRegistry, Discovery, ReaderConfig, ReaderEvent,
    ReaderHandle, Registration, TargetDevice, Transport,
};

use crate::config::{BackendKind, Config};
use crate::console::{format_telemetry, Console};
use crate::error::StartupError;
use crate::record::{Recorder, Sample};
use crate::{print_debug, print_error, print_info, print_warning};

type Registry = Arc<DeviceRegistry<ReaderHandle>>;

/// Opens a discovery backend of the given kind.
pub(crate) fn discovery(kind: BackendKind) -> Result<Box<dyn Discovery>, StartupError> {
    match kind {
        #[cfg(feature = "hidapi-backend")]
        BackendKind::Hid => Ok(Box::new(ds4tap_device::backend::hid::HidBackend::new()?)),
        #[cfg(all(feature = "udev-backend", target_os = "linux"))]
        BackendKind::Udev => Ok(Box::new(ds4tap_device::backend::udev::UdevBackend::new()?)),
        #[allow(unreachable_patterns)]
        other => Err(StartupError::BackendUnavailable(other)),
    }
}

/// Prints discovered devices, matching ones marked with `*`.
pub(crate) fn list(kind: BackendKind, target: TargetDevice, all: bool) -> Result<(), StartupError> {
    let devices = discovery(kind)?.enumerate()?;
    let mut console = Console::new();
    let mut shown = 0;
    for device in &devices {
        let matching = target.matches(device);
        if !matching && !all {
            continue;
        }
        let mark = if matching { '*' } else { ' ' };
        console.line(&format!("{mark} {device}"))?;
        shown += 1;
    }
    if shown == 0 {
        print_info!(
            "no controller matching {:04x}:{:04x}",
            target.vendor_id,
            target.product_id
        );
    }
    Ok(())
}

/// Fails with [`StartupError::DeviceNotFound`] when the snapshot holds no
/// matching controller and one is required.
fn check_attached(config: &Config, snapshot: &[DeviceDescriptor]) -> Result<(), StartupError> {
    let found = snapshot
        .iter()
        .filter(|descriptor| config.target.matches(descriptor))
        .count();
    if found > 0 {
        print_debug!("{found} matching controller(s) attached");
        return Ok(());
    }
    if config.require_device {
        return Err(StartupError::DeviceNotFound(config.target));
    }
    print_warning!("no controller attached yet");
    Ok(())
}

fn reader_starter(
    transport: Arc<dyn Transport>,
    registry: Registry,
    config: ReaderConfig,
    events: Sender<ReaderEvent>,
) -> impl FnMut(&DeviceDescriptor, Registration) -> io::Result<ReaderHandle> + Send + 'static {
    move |descriptor, registration| {
        spawn_reader(
            Arc::clone(&transport),
            descriptor.clone(),
            registration,
            Arc::clone(&registry),
            config,
            events.clone(),
        )
    }
}

/// Starts readers for the attached controllers. The hid backend has no
/// hot-plug stream, so the monitor finishes right after draining.
#[cfg(feature = "hidapi-backend")]
fn start_hid(
    config: &Config,
    reader: ReaderConfig,
    registry: &Registry,
    events: Sender<ReaderEvent>,
) -> Result<(), StartupError> {
    use ds4tap_device::backend::hid::HidBackend;
    use ds4tap_device::HotplugMonitor;

    let backend = HidBackend::new()?;
    let snapshot = backend.enumerate()?;
    check_attached(config, &snapshot)?;

    let transport: Arc<dyn Transport> = Arc::new(backend);
    let start = reader_starter(transport, Arc::clone(registry), reader, events);
    let mut monitor = HotplugMonitor::new(config.target, Arc::clone(registry), start);
    monitor.drain(snapshot);
    monitor.run(std::iter::empty());
    Ok(())
}

/// Checks the attached devices, then hands discovery to a hot-plug thread.
///
/// libudev handles stay on the thread that created them, so the thread
/// builds its own backend. It subscribes before enumerating; a device that
/// shows up in both is deduplicated by the registry.
#[cfg(all(feature = "udev-backend", feature = "hidapi-backend", target_os = "linux"))]
fn start_udev(
    config: &Config,
    reader: ReaderConfig,
    registry: &Registry,
    events: Sender<ReaderEvent>,
) -> Result<(), StartupError> {
    use ds4tap_device::backend::hid::HidBackend;
    use ds4tap_device::backend::udev::UdevBackend;
    use ds4tap_device::{EventSource, HotplugMonitor};

    let snapshot = UdevBackend::new()?.enumerate()?;
    check_attached(config, &snapshot)?;

    let transport: Arc<dyn Transport> = Arc::new(HidBackend::new()?);
    let start = reader_starter(transport, Arc::clone(registry), reader, events);
    let registry = Arc::clone(registry);
    let target = config.target;

    std::thread::Builder::new()
        .name("ds4tap-hotplug".into())
        .spawn(move || {
            let run = || -> ds4tap_device::Result<()> {
                let backend = UdevBackend::new()?;
                let stream = backend.subscribe()?;
                let snapshot = backend.enumerate()?;

                let mut monitor = HotplugMonitor::new(target, registry, start);
                monitor.drain(snapshot);
                print_debug!("following hot-plug events");
                monitor.run(stream);
                Ok(())
            };
            if let Err(err) = run() {
                print_error!("hot-plug monitor failed: {err}");
            }
        })?;
    Ok(())
}

fn start(
    config: &Config,
    reader: ReaderConfig,
    registry: &Registry,
    events: Sender<ReaderEvent>,
) -> Result<(), StartupError> {
    match config.backend {
        #[cfg(feature = "hidapi-backend")]
        BackendKind::Hid => start_hid(config, reader, registry, events),
        #[cfg(all(feature = "udev-backend", feature = "hidapi-backend", target_os = "linux"))]
        BackendKind::Udev => start_udev(config, reader, registry, events),
        #[allow(unreachable_patterns)]
        other => {
            drop(events);
            Err(StartupError::BackendUnavailable(other))
        }
    }
}

/// Logs the readers still registered when the session ends.
fn report_active(registry: &Registry) {
    for node in registry.nodes() {
        registry.with_handle(&node, |handle| {
            let uptime = handle.started_at.elapsed().as_secs_f64();
            if handle.is_finished() {
                print_warning!("{}: reader exited without releasing its slot", handle.descriptor);
            } else {
                print_debug!("{}: read for {uptime:.1}s", handle.descriptor);
            }
        });
    }
}

/// Runs a telemetry session until Ctrl+C or until every reader is gone
/// and no more can appear.
pub(crate) fn run(config: &Config, quiet: bool) -> Result<(), StartupError> {
    let (stop_tx, stop_rx) = unbounded::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let reader = ReaderConfig {
        read_timeout: config.reader.read_timeout,
        min_report_len: config.reader.min_report_len,
        buffer_len: config.reader.buffer_len,
        session_start: Instant::now(),
    };
    let registry: Registry = Arc::new(DeviceRegistry::new());
    let (event_tx, event_rx) = unbounded::<ReaderEvent>();
    start(config, reader, &registry, event_tx)?;

    let mut recorder = config.record.enabled.then(Recorder::new);
    let mut console = (!quiet).then(Console::new);
    print_info!("ds4tap started ({} backend). Press Ctrl+C to stop.", config.backend);

    loop {
        select! {
            recv(stop_rx) -> _ => {
                break;
            }
            recv(event_rx) -> msg => {
                match msg {
                    Ok(ReaderEvent::Attached(descriptor)) => {
                        print_info!("reading {descriptor}");
                    }
                    Ok(ReaderEvent::Sample { node_id, telemetry }) => {
                        if let Some(recorder) = recorder.as_mut() {
                            recorder.push(Sample::from(&telemetry));
                        }
                        let Some(console) = console.as_mut() else {
                            continue;
                        };
                        let node = (registry.len() > 1).then_some(&*node_id);
                        if let Err(err) = console.line(&format_telemetry(node, &telemetry)) {
                            print_error!("failed to write telemetry: {err}");
                            break;
                        }
                    }
                    Ok(ReaderEvent::Invalid { node_id, error }) => {
                        print_debug!("{node_id}: report skipped: {error}");
                    }
                    Ok(ReaderEvent::Detached { node_id, reason, uptime }) => {
                        match uptime {
                            Some(uptime) => {
                                print_warning!(
                                    "{node_id}: controller detached after {:.1}s: {reason}",
                                    uptime.as_secs_f64()
                                );
                            }
                            None => {
                                print_warning!("{node_id}: controller detached: {reason}");
                            }
                        }
                    }
                    Err(_) => {
                        print_info!("no controllers left");
                        break;
                    }
                }
            }
        }
    }

    report_active(&registry);

    if let Some(recorder) = recorder {
        let path = recorder.save(&config.record.dir, chrono::Local::now())?;
        print_info!("Saved {} samples to {}", recorder.len(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreign_devices() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::usb("/dev/hidraw0", 0x046d, 0xc52b),
            DeviceDescriptor::usb("/dev/hidraw1", 0x054c, 0x05c4),
            DeviceDescriptor::input("/dev/input/event3", "054c", false),
        ]
    }

    #[test]
    fn missing_controller_fails_startup_with_exit_code_2() {
        let config = Config::default();
        let err = check_attached(&config, &foreign_devices()).expect_err("no match");
        assert!(matches!(err, StartupError::DeviceNotFound(target) if target == config.target));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_controller_is_tolerated_when_not_required() {
        let config = Config {
            require_device: false,
            ..Config::default()
        };
        assert!(check_attached(&config, &foreign_devices()).is_ok());
        assert!(check_attached(&config, &[]).is_ok());
    }

    #[test]
    fn attached_controller_passes_check() {
        let mut snapshot = foreign_devices();
        snapshot.push(DeviceDescriptor::usb("/dev/hidraw2", 0x054c, 0x09cc));
        assert!(check_attached(&Config::default(), &snapshot).is_ok());
    }

    #[test]
    fn other_startup_errors_exit_with_code_1() {
        let errors = [
            StartupError::BackendUnavailable(BackendKind::Hid),
            StartupError::Transport(ds4tap_device::TransportError::Other("hid".into())),
            StartupError::Io(io::Error::other("disk")),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err}");
        }
    }
}
