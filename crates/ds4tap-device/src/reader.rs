use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use ds4tap_report::{DecodeError, ReportDecoder, Telemetry, FULL_REPORT_LEN, MIN_REPORT_LEN};

use crate::descriptor::{DeviceDescriptor, NodeId};
use crate::error::TransportError;
use crate::registry::{DeviceRegistry, Registration};
use crate::transport::{ReportSource, Transport};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every reader of a session.
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    pub read_timeout: Duration,
    pub min_report_len: usize,
    pub buffer_len: usize,
    /// Telemetry timestamps are measured from here.
    pub session_start: Instant,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            min_report_len: MIN_REPORT_LEN,
            buffer_len: FULL_REPORT_LEN,
            session_start: Instant::now(),
        }
    }
}

/// Events emitted by readers, in report order per device.
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// The device was opened and reading started.
    Attached(DeviceDescriptor),
    /// A report decoded successfully.
    Sample { node_id: NodeId, telemetry: Telemetry },
    /// A report arrived but could not be decoded; the sample is skipped.
    Invalid { node_id: NodeId, error: DecodeError },
    /// The reader stopped and its registry slot was released. `uptime` is
    /// how long the slot was held, when it was still held.
    Detached {
        node_id: NodeId,
        reason: ReaderExit,
        uptime: Option<Duration>,
    },
}

/// Why a reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    Transport(TransportError),
    ConsumerClosed,
}

impl std::fmt::Display for ReaderExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderExit::Transport(err) => write!(f, "{err}"),
            ReaderExit::ConsumerClosed => f.write_str("consumer closed"),
        }
    }
}

/// Handle to a running reader. Owned by the registry.
#[derive(Debug)]
pub struct ReaderHandle {
    pub descriptor: DeviceDescriptor,
    pub started_at: Instant,
    thread: JoinHandle<()>,
}

impl ReaderHandle {
    /// A finished reader that is still registered has panicked.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Reads and decodes reports from one opened device.
pub struct ReaderTask {
    node_id: NodeId,
    source: Box<dyn ReportSource>,
    decoder: ReportDecoder,
    config: ReaderConfig,
    events: Sender<ReaderEvent>,
}

impl ReaderTask {
    pub fn new(
        node_id: NodeId,
        source: Box<dyn ReportSource>,
        config: ReaderConfig,
        events: Sender<ReaderEvent>,
    ) -> Self {
        Self {
            node_id,
            source,
            decoder: ReportDecoder::new(config.min_report_len),
            config,
            events,
        }
    }

    /// Reads until the transport fails or the consumer goes away.
    pub fn run(mut self) -> ReaderExit {
        let mut buf = vec![0u8; self.config.buffer_len.max(self.decoder.min_len())];
        loop {
            let len = match self.source.read(&mut buf, self.config.read_timeout) {
                Ok(len) => len,
                Err(TransportError::Timeout) => {
                    log::trace!("{}: no report within {:?}", self.node_id, self.config.read_timeout);
                    continue;
                }
                Err(err) => return ReaderExit::Transport(err),
            };

            let timestamp = self.config.session_start.elapsed();
            let event = match self.decoder.decode(&buf[..len], timestamp) {
                Ok(telemetry) => ReaderEvent::Sample {
                    node_id: self.node_id.clone(),
                    telemetry,
                },
                Err(error) => ReaderEvent::Invalid {
                    node_id: self.node_id.clone(),
                    error,
                },
            };
            if self.events.send(event).is_err() {
                return ReaderExit::ConsumerClosed;
            }
        }
    }
}

/// Spawns a reader thread for `descriptor`.
///
/// The thread opens the device, reads until it fails, then releases
/// `registration` from `registry` and reports [`ReaderEvent::Detached`].
pub fn spawn_reader(
    transport: Arc<dyn Transport>,
    descriptor: DeviceDescriptor,
    registration: Registration,
    registry: Arc<DeviceRegistry<ReaderHandle>>,
    config: ReaderConfig,
    events: Sender<ReaderEvent>,
) -> io::Result<ReaderHandle> {
    let thread_descriptor = descriptor.clone();
    let thread = thread::Builder::new()
        .name(format!("ds4tap-reader-{}", registration.generation()))
        .spawn(move || {
            let node_id = thread_descriptor.node_id.clone();
            let reason = match transport.open(&thread_descriptor) {
                Ok(source) => {
                    let _ = events.send(ReaderEvent::Attached(thread_descriptor));
                    ReaderTask::new(node_id.clone(), source, config, events.clone()).run()
                }
                Err(err) => ReaderExit::Transport(err),
            };

            log::debug!("{node_id}: reader stopped: {reason}");
            let uptime = registry
                .release(&registration)
                .map(|handle| handle.started_at.elapsed());
            let _ = events.send(ReaderEvent::Detached {
                node_id,
                reason,
                uptime,
            });
        })?;

    Ok(ReaderHandle {
        descriptor,
        started_at: Instant::now(),
        thread,
    })
}
