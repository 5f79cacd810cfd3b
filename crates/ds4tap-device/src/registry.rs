use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;

use crate::descriptor::NodeId;

/// Proof of one successful insertion into a [`DeviceRegistry`].
///
/// Handed to the reader start function so the reader can later release
/// exactly the slot it was started for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
    node_id: NodeId,
    generation: u64,
}

impl Registration {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Entry<H> {
    generation: u64,
    handle: H,
}

/// Node id to active reader mapping. At most one reader per node.
///
/// All mutation goes through [`DeviceRegistry::register`] (or its fallible
/// twin) and [`DeviceRegistry::release`], both atomic with respect to each
/// other.
pub struct DeviceRegistry<H> {
    entries: Mutex<AHashMap<NodeId, Entry<H>>>,
    next_generation: AtomicU64,
}

impl<H> Default for DeviceRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> DeviceRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Starts a reader for `node_id` unless one is already registered.
    ///
    /// Returns `false` without calling `start` when the node is present.
    /// `start` runs under the registry lock, so concurrent callers racing on
    /// the same node start at most one reader.
    pub fn register<F>(&self, node_id: &str, start: F) -> bool
    where
        F: FnOnce(Registration) -> H,
    {
        let result: Result<bool, std::convert::Infallible> =
            self.try_register(node_id, |registration| Ok(start(registration)));
        match result {
            Ok(inserted) => inserted,
            Err(never) => match never {},
        }
    }

    /// Like [`register`](Self::register), but `start` may fail, in which
    /// case nothing is stored and the error is returned.
    pub fn try_register<F, E>(&self, node_id: &str, start: F) -> Result<bool, E>
    where
        F: FnOnce(Registration) -> Result<H, E>,
    {
        let mut entries = self.lock();
        if entries.contains_key(node_id) {
            return Ok(false);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            node_id: node_id.into(),
            generation,
        };
        let handle = start(registration)?;
        entries.insert(node_id.into(), Entry { generation, handle });
        Ok(true)
    }

    /// Frees the slot taken by `registration`, returning its handle.
    ///
    /// A slot that has since been taken by a newer registration is left
    /// alone.
    pub fn release(&self, registration: &Registration) -> Option<H> {
        let mut entries = self.lock();
        let owned = entries
            .get(&registration.node_id)
            .is_some_and(|entry| entry.generation == registration.generation);
        if !owned {
            return None;
        }
        entries
            .remove(&registration.node_id)
            .map(|entry| entry.handle)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.lock().contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of registered node ids.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.lock().keys().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Runs `f` with the handle registered for `node_id`, if any.
    pub fn with_handle<R>(&self, node_id: &str, f: impl FnOnce(&H) -> R) -> Option<R> {
        self.lock().get(node_id).map(|entry| f(&entry.handle))
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<NodeId, Entry<H>>> {
        // A panicking start function leaves the map untouched.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn second_registration_of_same_node_is_a_no_op() {
        let registry = DeviceRegistry::new();
        let mut started = 0;

        assert!(registry.register("/dev/input/event5", |_| {
            started += 1;
            "first"
        }));
        assert!(!registry.register("/dev/input/event5", |_| {
            started += 1;
            "second"
        }));

        assert_eq!(started, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.with_handle("/dev/input/event5", |h| *h), Some("first"));
    }

    #[test]
    fn distinct_nodes_get_distinct_readers() {
        let registry = DeviceRegistry::new();
        assert!(registry.register("a", |_| ()));
        assert!(registry.register("b", |_| ()));
        assert_eq!(registry.nodes(), vec![NodeId::from("a"), NodeId::from("b")]);
    }

    #[test]
    fn failed_start_leaves_node_free() {
        let registry: DeviceRegistry<()> = DeviceRegistry::new();
        let result = registry.try_register("a", |_| Err("open failed"));
        assert_eq!(result, Err("open failed"));
        assert!(!registry.contains("a"));
        assert!(registry.register("a", |_| ()));
    }

    #[test]
    fn release_reclaims_slot_for_reattachment() {
        let registry = DeviceRegistry::new();
        let mut token = None;
        registry.register("a", |registration| token = Some(registration));
        let token = token.expect("start called");

        assert_eq!(registry.release(&token), Some(()));
        assert!(registry.is_empty());
        assert!(registry.register("a", |_| ()));
    }

    #[test]
    fn stale_release_does_not_evict_newer_reader() {
        let registry = DeviceRegistry::new();
        let mut first = None;
        registry.register("a", |registration| first = Some(registration));
        let first = first.expect("start called");
        registry.release(&first);

        let mut second = None;
        registry.register("a", |registration| second = Some(registration));
        let second = second.expect("start called");
        assert_ne!(first.generation(), second.generation());

        assert_eq!(registry.release(&first), None);
        assert!(registry.contains("a"));
        assert_eq!(registry.release(&second), Some(()));
    }

    #[test]
    fn concurrent_registration_starts_exactly_one_reader() {
        const THREADS: usize = 16;
        let registry = Arc::new(DeviceRegistry::new());
        let started = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let started = Arc::clone(&started);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.register("/dev/input/event9", |_| {
                        started.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        let inserted = workers
            .into_iter()
            .map(|w| w.join().expect("worker panicked"))
            .filter(|inserted| *inserted)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }
}
