//! Pending run registry.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::run::RunId;

/// Thread-safe queue of sorted runs awaiting a merge.
///
/// The registry is the only state shared between concurrently running tasks. Every operation holds the lock
/// only for the duration of a queue operation, never across I/O. A run id is contained at most once.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<VecDeque<RunId>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        RunRegistry::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RunId>> {
        // the queue is left consistent by every critical section, so a poisoned lock is still usable
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a run to the registry tail.
    pub fn push(&self, id: RunId) {
        let mut runs = self.lock();
        debug_assert!(!runs.contains(&id), "{} registered twice", id);
        runs.push_back(id);
        log::trace!("registered {} (pending: {})", id, runs.len());
    }

    /// Takes ownership of the two runs at the registry front, if there are at least two.
    pub fn pop_pair(&self) -> Option<(RunId, RunId)> {
        let mut runs = self.lock();
        if runs.len() < 2 {
            return None;
        }

        let first = runs.pop_front()?;
        let second = runs.pop_front()?;

        return Some((first, second));
    }

    /// Takes the only remaining run. Returns [`None`] unless exactly one run is pending.
    pub fn take_last(&self) -> Option<RunId> {
        let mut runs = self.lock();
        if runs.len() != 1 {
            return None;
        }

        runs.pop_front()
    }

    /// Number of pending runs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of pending run ids in queue order.
    pub fn snapshot(&self) -> Vec<RunId> {
        self.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::RunRegistry;
    use crate::run::RunId;

    #[test]
    fn test_registry_fifo() {
        let registry = RunRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.pop_pair(), None);

        for id in 0..3 {
            registry.push(RunId(id));
        }

        assert_eq!(registry.take_last(), None);
        assert_eq!(registry.pop_pair(), Some((RunId(0), RunId(1))));
        assert_eq!(registry.pop_pair(), None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.take_last(), Some(RunId(2)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_concurrent_push() {
        let registry = RunRegistry::new();

        thread::scope(|s| {
            for worker in 0..8 {
                let registry = &registry;
                s.spawn(move || {
                    for i in 0..100 {
                        registry.push(RunId(worker * 100 + i));
                    }
                });
            }
        });

        let mut ids = registry.snapshot();
        ids.sort();
        assert_eq!(ids, Vec::from_iter((0..800).map(RunId)));
    }
}
