//! Compilation lock table
//!
//! One coarse mutex guards every cache mutation; the per-path async locks
//! it hands out serialize compilation of a single library. The same mutex
//! guards a change counter per store path, bumped whenever cached work built
//! from that path is evicted. A compilation captures the counters of every
//! path it reads and only installs its result if none of them moved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Change counter of one store path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Generation {
    epoch: u64,
    path: u64,
}

/// State behind the global lock
#[derive(Default)]
pub(crate) struct LockState {
    paths: HashMap<String, Arc<AsyncMutex<()>>>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl LockState {
    pub(crate) fn generation(&self, path: &str) -> Generation {
        Generation {
            epoch: self.epoch,
            path: self.generations.get(path).copied().unwrap_or_default(),
        }
    }

    /// Invalidate in-flight compilations that read `path`
    pub(crate) fn bump(&mut self, path: &str) {
        *self.generations.entry(path.to_string()).or_default() += 1;
    }

    /// Invalidate every in-flight compilation
    pub(crate) fn bump_all(&mut self) {
        self.epoch += 1;
        self.generations.clear();
    }
}

#[derive(Default)]
pub(crate) struct LockTable {
    state: Mutex<LockState>,
}

impl LockTable {
    /// Take the global lock; held for the whole of an insert, evict or trim
    pub(crate) fn global(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock serializing compilation of the library at `path`
    pub(crate) fn path_lock(&self, path: &str) -> Arc<AsyncMutex<()>> {
        let mut state = self.global();
        Arc::clone(state.paths.entry(path.to_string()).or_default())
    }

    pub(crate) fn generation(&self, path: &str) -> Generation {
        self.global().generation(path)
    }
}

/// Store paths read by one compilation, with the generation seen for each
#[derive(Debug, Default)]
pub(crate) struct TouchedPaths {
    entries: Vec<(String, Generation)>,
}

impl TouchedPaths {
    /// Record `path`; the first generation seen for a path is kept
    pub(crate) fn record(&mut self, path: &str, generation: Generation) {
        if !self.entries.iter().any(|(p, _)| p == path) {
            self.entries.push((path.to_string(), generation));
        }
    }

    pub(crate) fn extend(&mut self, other: TouchedPaths) {
        for (path, generation) in other.entries {
            self.record(&path, generation);
        }
    }

    /// Whether no recorded path changed since it was read
    pub(crate) fn is_current(&self, state: &LockState) -> bool {
        self.entries
            .iter()
            .all(|(path, generation)| state.generation(path) == *generation)
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(path, _)| path.clone()).collect()
    }
}
