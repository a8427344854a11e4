//! Resource reads awaited before the next trigger evaluation

use std::collections::HashSet;

use crate::lwm2m::ResourcePath;

/// Set of paths the server has asked the device for and not yet heard back on
#[derive(Debug, Clone, Default)]
pub struct PendingObservations {
    paths: HashSet<ResourcePath>,
}

impl PendingObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; adding it twice is a no-op
    pub fn mark_awaiting(&mut self, path: ResourcePath) {
        self.paths.insert(path);
    }

    /// Remove a path.
    ///
    /// Returns true only when this call removed the last outstanding path.
    /// Resolving a path that is not pending leaves the set untouched.
    pub fn resolve(&mut self, path: &ResourcePath) -> bool {
        self.paths.remove(path) && self.paths.is_empty()
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.paths.contains(path)
    }

    /// Replace the pending set with a fresh batch of paths
    pub fn rearm(&mut self, paths: impl IntoIterator<Item = ResourcePath>) {
        self.paths.clear();
        for path in paths {
            self.mark_awaiting(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Pending paths in a stable order
    pub fn paths(&self) -> Vec<ResourcePath> {
        let mut paths: Vec<ResourcePath> = self.paths.iter().copied().collect();
        paths.sort();
        paths
    }
}
