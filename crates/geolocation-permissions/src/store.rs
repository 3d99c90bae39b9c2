use std::collections::BTreeSet;

use dashmap::DashMap;
use geoperm_core_types::Origin;

use crate::metrics;

/// Process-wide table of remembered origin decisions.
///
/// Shared by every tab of a [`crate::PermissionService`]. Writing the table to
/// stable storage is left to the embedder.
#[derive(Debug, Default)]
pub struct PermissionStore {
    remembered: DashMap<Origin, bool>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &Origin) -> Option<bool> {
        self.remembered.get(origin).map(|entry| *entry.value())
    }

    /// Remembered decision for `origin`, `false` when nothing is stored.
    pub fn get_allowed(&self, origin: &Origin) -> bool {
        self.get(origin).unwrap_or(false)
    }

    pub fn set(&self, origin: Origin, allow: bool) {
        if self.remembered.insert(origin, allow).is_none() {
            metrics::adjust_remembered(1);
        }
    }

    /// Returns whether an entry was removed.
    pub fn clear(&self, origin: &Origin) -> bool {
        let removed = self.remembered.remove(origin).is_some();
        if removed {
            metrics::adjust_remembered(-1);
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut removed = 0;
        self.remembered.retain(|_, _| {
            removed += 1;
            false
        });
        metrics::adjust_remembered(-removed);
    }

    pub fn list_origins(&self) -> BTreeSet<Origin> {
        self.remembered
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.remembered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remembered.is_empty()
    }
}

impl Drop for PermissionStore {
    fn drop(&mut self) {
        metrics::adjust_remembered(-(self.remembered.len() as i64));
    }
}
