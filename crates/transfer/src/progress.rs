use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::trace;
use uuid::Uuid;

/// Opaque handle of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(Uuid);

impl TransferId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Point-in-time progress of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub id: TransferId,
    pub file_name: String,
    /// Percent in `0..=100`. Never decreases for a given transfer.
    pub percent: u8,
}

/// Callback invoked with every progress change.
pub type ProgressCallback = Box<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Progress of every in-flight transfer, keyed by [`TransferId`].
///
/// Entries are inserted when a transfer starts and removed explicitly when
/// it finishes, so concurrent transfers of the same file name never clash.
#[derive(Default)]
pub struct ProgressRegistry {
    entries: RwLock<HashMap<TransferId, ProgressSnapshot>>,
    callbacks: RwLock<Vec<ProgressCallback>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    /// Starts tracking a transfer at 0 %.
    pub fn insert(&self, file_name: impl Into<String>) -> TransferId {
        let id = TransferId::new();
        let snapshot = ProgressSnapshot {
            id,
            file_name: file_name.into(),
            percent: 0,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, snapshot);
        id
    }

    /// Raises the percent of `id` to `percent` (capped at 100).
    ///
    /// Lower values are ignored. Returns the stored snapshot, or `None` if
    /// the transfer is not tracked.
    pub fn update(&self, id: TransferId, percent: u8) -> Option<ProgressSnapshot> {
        let percent = percent.min(100);
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.get_mut(&id)?;
            if percent <= entry.percent {
                return Some(entry.clone());
            }
            entry.percent = percent;
            entry.clone()
        };

        trace!(transfer = %id, percent, "progress");
        let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner);
        for cb in callbacks.iter() {
            cb(&snapshot);
        }
        Some(snapshot)
    }

    /// Stops tracking a transfer, returning its last snapshot.
    pub fn remove(&self, id: TransferId) -> Option<ProgressSnapshot> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Returns the current snapshot of a transfer.
    pub fn get(&self, id: TransferId) -> Option<ProgressSnapshot> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of tracked transfers.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("transfers", &self.len())
            .finish()
    }
}
