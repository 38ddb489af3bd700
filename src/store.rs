//! Artifact store - the single shared slot readers and the reloader share.
//!
//! One mutable slot behind `Arc<RwLock<T>>`. The swap overwrites the slot's
//! contents in place and never replaces the handle, so every clone taken
//! before a reload observes post-reload contents. Readers take shared
//! access around every use of the artifact; the coordinator takes exclusive
//! access only for the overwrite itself.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

/// Clonable handle to the shared artifact slot.
///
/// At any instant the slot holds a fully constructed artifact: a reader
/// mid-read when a swap begins finishes against the old artifact, a reader
/// that starts after [`swap`](ArtifactStore::swap) returns sees the new one,
/// and nothing in between is ever observable.
#[derive(Debug, Default)]
pub struct ArtifactStore<T> {
    slot: Arc<RwLock<T>>,
}

impl<T> Clone for ArtifactStore<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> ArtifactStore<T> {
    /// Create a store holding `initial` until the first successful compile.
    pub fn new(initial: T) -> Self {
        Self {
            slot: Arc::new(RwLock::new(initial)),
        }
    }

    /// Adopt a caller-owned slot.
    ///
    /// Use this when the host process already guards its artifact with a
    /// lock of its own; the coordinator and every reader then serialize
    /// through the same primitive.
    pub fn from_shared(slot: Arc<RwLock<T>>) -> Self {
        Self { slot }
    }

    /// Shared access for readers. Hold the guard for the whole read.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.read()
    }

    /// Scoped shared read.
    pub fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.read())
    }

    /// Replace the held artifact in place under exclusive access.
    pub fn swap(&self, new: T) {
        *self.slot.write() = new;
    }

    /// The underlying shared slot, for callers that want to hold it directly.
    pub fn shared(&self) -> Arc<RwLock<T>> {
        Arc::clone(&self.slot)
    }
}
