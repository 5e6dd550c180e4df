/*!
Storage backends for save slots.

This module defines the storage abstraction (port) and its two adapters. The
Steam build keeps one directory per slot; the Apple Arcade build keeps every
slot inside a single property list. The sync engine only ever sees
[`SaveStorage`], so the codec and decoder logic never has to know which
layout it is talking to.
*/

pub mod container;
pub mod directory;

use crate::config::BackendKind;
use crate::slot::{LoadedSlot, SaveBlobs, Slot};
use crate::Result;

pub use container::ContainerStorage;
pub use directory::DirectoryStorage;

/// Lifecycle of a backend instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Nothing has been read yet
    Unloaded,
    /// The last call was a successful `load`
    Loaded,
    /// The last call was a successful `persist`
    Persisted,
}

/// Storage abstraction for reading and writing a slot's blob pair
///
/// This trait defines the interface that both save layouts provide.
/// Implementations never interpret blob contents.
#[cfg_attr(test, mockall::automock)]
pub trait SaveStorage {
    /// Which layout this backend reads and writes
    fn kind(&self) -> BackendKind;

    /// Current lifecycle state
    fn state(&self) -> BackendState;

    /// Load both blobs of a slot
    ///
    /// Reads from disk on every call, so calling it again observes changes
    /// made by other writers.
    ///
    /// # Arguments
    /// * `slot` - The save slot to read
    ///
    /// # Returns
    /// The blob pair, flagged `Fresh` when a backend treats a missing save as empty
    fn load(&mut self, slot: Slot) -> Result<LoadedSlot>;

    /// Replace both blobs of a slot
    ///
    /// Each call is a full overwrite of the slot; other slots are untouched.
    ///
    /// # Arguments
    /// * `slot` - The save slot to write
    /// * `blobs` - The meta and profile blobs to store
    ///
    /// # Returns
    /// Result indicating success or failure
    fn persist(&mut self, slot: Slot, blobs: &SaveBlobs) -> Result<()>;
}

impl<S: SaveStorage + ?Sized> SaveStorage for Box<S> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn state(&self) -> BackendState {
        (**self).state()
    }

    fn load(&mut self, slot: Slot) -> Result<LoadedSlot> {
        (**self).load(slot)
    }

    fn persist(&mut self, slot: Slot, blobs: &SaveBlobs) -> Result<()> {
        (**self).persist(slot, blobs)
    }
}

/// Memory-based storage backend for testing
///
/// Stores slots in a HashMap. Missing slots load as `Fresh`, like the container layout.
#[cfg(test)]
pub struct MemoryStorage {
    kind: BackendKind,
    state: BackendState,
    pub slots: std::collections::HashMap<Slot, SaveBlobs>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            state: BackendState::Unloaded,
            slots: std::collections::HashMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: Slot, blobs: SaveBlobs) -> Self {
        self.slots.insert(slot, blobs);
        self
    }
}

#[cfg(test)]
impl SaveStorage for MemoryStorage {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, slot: Slot) -> Result<LoadedSlot> {
        self.state = BackendState::Loaded;
        Ok(self
            .slots
            .get(&slot)
            .cloned()
            .map_or_else(LoadedSlot::fresh, LoadedSlot::existing))
    }

    fn persist(&mut self, slot: Slot, blobs: &SaveBlobs) -> Result<()> {
        self.slots.insert(slot, blobs.clone());
        self.state = BackendState::Persisted;
        Ok(())
    }
}
