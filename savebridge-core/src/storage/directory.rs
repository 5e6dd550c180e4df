/*!
Steam layout: one directory per slot holding `meta.jkr` and `profile.jkr`.
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{BackendState, SaveStorage};
use crate::config::BackendKind;
use crate::slot::{BlobKind, LoadedSlot, SaveBlobs, Slot};
use crate::{Result, StorageError};

/// Directory-per-slot storage backend
///
/// Slot `N` lives under `<root>/N/`. A missing file is reported as
/// `StorageError::NotFound`; writing a slot creates its directory on demand.
///
/// # Example
/// ```rust
/// use savebridge_core::{DirectoryStorage, SaveBlobs, SaveStorage, Slot};
///
/// # let temp = tempfile::TempDir::new().unwrap();
/// let mut storage = DirectoryStorage::new(temp.path());
/// storage.persist(Slot::Two, &SaveBlobs::new(b"meta".to_vec(), b"profile".to_vec()))?;
/// assert_eq!(storage.load(Slot::Two)?.blobs.profile, b"profile");
/// # Ok::<(), savebridge_core::SaveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    /// Base directory containing the slot directories
    root: PathBuf,
    state: BackendState,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            state: BackendState::Unloaded,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one slot's files
    pub fn slot_dir(&self, slot: Slot) -> PathBuf {
        self.root.join(slot.as_str())
    }

    /// Full path of one blob file
    pub fn blob_path(&self, slot: Slot, kind: BlobKind) -> PathBuf {
        self.slot_dir(slot).join(kind.file_name())
    }

    fn read_blob(&self, slot: Slot, kind: BlobKind) -> Result<Vec<u8>> {
        let path = self.blob_path(slot, kind);
        fs::read(&path)
            .map_err(|e| StorageError::from_io(BackendKind::Steam, path, e).into())
    }

    fn write_pair(&self, slot: Slot, blobs: &SaveBlobs) -> std::result::Result<(), (PathBuf, io::Error)> {
        for kind in BlobKind::ALL {
            let path = self.blob_path(slot, kind);
            fs::write(&path, blobs.get(kind)).map_err(|e| (path, e))?;
        }
        Ok(())
    }
}

impl SaveStorage for DirectoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Steam
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, slot: Slot) -> Result<LoadedSlot> {
        let meta = self.read_blob(slot, BlobKind::Meta)?;
        let profile = self.read_blob(slot, BlobKind::Profile)?;

        debug!(
            slot = %slot,
            meta_bytes = meta.len(),
            profile_bytes = profile.len(),
            "loaded steam save"
        );
        self.state = BackendState::Loaded;
        Ok(LoadedSlot::existing(SaveBlobs { meta, profile }))
    }

    fn persist(&mut self, slot: Slot, blobs: &SaveBlobs) -> Result<()> {
        match self.write_pair(slot, blobs) {
            Ok(()) => {}
            Err((_, e)) if e.kind() == io::ErrorKind::NotFound => {
                let dir = self.slot_dir(slot);
                info!(path = %dir.display(), "creating steam save directory");
                fs::create_dir_all(&dir)
                    .map_err(|e| StorageError::from_io(BackendKind::Steam, &dir, e))?;

                // Single retry once the directory exists.
                self.write_pair(slot, blobs)
                    .map_err(|(path, e)| StorageError::from_io(BackendKind::Steam, path, e))?;
            }
            Err((path, e)) => {
                return Err(StorageError::Io {
                    backend: BackendKind::Steam,
                    path,
                    source: e,
                }
                .into())
            }
        }

        debug!(slot = %slot, path = %self.slot_dir(slot).display(), "wrote steam save");
        self.state = BackendState::Persisted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SaveError;
    use tempfile::TempDir;

    #[test]
    fn test_persist_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = DirectoryStorage::new(temp_dir.path());
        assert_eq!(storage.state(), BackendState::Unloaded);

        let blobs = SaveBlobs::new(b"meta bytes".to_vec(), b"profile bytes".to_vec());
        storage.persist(Slot::One, &blobs).unwrap();
        assert_eq!(storage.state(), BackendState::Persisted);

        let loaded = storage.load(Slot::One).unwrap();
        assert_eq!(loaded.blobs, blobs);
        assert!(!loaded.is_fresh());
        assert_eq!(storage.state(), BackendState::Loaded);
    }

    #[test]
    fn test_persist_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("Library/Application Support/Balatro");
        let mut storage = DirectoryStorage::new(&root);

        let blobs = SaveBlobs::new(vec![1, 2, 3], vec![4, 5, 6]);
        storage.persist(Slot::Three, &blobs).unwrap();

        assert_eq!(fs::read(root.join("3/meta.jkr")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(root.join("3/profile.jkr")).unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_persist_overwrites_whole_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = DirectoryStorage::new(temp_dir.path());

        storage
            .persist(Slot::Two, &SaveBlobs::new(vec![9; 64], vec![8; 64]))
            .unwrap();
        storage
            .persist(Slot::Two, &SaveBlobs::new(vec![1], vec![2]))
            .unwrap();

        let loaded = storage.load(Slot::Two).unwrap();
        assert_eq!(loaded.blobs, SaveBlobs::new(vec![1], vec![2]));
    }

    #[test]
    fn test_load_missing_slot_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = DirectoryStorage::new(temp_dir.path());

        let err = storage.load(Slot::Two).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            SaveError::Storage(StorageError::NotFound { backend: BackendKind::Steam, .. })
        ));
        assert!(err.to_string().contains("meta.jkr"));
        assert_eq!(storage.state(), BackendState::Unloaded);
    }

    #[test]
    fn test_load_missing_profile_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("1")).unwrap();
        fs::write(temp_dir.path().join("1/meta.jkr"), b"m").unwrap();

        let mut storage = DirectoryStorage::new(temp_dir.path());
        let err = storage.load(Slot::One).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("profile.jkr"));
    }

    #[test]
    fn test_persist_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not_a_dir");
        fs::write(&root, b"occupied").unwrap();

        let mut storage = DirectoryStorage::new(&root);
        let err = storage
            .persist(Slot::One, &SaveBlobs::new(vec![1], vec![2]))
            .unwrap_err();
        assert!(matches!(err, SaveError::Storage(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_slots_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = DirectoryStorage::new(temp_dir.path());

        storage.persist(Slot::One, &SaveBlobs::new(vec![1], vec![1])).unwrap();
        storage.persist(Slot::Two, &SaveBlobs::new(vec![2], vec![2])).unwrap();

        assert_eq!(storage.load(Slot::One).unwrap().blobs.meta, vec![1]);
        assert_eq!(storage.load(Slot::Two).unwrap().blobs.meta, vec![2]);
    }
}
