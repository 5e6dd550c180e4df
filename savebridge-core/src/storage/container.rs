/*!
Apple Arcade layout: every slot stored as data fields of one property list.

The container is the game's preferences file, so it also holds keys this
crate knows nothing about. Only `<slot>__meta.jkr.data` and
`<slot>__profile.jkr.data` are ever touched; everything else is written back
exactly as it was read.
*/

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{BackendState, SaveStorage};
use crate::config::BackendKind;
use crate::slot::{BlobKind, LoadedSlot, SaveBlobs, Slot};
use crate::{Result, StorageError};

const BINARY_PLIST_MAGIC: &[u8] = b"bplist00";

/// On-disk encoding of the property list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    Binary,
    Xml,
}

impl PlistFormat {
    fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(BINARY_PLIST_MAGIC) {
            PlistFormat::Binary
        } else {
            PlistFormat::Xml
        }
    }
}

#[derive(Debug, Clone)]
struct ContainerDocument {
    entries: Dictionary,
    format: PlistFormat,
}

/// Shared property-list storage backend
///
/// # Example
/// ```rust,no_run
/// use savebridge_core::{ContainerStorage, SaveStorage, Slot};
///
/// let mut storage = ContainerStorage::new("/path/to/com.playstack.balatroarcade.plist");
/// let slot = storage.load(Slot::One)?;
/// if slot.is_fresh() {
///     println!("slot 1 has no save yet");
/// }
/// # Ok::<(), savebridge_core::SaveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContainerStorage {
    path: PathBuf,
    document: Option<ContainerDocument>,
    state: BackendState,
}

impl ContainerStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            document: None,
            state: BackendState::Unloaded,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding of the loaded document, if one has been read
    pub fn format(&self) -> Option<PlistFormat> {
        self.document.as_ref().map(|doc| doc.format)
    }

    fn container_error(&self, message: impl Into<String>) -> StorageError {
        StorageError::Container {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn read_document(&self) -> Result<ContainerDocument> {
        let bytes = fs::read(&self.path)
            .map_err(|e| StorageError::from_io(BackendKind::Arcade, &self.path, e))?;
        let format = PlistFormat::detect(&bytes);

        let value = Value::from_reader(Cursor::new(&bytes))
            .map_err(|e| self.container_error(format!("failed to parse property list: {e}")))?;
        let entries = value
            .into_dictionary()
            .ok_or_else(|| self.container_error("top-level value is not a dictionary"))?;

        debug!(
            path = %self.path.display(),
            keys = entries.len(),
            format = ?format,
            "read arcade container"
        );
        Ok(ContainerDocument { entries, format })
    }

    fn blob(&self, entries: &Dictionary, key: &str) -> Result<Option<Vec<u8>>> {
        match entries.get(key) {
            None => Ok(None),
            Some(Value::Data(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => Err(self
                .container_error(format!("key '{key}' does not hold a data value"))
                .into()),
        }
    }

    fn write_document(&self, document: &ContainerDocument) -> Result<()> {
        let io_error = |e: std::io::Error| StorageError::from_io(BackendKind::Arcade, &self.path, e);

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(parent).map_err(io_error)?;

        let value = Value::Dictionary(document.entries.clone());
        let encoded = match document.format {
            PlistFormat::Binary => value.to_writer_binary(&mut staged),
            PlistFormat::Xml => value.to_writer_xml(&mut staged),
        };
        encoded.map_err(|e| self.container_error(format!("failed to encode property list: {e}")))?;
        staged.flush().map_err(io_error)?;

        // The staged file is created 0600; keep the container's existing mode.
        if let Ok(existing) = fs::metadata(&self.path) {
            staged
                .as_file()
                .set_permissions(existing.permissions())
                .map_err(io_error)?;
        }

        // Rename over the original so a failed write never leaves a half-written container.
        staged.persist(&self.path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl SaveStorage for ContainerStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Arcade
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, slot: Slot) -> Result<LoadedSlot> {
        let document = self.read_document()?;

        let meta = self.blob(&document.entries, &BlobKind::Meta.container_key(slot))?;
        let profile = self.blob(&document.entries, &BlobKind::Profile.container_key(slot))?;
        self.document = Some(document);
        self.state = BackendState::Loaded;

        match (meta, profile) {
            (Some(meta), Some(profile)) => {
                debug!(
                    slot = %slot,
                    meta_bytes = meta.len(),
                    profile_bytes = profile.len(),
                    "loaded arcade save"
                );
                Ok(LoadedSlot::existing(SaveBlobs { meta, profile }))
            }
            _ => {
                warn!(slot = %slot, "No save found for this slot, a new one will be created");
                Ok(LoadedSlot::fresh())
            }
        }
    }

    fn persist(&mut self, slot: Slot, blobs: &SaveBlobs) -> Result<()> {
        let mut document = match self.document.take() {
            Some(document) => document,
            None => match self.read_document() {
                Ok(document) => document,
                Err(e) if e.is_not_found() => {
                    warn!(path = %self.path.display(), "arcade container missing, creating a new one");
                    ContainerDocument {
                        entries: Dictionary::new(),
                        format: PlistFormat::Xml,
                    }
                }
                Err(e) => return Err(e),
            },
        };

        for kind in BlobKind::ALL {
            document
                .entries
                .insert(kind.container_key(slot), Value::Data(blobs.get(kind).to_vec()));
        }

        let written = self.write_document(&document);
        self.document = Some(document);
        written?;

        debug!(slot = %slot, path = %self.path.display(), "wrote arcade save");
        self.state = BackendState::Persisted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SaveError;
    use tempfile::TempDir;

    fn seed_container(path: &Path, format: PlistFormat) -> Dictionary {
        let mut entries = Dictionary::new();
        entries.insert("unrelated_setting".to_string(), Value::String("keep me".into()));
        entries.insert("volume".to_string(), Value::Integer(plist::Integer::from(80i64)));
        entries.insert("2__meta.jkr.data".to_string(), Value::Data(vec![2, 2, 2]));
        entries.insert("2__profile.jkr.data".to_string(), Value::Data(vec![3, 3]));
        let mut nested = Dictionary::new();
        nested.insert("flag".to_string(), Value::Boolean(true));
        entries.insert("nested".to_string(), Value::Dictionary(nested));

        let value = Value::Dictionary(entries.clone());
        match format {
            PlistFormat::Binary => value.to_file_binary(path).unwrap(),
            PlistFormat::Xml => value.to_file_xml(path).unwrap(),
        }
        entries
    }

    fn read_back(path: &Path) -> Dictionary {
        Value::from_file(path).unwrap().into_dictionary().unwrap()
    }

    #[test]
    fn test_load_existing_slot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        seed_container(&path, PlistFormat::Xml);

        let mut storage = ContainerStorage::new(&path);
        let loaded = storage.load(Slot::Two).unwrap();
        assert!(!loaded.is_fresh());
        assert_eq!(loaded.blobs, SaveBlobs::new(vec![2, 2, 2], vec![3, 3]));
        assert_eq!(storage.state(), BackendState::Loaded);
    }

    #[test]
    fn test_load_missing_keys_is_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        seed_container(&path, PlistFormat::Xml);

        let mut storage = ContainerStorage::new(&path);
        let loaded = storage.load(Slot::One).unwrap();
        assert!(loaded.is_fresh());
        assert!(loaded.blobs.is_empty());
    }

    #[test]
    fn test_persist_leaves_unrelated_keys_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        let original = seed_container(&path, PlistFormat::Xml);

        let mut storage = ContainerStorage::new(&path);
        storage.load(Slot::One).unwrap();
        storage
            .persist(Slot::One, &SaveBlobs::new(b"M".to_vec(), b"P".to_vec()))
            .unwrap();
        assert_eq!(storage.state(), BackendState::Persisted);

        let written = read_back(&path);
        for (key, value) in &original {
            assert_eq!(written.get(key), Some(value), "key {key} changed");
        }
        assert_eq!(
            written.get("1__meta.jkr.data").and_then(Value::as_data),
            Some(&b"M"[..])
        );
        assert_eq!(
            written.get("1__profile.jkr.data").and_then(Value::as_data),
            Some(&b"P"[..])
        );
        assert_eq!(written.len(), original.len() + 2);
    }

    #[test]
    fn test_persist_keeps_binary_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        seed_container(&path, PlistFormat::Binary);

        let mut storage = ContainerStorage::new(&path);
        storage
            .persist(Slot::Three, &SaveBlobs::new(vec![7], vec![8]))
            .unwrap();

        assert_eq!(storage.format(), Some(PlistFormat::Binary));
        assert!(fs::read(&path).unwrap().starts_with(BINARY_PLIST_MAGIC));
        assert_eq!(
            storage.load(Slot::Three).unwrap().blobs,
            SaveBlobs::new(vec![7], vec![8])
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_keeps_container_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        seed_container(&path, PlistFormat::Xml);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut storage = ContainerStorage::new(&path);
        storage
            .persist(Slot::One, &SaveBlobs::new(vec![1], vec![2]))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_persist_without_container_creates_one() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new.plist");

        let mut storage = ContainerStorage::new(&path);
        storage
            .persist(Slot::One, &SaveBlobs::new(vec![1], vec![2]))
            .unwrap();

        assert_eq!(storage.format(), Some(PlistFormat::Xml));
        let written = read_back(&path);
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_load_missing_container_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = ContainerStorage::new(temp_dir.path().join("absent.plist"));

        let err = storage.load(Slot::One).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("arcade"));
    }

    #[test]
    fn test_load_rejects_non_data_slot_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        let mut entries = Dictionary::new();
        entries.insert("1__meta.jkr.data".to_string(), Value::String("oops".into()));
        Value::Dictionary(entries).to_file_xml(&path).unwrap();

        let err = ContainerStorage::new(&path).load(Slot::One).unwrap_err();
        assert!(matches!(err, SaveError::Storage(StorageError::Container { .. })));
        assert!(err.to_string().contains("1__meta.jkr.data"));
    }

    #[test]
    fn test_load_rejects_garbage_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        fs::write(&path, b"definitely not a plist").unwrap();

        let err = ContainerStorage::new(&path).load(Slot::One).unwrap_err();
        assert!(matches!(err, SaveError::Storage(StorageError::Container { .. })));
    }

    #[test]
    fn test_load_observes_external_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        seed_container(&path, PlistFormat::Xml);

        let mut storage = ContainerStorage::new(&path);
        assert!(storage.load(Slot::One).unwrap().is_fresh());

        let mut other = ContainerStorage::new(&path);
        other
            .persist(Slot::One, &SaveBlobs::new(vec![5], vec![6]))
            .unwrap();

        assert_eq!(
            storage.load(Slot::One).unwrap().blobs,
            SaveBlobs::new(vec![5], vec![6])
        );
    }
}
