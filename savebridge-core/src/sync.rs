/*!
Sync engine that copies and inspects save slots across storage backends.

This module contains the core business logic: copying a slot's blob pair from
one backend to another untouched, and decoding a slot's blobs into a
[`Value`] tree for display.
*/

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info, warn};

use crate::compression::{CompressionAdapter, RawDeflate};
use crate::config::BackendKind;
use crate::slot::{BlobKind, SaveBlobs, Slot};
use crate::storage::SaveStorage;
use crate::table::{self, Value};
use crate::{Result, SaveError};

/// Keyword the engine writes ahead of every serialized table
pub const FRAME_HEADER: &str = "return";

/// Outcome of decoding one blob
pub type FieldReport = std::result::Result<Value, SaveError>;

/// Decoded view of one slot
///
/// Each blob is decoded independently, so a corrupt profile still leaves a
/// readable meta and vice versa.
#[derive(Debug)]
pub struct InspectReport {
    pub backend: BackendKind,
    pub slot: Slot,
    pub meta: FieldReport,
    pub profile: FieldReport,
}

impl InspectReport {
    pub fn field(&self, kind: BlobKind) -> &FieldReport {
        match kind {
            BlobKind::Meta => &self.meta,
            BlobKind::Profile => &self.profile,
        }
    }

    /// True when both blobs decoded
    pub fn is_complete(&self) -> bool {
        self.meta.is_ok() && self.profile.is_ok()
    }

    /// Failed fields with their errors
    pub fn errors(&self) -> Vec<(BlobKind, &SaveError)> {
        BlobKind::ALL
            .into_iter()
            .filter_map(|kind| self.field(kind).as_ref().err().map(|e| (kind, e)))
            .collect()
    }

    /// Render as `{"meta": ..., "profile": ...}`; failed fields become `{"error": "..."}`
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct FieldView<'a>(&'a FieldReport);

impl Serialize for FieldView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Ok(value) => value.serialize(serializer),
            Err(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &e.to_string())?;
                map.end()
            }
        }
    }
}

impl Serialize for InspectReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("meta", &FieldView(&self.meta))?;
        map.serialize_entry("profile", &FieldView(&self.profile))?;
        map.end()
    }
}

/// Strip the engine's framing from an inflated blob, leaving the table literal
///
/// Inflated saves read `return {...}`. Surrounding whitespace and trailing NUL
/// bytes are dropped as well.
///
/// # Errors
/// * `SaveError::Decode` - at position 0 when the `return` header is missing,
///   or at the first offending byte when the text is not UTF-8
pub fn unframe(inflated: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(inflated).map_err(|e| {
        SaveError::decode(e.valid_up_to(), "inflated save is not valid UTF-8")
    })?;
    strip_header(text)
}

fn strip_header(text: &str) -> Result<&str> {
    text.trim_start()
        .strip_prefix(FRAME_HEADER)
        .map(|body| body.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
        .ok_or_else(|| {
            SaveError::decode(
                0,
                format!("missing '{FRAME_HEADER}' header before the table literal"),
            )
        })
}

/// Main engine for sync and inspect operations
///
/// # Example
/// ```rust
/// use savebridge_core::{create_default_engine, DirectoryStorage, SaveBlobs, SaveStorage, Slot};
///
/// # let temp = tempfile::TempDir::new().unwrap();
/// let mut steam = DirectoryStorage::new(temp.path().join("steam"));
/// steam.persist(Slot::One, &SaveBlobs::new(b"M".to_vec(), b"P".to_vec()))?;
///
/// let mut backup = DirectoryStorage::new(temp.path().join("backup"));
/// let engine = create_default_engine();
/// engine.sync(&mut steam, Slot::One, &mut backup, Slot::Three)?;
/// assert_eq!(backup.load(Slot::Three)?.blobs.meta, b"M");
/// # Ok::<(), savebridge_core::SaveError>(())
/// ```
pub struct SaveSyncEngine<C>
where
    C: CompressionAdapter,
{
    compressor: C,
}

impl<C> SaveSyncEngine<C>
where
    C: CompressionAdapter,
{
    /// Create a new engine with the given blob codec
    pub fn new(compressor: C) -> Self {
        Self { compressor }
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    /// Copy a slot's blobs verbatim from one backend to another
    ///
    /// The blobs are neither decoded nor recompressed. They are written to the
    /// destination as a pair in a single persist call; other destination slots
    /// and unrelated container keys are left alone.
    ///
    /// # Arguments
    /// * `source` - Backend to read from
    /// * `source_slot` - Slot to read
    /// * `dest` - Backend to write to
    /// * `dest_slot` - Slot to overwrite
    ///
    /// # Returns
    /// The copied blob pair
    ///
    /// # Errors
    /// * `SaveError::Transfer` - wrapping the load or persist failure, naming both ends
    pub fn sync<S, D>(
        &self,
        source: &mut S,
        source_slot: Slot,
        dest: &mut D,
        dest_slot: Slot,
    ) -> Result<SaveBlobs>
    where
        S: SaveStorage + ?Sized,
        D: SaveStorage + ?Sized,
    {
        let (source_backend, dest_backend) = (source.kind(), dest.kind());
        let transfer_error = |e: SaveError| SaveError::Transfer {
            source_backend,
            source_slot,
            dest_backend,
            dest_slot,
            source: Box::new(e),
        };

        info!(
            from = %source_backend,
            from_slot = %source_slot,
            to = %dest_backend,
            to_slot = %dest_slot,
            "copying save"
        );

        let loaded = source.load(source_slot).map_err(transfer_error)?;
        if loaded.is_fresh() {
            warn!(
                backend = %source_backend,
                slot = %source_slot,
                "source slot has no save, copying empty blobs"
            );
        }

        dest.persist(dest_slot, &loaded.blobs)
            .map_err(transfer_error)?;

        debug!(
            meta_bytes = loaded.blobs.meta.len(),
            profile_bytes = loaded.blobs.profile.len(),
            "save copied"
        );
        Ok(loaded.blobs)
    }

    /// Decode a slot's blobs for display
    ///
    /// Loading the slot must succeed; after that each blob is inflated,
    /// unframed and decoded on its own, and a failure is recorded in that
    /// field of the report instead of aborting the other one.
    ///
    /// # Errors
    /// * Any error from `backend.load`
    pub fn inspect<S>(&self, backend: &mut S, slot: Slot) -> Result<InspectReport>
    where
        S: SaveStorage + ?Sized,
    {
        let kind = backend.kind();
        let loaded = backend.load(slot)?;
        if loaded.is_fresh() {
            warn!(backend = %kind, slot = %slot, "slot has no save to inspect");
        }

        let decode_field = |blob_kind: BlobKind| {
            self.decode_blob(loaded.blobs.get(blob_kind)).map_err(|e| {
                warn!(backend = %kind, slot = %slot, field = %blob_kind, error = %e, "failed to decode blob");
                e
            })
        };

        Ok(InspectReport {
            backend: kind,
            slot,
            meta: decode_field(BlobKind::Meta),
            profile: decode_field(BlobKind::Profile),
        })
    }

    /// Inflate, unframe and decode a single blob; an empty blob decodes to `Nil`
    pub fn decode_blob(&self, blob: &[u8]) -> Result<Value> {
        if blob.is_empty() {
            return Ok(Value::Nil);
        }
        let inflated = self.compressor.decompress(blob)?;
        let literal = unframe(&inflated)?;
        table::decode(literal)
    }
}

/// Create an engine using the game's raw deflate codec
pub fn create_default_engine() -> SaveSyncEngine<RawDeflate> {
    SaveSyncEngine::new(RawDeflate::new())
}
