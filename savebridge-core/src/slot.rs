/*!
Save slot identifiers and the blob pair stored for each slot.
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, SaveError};

/// One of the three save slots the game exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Slot {
    One,
    Two,
    Three,
}

impl Slot {
    /// Every slot, in display order
    pub const ALL: [Slot; 3] = [Slot::One, Slot::Two, Slot::Three];

    /// The identifier used in file names and container keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::One => "1",
            Slot::Two => "2",
            Slot::Three => "3",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = SaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Slot::One),
            "2" => Ok(Slot::Two),
            "3" => Ok(Slot::Three),
            other => Err(SaveError::validation(format!(
                "invalid save slot '{other}', expected 1, 2 or 3"
            ))),
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = SaveError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Slot::One),
            2 => Ok(Slot::Two),
            3 => Ok(Slot::Three),
            other => Err(SaveError::validation(format!(
                "invalid save slot {other}, expected 1, 2 or 3"
            ))),
        }
    }
}

impl TryFrom<String> for Slot {
    type Error = SaveError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.as_str().to_string()
    }
}

/// The two blobs every slot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Meta,
    Profile,
}

impl BlobKind {
    pub const ALL: [BlobKind; 2] = [BlobKind::Meta, BlobKind::Profile];

    /// File name inside a slot directory
    pub fn file_name(&self) -> &'static str {
        match self {
            BlobKind::Meta => "meta.jkr",
            BlobKind::Profile => "profile.jkr",
        }
    }

    /// Key of this blob inside the shared container document
    pub fn container_key(&self, slot: Slot) -> String {
        format!("{}__{}.data", slot, self.file_name())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::Meta => "meta",
            BlobKind::Profile => "profile",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw compressed blobs of one slot
///
/// Blobs are opaque; they are only ever replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveBlobs {
    pub meta: Vec<u8>,
    pub profile: Vec<u8>,
}

impl SaveBlobs {
    pub fn new(meta: impl Into<Vec<u8>>, profile: impl Into<Vec<u8>>) -> Self {
        Self {
            meta: meta.into(),
            profile: profile.into(),
        }
    }

    pub fn get(&self, kind: BlobKind) -> &[u8] {
        match kind {
            BlobKind::Meta => &self.meta,
            BlobKind::Profile => &self.profile,
        }
    }

    pub fn set(&mut self, kind: BlobKind, blob: impl Into<Vec<u8>>) {
        match kind {
            BlobKind::Meta => self.meta = blob.into(),
            BlobKind::Profile => self.profile = blob.into(),
        }
    }

    /// True when neither blob holds any data
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.profile.is_empty()
    }
}

/// Whether a slot already held a save when it was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Existing,
    /// No save was found; blobs are empty and the slot will be created on persist
    Fresh,
}

/// Result of loading a slot from a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSlot {
    pub blobs: SaveBlobs,
    pub status: SlotStatus,
}

impl LoadedSlot {
    pub fn existing(blobs: SaveBlobs) -> Self {
        Self {
            blobs,
            status: SlotStatus::Existing,
        }
    }

    pub fn fresh() -> Self {
        Self {
            blobs: SaveBlobs::default(),
            status: SlotStatus::Fresh,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.status == SlotStatus::Fresh
    }
}
