/*!
Error types for the SaveBridge core engine.
*/

use std::path::PathBuf;
use thiserror::Error;

use crate::config::BackendKind;
use crate::slot::Slot;

/// Result type used throughout the SaveBridge core.
pub type Result<T> = std::result::Result<T, SaveError>;

/// Errors raised by a storage backend while reading or writing save slots.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A save file (or the container file itself) does not exist
    #[error("{backend} save not found at {}", path.display())]
    NotFound { backend: BackendKind, path: PathBuf },

    /// Permission, disk or other I/O failures
    #[error("{backend} I/O failure at {}: {source}", path.display())]
    Io {
        backend: BackendKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container file could not be parsed or has an unexpected shape
    #[error("Invalid save container {}: {message}", path.display())]
    Container { path: PathBuf, message: String },
}

impl StorageError {
    /// Classify an I/O error for `path`, keeping missing files distinguishable
    pub fn from_io(backend: BackendKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { backend, path }
        } else {
            Self::Io {
                backend,
                path,
                source,
            }
        }
    }

    /// Whether this error reports a missing file rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors that can occur during sync and inspect operations.
#[derive(Error, Debug)]
pub enum SaveError {
    /// Bad slot identifier or other rejected input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Malformed compressed stream or transport encoding
    #[error("Codec error: {0}")]
    Codec(String),

    /// Malformed table literal
    #[error("Decode error at byte {position}: {message}")]
    Decode { position: usize, message: String },

    /// A slot pair could not be copied between backends
    #[error("Failed to copy {source_backend} slot {source_slot} to {dest_backend} slot {dest_slot}: {source}")]
    Transfer {
        source_backend: BackendKind,
        source_slot: Slot,
        dest_backend: BackendKind,
        dest_slot: Slot,
        #[source]
        source: Box<SaveError>,
    },

    /// Invalid save locations
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SaveError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Self::Codec(msg.into())
    }

    /// Create a new decode error at the given byte offset
    pub fn decode<S: Into<String>>(position: usize, msg: S) -> Self {
        Self::Decode {
            position,
            message: msg.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the underlying cause is a missing save file
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_not_found(),
            Self::Transfer { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
