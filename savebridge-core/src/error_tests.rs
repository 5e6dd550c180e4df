/*!
Tests for error handling and error types.
*/

#[cfg(test)]
mod tests {
    use crate::config::BackendKind;
    use crate::error::{SaveError, StorageError};
    use crate::slot::Slot;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_save_error_display() {
        let error = SaveError::validation("invalid save slot '4'");
        assert_eq!(error.to_string(), "Validation error: invalid save slot '4'");

        let error = SaveError::codec("truncated stream");
        assert_eq!(error.to_string(), "Codec error: truncated stream");

        let error = SaveError::decode(17, "unterminated table");
        assert_eq!(error.to_string(), "Decode error at byte 17: unterminated table");
    }

    #[test]
    fn test_storage_error_names_backend_and_path() {
        let error = StorageError::NotFound {
            backend: BackendKind::Steam,
            path: PathBuf::from("/saves/2/profile.jkr"),
        };
        assert_eq!(error.to_string(), "steam save not found at /saves/2/profile.jkr");

        let error = SaveError::from(StorageError::Container {
            path: PathBuf::from("/prefs.plist"),
            message: "top-level value is not a dictionary".into(),
        });
        assert!(error.to_string().starts_with("Storage error: Invalid save container /prefs.plist"));
    }

    #[test]
    fn test_from_io_keeps_not_found_distinct() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let error = StorageError::from_io(BackendKind::Arcade, "/a.plist", missing);
        assert!(error.is_not_found());

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "Access denied");
        let error = StorageError::from_io(BackendKind::Steam, "/saves/1/meta.jkr", denied);
        match error {
            StorageError::Io { ref source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Io error"),
        }
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_error_chain() {
        use std::error::Error as _;

        let root_cause = StorageError::Io {
            backend: BackendKind::Arcade,
            path: PathBuf::from("/prefs.plist"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "Access denied"),
        };
        let error = SaveError::Transfer {
            source_backend: BackendKind::Steam,
            source_slot: Slot::One,
            dest_backend: BackendKind::Arcade,
            dest_slot: Slot::Three,
            source: Box::new(root_cause.into()),
        };

        assert!(error
            .to_string()
            .starts_with("Failed to copy steam slot 1 to arcade slot 3"));
        let storage = error.source().expect("transfer has a source");
        let io = storage.source().and_then(|e| e.source()).expect("io cause");
        assert!(io.to_string().contains("Access denied"));
    }

    #[test]
    fn test_transfer_not_found_is_visible() {
        let error = SaveError::Transfer {
            source_backend: BackendKind::Steam,
            source_slot: Slot::Two,
            dest_backend: BackendKind::Arcade,
            dest_slot: Slot::Two,
            source: Box::new(
                StorageError::NotFound {
                    backend: BackendKind::Steam,
                    path: PathBuf::from("/saves/2/meta.jkr"),
                }
                .into(),
            ),
        };
        assert!(error.is_not_found());
        assert!(!SaveError::codec("x").is_not_found());
    }

    #[test]
    fn test_save_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        match SaveError::from(json_error) {
            SaveError::Json(_) => {}
            _ => panic!("Expected Json error variant"),
        }
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SaveError>();
        assert_sync::<SaveError>();
    }
}
