//! Configuration module for save locations and backend selection
//!
//! This module provides the configuration structure describing where each
//! storage backend keeps its saves, and the enum used to pick between the
//! Steam directory layout and the Apple Arcade container.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::storage::{ContainerStorage, DirectoryStorage, SaveStorage};
use crate::{Result, SaveError};

/// Environment variable overriding the Steam save root
pub const STEAM_DIR_ENV: &str = "SAVEBRIDGE_STEAM_DIR";
/// Environment variable overriding the Arcade container file
pub const ARCADE_PLIST_ENV: &str = "SAVEBRIDGE_ARCADE_PLIST";

const STEAM_RELATIVE_ROOT: &str = "Library/Application Support/Balatro";
const ARCADE_RELATIVE_PLIST: &str =
    "Library/Containers/com.playstack.balatroarcade/Data/Library/Preferences/com.playstack.balatroarcade.plist";

/// Enumeration of supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Per-slot directories holding `meta.jkr` and `profile.jkr`
    Steam,
    /// One shared property list holding every slot
    Arcade,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Steam => "steam",
            BackendKind::Arcade => "arcade",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = SaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steam" => Ok(BackendKind::Steam),
            "arcade" => Ok(BackendKind::Arcade),
            other => Err(SaveError::validation(format!(
                "unknown backend '{other}', expected steam or arcade"
            ))),
        }
    }
}

/// Where each backend keeps its saves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveLocations {
    /// Root directory of the Steam layout (contains `1/`, `2/`, `3/`)
    pub steam_root: PathBuf,
    /// The Arcade preferences property list
    pub arcade_plist: PathBuf,
}

impl SaveLocations {
    pub fn new(steam_root: impl Into<PathBuf>, arcade_plist: impl Into<PathBuf>) -> Self {
        Self {
            steam_root: steam_root.into(),
            arcade_plist: arcade_plist.into(),
        }
    }

    /// The locations the game uses on macOS, relative to the user's home directory
    pub fn default_paths() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| SaveError::config("could not determine the home directory"))?;
        Ok(Self::under_home(home))
    }

    /// Default layout rooted at an arbitrary home directory
    pub fn under_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            steam_root: home.join(STEAM_RELATIVE_ROOT),
            arcade_plist: home.join(ARCADE_RELATIVE_PLIST),
        }
    }

    /// Default locations with `SAVEBRIDGE_STEAM_DIR` / `SAVEBRIDGE_ARCADE_PLIST` applied
    pub fn from_env() -> Result<Self> {
        Self::default_paths()?.with_overrides(
            std::env::var_os(STEAM_DIR_ENV).map(PathBuf::from),
            std::env::var_os(ARCADE_PLIST_ENV).map(PathBuf::from),
        )
    }

    /// Replace either location, then validate the result
    pub fn with_overrides(
        mut self,
        steam_root: Option<PathBuf>,
        arcade_plist: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(root) = steam_root {
            self.steam_root = root;
        }
        if let Some(plist) = arcade_plist {
            self.arcade_plist = plist;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.steam_root.as_os_str().is_empty() {
            return Err(SaveError::config("Steam save root must not be empty"));
        }
        if self.arcade_plist.as_os_str().is_empty() {
            return Err(SaveError::config("Arcade container path must not be empty"));
        }
        if self.arcade_plist.is_dir() {
            return Err(SaveError::config(format!(
                "Arcade container path {} is a directory",
                self.arcade_plist.display()
            )));
        }
        Ok(())
    }

    /// Open a fresh, unloaded backend instance of the given kind
    pub fn open_backend(&self, kind: BackendKind) -> Box<dyn SaveStorage> {
        debug!(backend = %kind, "opening save backend");
        match kind {
            BackendKind::Steam => Box::new(DirectoryStorage::new(&self.steam_root)),
            BackendKind::Arcade => Box::new(ContainerStorage::new(&self.arcade_plist)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_under_home_layout() {
        let locations = SaveLocations::under_home("/Users/test");
        assert_eq!(
            locations.steam_root,
            Path::new("/Users/test/Library/Application Support/Balatro")
        );
        assert!(locations
            .arcade_plist
            .ends_with("Preferences/com.playstack.balatroarcade.plist"));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let locations = SaveLocations::under_home("/home/u")
            .with_overrides(Some(PathBuf::from("/saves/steam")), None)
            .unwrap();
        assert_eq!(locations.steam_root, Path::new("/saves/steam"));
        assert!(locations.arcade_plist.starts_with("/home/u"));
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let locations = SaveLocations::new("", "/tmp/x.plist");
        assert!(matches!(locations.validate(), Err(SaveError::Config(_))));

        let locations = SaveLocations::new("/tmp", "");
        assert!(matches!(locations.validate(), Err(SaveError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_directory_container() {
        let temp_dir = TempDir::new().unwrap();
        let locations = SaveLocations::new(temp_dir.path(), temp_dir.path());
        assert!(locations
            .validate()
            .unwrap_err()
            .to_string()
            .contains("is a directory"));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Steam".parse::<BackendKind>().unwrap(), BackendKind::Steam);
        assert_eq!("arcade".parse::<BackendKind>().unwrap(), BackendKind::Arcade);
        assert!(matches!(
            "icloud".parse::<BackendKind>(),
            Err(SaveError::Validation(_))
        ));
    }

    #[test]
    fn test_open_backend_kinds() {
        let temp_dir = TempDir::new().unwrap();
        let locations =
            SaveLocations::new(temp_dir.path().join("steam"), temp_dir.path().join("a.plist"));
        assert_eq!(locations.open_backend(BackendKind::Steam).kind(), BackendKind::Steam);
        assert_eq!(locations.open_backend(BackendKind::Arcade).kind(), BackendKind::Arcade);
    }

    #[test]
    fn test_config_serializes() {
        let locations = SaveLocations::new("/a", "/b.plist");
        let json = serde_json::to_string(&locations).unwrap();
        let back: SaveLocations = serde_json::from_str(&json).unwrap();
        assert_eq!(back, locations);
        assert_eq!(serde_json::to_string(&BackendKind::Arcade).unwrap(), "\"arcade\"");
    }
}
