use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;

use crate::errors::{LauncherError, Result};

/// Persisted map of game id to the version token of the copy on disk.
///
/// The map is small and rewritten whole; `record` flushes before returning
/// so a crash between games never loses a finished download's token.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    versions: BTreeMap<String, String>,
}

impl VersionStore {
    /// Open the store backed by `path`. A missing file is an empty store;
    /// an unreadable or malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let versions = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| LauncherError::serde(&path, e))?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(LauncherError::io(&path, err)),
        };
        Ok(Self { path, versions })
    }

    pub fn version_of(&self, game_id: &str) -> Option<&str> {
        self.versions.get(game_id).map(String::as_str)
    }

    /// Store the version token for a game and write the map out.
    pub fn record(&mut self, game_id: &str, version: &str) -> Result<()> {
        self.versions
            .insert(game_id.to_owned(), version.to_owned());
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.versions)
            .map_err(|e| LauncherError::serde(&self.path, e))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        // Write-then-rename keeps a crash from leaving a half-written map.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| LauncherError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| LauncherError::io(&self.path, e))?;
        debug!(
            "storage: persisted {} version(s) to {}",
            self.versions.len(),
            self.path.display()
        );
        Ok(())
    }
}
