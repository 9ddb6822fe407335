use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::errors::{LauncherError, Result};

/// One entry in the game catalog. `source_url` serves both the version
/// probe and the download; `page_url` is the game's community site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEntry {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub page_url: String,
}

impl GameEntry {
    /// Name of the locally cached file for this game.
    pub fn file_name(&self) -> String {
        format!("{}.swf", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub games: Vec<GameEntry>,
    /// Overrides the per-OS default games directory when set.
    #[serde(default)]
    pub games_dir: Option<PathBuf>,
    /// Delay between progress notifications during a transfer.
    #[serde(default = "default_progress_delay_ms")]
    pub progress_delay_ms: u64,
    /// Pause between games in a sequential download run.
    #[serde(default = "default_between_games_ms")]
    pub between_games_ms: u64,
}

fn default_progress_delay_ms() -> u64 {
    10
}

fn default_between_games_ms() -> u64 {
    500
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            games: default_catalog(),
            games_dir: None,
            progress_delay_ms: default_progress_delay_ms(),
            between_games_ms: default_between_games_ms(),
        }
    }
}

impl LauncherConfig {
    /// Load the config from `path`, writing the default catalog there on
    /// first run so users have a file to edit.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                info!("config: wrote default catalog to {}", path.display());
                return Ok(config);
            }
            Err(err) => return Err(LauncherError::io(path, err)),
        };
        serde_json::from_slice(&bytes).map_err(|e| LauncherError::serde(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|e| LauncherError::serde(path, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        fs::write(path, &bytes).map_err(|e| LauncherError::io(path, e))
    }

    /// Directory game files are downloaded into.
    pub fn games_dir(&self) -> PathBuf {
        self.games_dir.clone().unwrap_or_else(env::games_dir)
    }

    /// Look up a catalog entry by id, tolerating case differences.
    pub fn game(&self, id: &str) -> Option<&GameEntry> {
        self.games.iter().find(|g| g.id.eq_ignore_ascii_case(id))
    }
}

fn default_catalog() -> Vec<GameEntry> {
    vec![
        GameEntry {
            id: "PTD1".into(),
            title: "Pokémon Tower Defense".into(),
            source_url: "https://ptd.ooo/PTD1.swf".into(),
            page_url: "https://ptd.ooo/".into(),
        },
        GameEntry {
            id: "PTD2".into(),
            title: "Pokémon Tower Defense 2".into(),
            source_url: "https://ptd.ooo/ptd2/PTD2.swf".into(),
            page_url: "https://ptd.ooo/ptd2/".into(),
        },
        GameEntry {
            id: "PTD3".into(),
            title: "Pokémon Tower Defense 3".into(),
            source_url: "https://ptd.ooo/ptd3/PTD3.swf".into(),
            page_url: "https://ptd.ooo/ptd3/".into(),
        },
    ]
}
