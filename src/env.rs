use std::env;
use std::fs;
use std::path::PathBuf;

/// Returns the root directory used by the launcher for config and game files.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("ptd-launcher")
}

pub fn games_dir() -> PathBuf {
    default_app_dir().join("games")
}

pub fn config_path() -> PathBuf {
    default_app_dir().join("launcher.json")
}

pub fn version_store_path() -> PathBuf {
    default_app_dir().join("versions.json")
}

/// Create the on-disk folder layout expected by the launcher.
pub fn ensure_base_dirs() -> std::io::Result<()> {
    let folders = [default_app_dir(), games_dir()];
    for dir in folders {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
