use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure classes surfaced by the launcher core. Network and filesystem
/// errors are handled per game and never abort a whole check or campaign;
/// `Busy` is a rejected precondition, not an operation failure.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("download incomplete: received {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error for {}: {source}", path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("an update check or download is already running")]
    Busy,
}

impl LauncherError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serde {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
