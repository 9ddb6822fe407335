// Vocabulary crossing from worker tasks to the front-end.

/// Where the engine currently is. At most one check or campaign is in
/// flight; `Idle` and `UpdatesFound` are resting phases a new operation
/// may start from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpdatesFound,
    Downloading,
}

/// One catalog entry whose remote version token differs from the stored one.
#[derive(Clone, Debug)]
pub struct OutdatedGame {
    pub game_id: String,
    pub local_version: Option<String>,
    pub remote_version: String,
}

/// Events posted by background workers; the front-end drains these and
/// owns all presentation wording.
#[derive(Clone, Debug)]
pub enum UpdateEvent {
    CheckStarted,
    /// A single game could not be probed; the check continues without it.
    ProbeFailed {
        game_id: String,
        reason: String,
    },
    NoUpdates,
    UpdatesFound(Vec<OutdatedGame>),
    DownloadStarted {
        game_id: String,
    },
    DownloadProgress {
        game_id: String,
        percent: u8,
        downloaded: u64,
        total: u64,
    },
    DownloadCompleted {
        game_id: String,
        version: String,
    },
    DownloadFailed {
        game_id: String,
        reason: String,
    },
    /// Sent exactly once per campaign, after every requested game is
    /// terminal, regardless of how many failed.
    CampaignFinished {
        completed: usize,
        failed: usize,
    },
}
