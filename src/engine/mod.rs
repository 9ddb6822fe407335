use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::config::{GameEntry, LauncherConfig};
use crate::engine::state::{OutdatedGame, UpdateEvent, UpdatePhase};
use crate::errors::{LauncherError, Result};
use crate::networking::{GameSource, TransferProgress};
use crate::storage::VersionStore;
use crate::util;

pub mod state;

/// Coordinates update checks and download campaigns over the game catalog.
///
/// All slow work runs on spawned tasks; results come back to the caller
/// only through the event channel wired in at construction. The phase
/// token serializes operations: a second check or campaign is rejected
/// while one is running, never queued.
pub struct UpdateEngine {
    games: Vec<GameEntry>,
    games_dir: PathBuf,
    between_games: Duration,
    phase: Arc<Mutex<UpdatePhase>>,
    store: Arc<tokio::sync::Mutex<VersionStore>>,
    source: Arc<dyn GameSource>,
    events: mpsc::UnboundedSender<UpdateEvent>,
}

impl UpdateEngine {
    pub fn new(
        config: &LauncherConfig,
        store: VersionStore,
        source: Arc<dyn GameSource>,
        events: mpsc::UnboundedSender<UpdateEvent>,
    ) -> Self {
        Self {
            games: config.games.clone(),
            games_dir: config.games_dir(),
            between_games: Duration::from_millis(config.between_games_ms),
            phase: Arc::new(Mutex::new(UpdatePhase::Idle)),
            store: Arc::new(tokio::sync::Mutex::new(store)),
            source,
            events,
        }
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> UpdatePhase {
        *lock_phase(&self.phase)
    }

    /// Start a background pass over the catalog comparing stored version
    /// tokens against the remote ones. Returns `Busy` synchronously, with
    /// nothing spawned, if a check or campaign is already running.
    pub fn check_updates(&self) -> Result<()> {
        let guard = PhaseGuard::acquire(&self.phase, UpdatePhase::Checking)?;
        info!("check: probing {} game(s)", self.games.len());
        let _ = self.events.send(UpdateEvent::CheckStarted);

        let games = self.games.clone();
        let store = self.store.clone();
        let source = self.source.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            run_check(games, store, source, events, guard).await;
        });
        Ok(())
    }

    /// Download the named games, in the order given, on a background task.
    /// Unknown ids are rejected before any work starts; `Busy` is returned
    /// synchronously while a check or another campaign is running.
    pub fn start_campaign(&self, game_ids: &[String]) -> Result<()> {
        let mut selection = Vec::with_capacity(game_ids.len());
        for id in game_ids {
            match self.games.iter().find(|g| g.id.eq_ignore_ascii_case(id)) {
                Some(game) => selection.push(game.clone()),
                None => {
                    return Err(LauncherError::Config(format!("unknown game id: {id}")));
                }
            }
        }

        let guard = PhaseGuard::acquire(&self.phase, UpdatePhase::Downloading)?;
        info!("campaign: downloading {} game(s)", selection.len());

        let games_dir = self.games_dir.clone();
        let between_games = self.between_games;
        let store = self.store.clone();
        let source = self.source.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            run_campaign(
                selection,
                games_dir,
                between_games,
                store,
                source,
                events,
                guard,
            )
            .await;
        });
        Ok(())
    }
}

async fn run_check(
    games: Vec<GameEntry>,
    store: Arc<tokio::sync::Mutex<VersionStore>>,
    source: Arc<dyn GameSource>,
    events: mpsc::UnboundedSender<UpdateEvent>,
    guard: PhaseGuard,
) {
    let probes = games.iter().map(|game| {
        let source = source.clone();
        async move { source.probe(&game.source_url).await }
    });
    let results = join_all(probes).await;

    let mut outdated = Vec::new();
    {
        let store = store.lock().await;
        for (game, result) in games.iter().zip(results) {
            match result {
                Ok(meta) => {
                    let local = store.version_of(&game.id);
                    if local != Some(meta.version.as_str()) {
                        debug!(
                            "check: {} outdated (local {:?}, remote {})",
                            game.id, local, meta.version
                        );
                        outdated.push(OutdatedGame {
                            game_id: game.id.clone(),
                            local_version: local.map(str::to_owned),
                            remote_version: meta.version,
                        });
                    }
                }
                Err(err) => {
                    // One unreachable game never aborts the whole check.
                    warn!("check: probe failed for {}: {err}", game.id);
                    let _ = events.send(UpdateEvent::ProbeFailed {
                        game_id: game.id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    // Release the phase before announcing the outcome so a caller reacting
    // to the event can start the next operation straight away.
    if outdated.is_empty() {
        info!("check: all games up to date");
        guard.finish(UpdatePhase::Idle);
        let _ = events.send(UpdateEvent::NoUpdates);
    } else {
        info!("check: {} update(s) available", outdated.len());
        guard.finish(UpdatePhase::UpdatesFound);
        let _ = events.send(UpdateEvent::UpdatesFound(outdated));
    }
}

async fn run_campaign(
    games: Vec<GameEntry>,
    games_dir: PathBuf,
    between_games: Duration,
    store: Arc<tokio::sync::Mutex<VersionStore>>,
    source: Arc<dyn GameSource>,
    events: mpsc::UnboundedSender<UpdateEvent>,
    guard: PhaseGuard,
) {
    let mut completed = 0usize;
    let mut failed = 0usize;
    let total = games.len();

    for (index, game) in games.iter().enumerate() {
        let _ = events.send(UpdateEvent::DownloadStarted {
            game_id: game.id.clone(),
        });
        let dest = games_dir.join(game.file_name());
        info!("campaign: downloading {} to {}", game.id, dest.display());

        let mut progress = {
            let events = events.clone();
            let game_id = game.id.clone();
            move |p: TransferProgress| {
                let _ = events.send(UpdateEvent::DownloadProgress {
                    game_id: game_id.clone(),
                    percent: p.percent,
                    downloaded: p.downloaded,
                    total: p.total,
                });
            }
        };

        match source.fetch(&game.source_url, &dest, &mut progress).await {
            Ok(outcome) => {
                // Flush the new token before the next game starts so stored
                // state never runs ahead of game files on disk.
                let recorded = store.lock().await.record(&game.id, &outcome.version);
                match recorded {
                    Ok(()) => {
                        completed += 1;
                        info!(
                            "campaign: {} v{} downloaded ({})",
                            game.id,
                            outcome.version,
                            util::format_size(outcome.bytes_written)
                        );
                        let _ = events.send(UpdateEvent::DownloadCompleted {
                            game_id: game.id.clone(),
                            version: outcome.version,
                        });
                    }
                    Err(err) => {
                        failed += 1;
                        error!(
                            "campaign: {} downloaded but its version was not persisted: {err}",
                            game.id
                        );
                        let _ = events.send(UpdateEvent::DownloadFailed {
                            game_id: game.id.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
            Err(err) => {
                failed += 1;
                error!("campaign: download failed for {}: {err}", game.id);
                let _ = events.send(UpdateEvent::DownloadFailed {
                    game_id: game.id.clone(),
                    reason: err.to_string(),
                });
            }
        }

        if index + 1 < total && !between_games.is_zero() {
            tokio::time::sleep(between_games).await;
        }
    }

    guard.finish(UpdatePhase::Idle);
    let _ = events.send(UpdateEvent::CampaignFinished { completed, failed });
}

/// Scoped hold on the engine phase. Acquisition is a compare-and-set from
/// a resting phase; dropping the guard always restores a resting phase,
/// so a failed worker can never leave the engine stuck busy.
struct PhaseGuard {
    phase: Arc<Mutex<UpdatePhase>>,
    release_to: UpdatePhase,
}

impl PhaseGuard {
    fn acquire(phase: &Arc<Mutex<UpdatePhase>>, to: UpdatePhase) -> Result<Self> {
        let mut current = lock_phase(phase);
        match *current {
            UpdatePhase::Idle | UpdatePhase::UpdatesFound => {
                *current = to;
                Ok(Self {
                    phase: phase.clone(),
                    release_to: UpdatePhase::Idle,
                })
            }
            UpdatePhase::Checking | UpdatePhase::Downloading => Err(LauncherError::Busy),
        }
    }

    fn finish(mut self, to: UpdatePhase) {
        self.release_to = to;
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        *lock_phase(&self.phase) = self.release_to;
    }
}

fn lock_phase(phase: &Arc<Mutex<UpdatePhase>>) -> MutexGuard<'_, UpdatePhase> {
    // A poisoned lock still holds a valid phase value.
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}
