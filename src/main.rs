use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

mod config;
mod engine;
mod env;
mod errors;
mod networking;
mod storage;
mod util;

use crate::config::LauncherConfig;
use crate::engine::UpdateEngine;
use crate::engine::state::{OutdatedGame, UpdateEvent};
use crate::errors::{LauncherError, Result};
use crate::networking::HttpSource;
use crate::storage::VersionStore;

#[derive(Parser, Debug)]
#[command(
    name = "PTD Launcher",
    author,
    version,
    about = "Keeps local copies of the Pokémon Tower Defense games up to date"
)]
struct Cli {
    /// Path to an alternative launcher.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe every game in the catalog and report which are outdated.
    Check,
    /// Download updates for the named games, or everything outdated.
    Fetch {
        /// Game ids to download, e.g. PTD1 PTD2.
        games: Vec<String>,
        /// Check first and download whatever is outdated.
        #[arg(long, conflicts_with = "games")]
        all: bool,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show stored versions and on-disk files for the whole catalog.
    Status,
    /// Open a game's Pokécenter page in the default browser.
    Open {
        /// Game id, e.g. PTD1.
        game: String,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let runtime = build_runtime();
    if let Err(err) = runtime.block_on(run(cli)) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    env::ensure_base_dirs().map_err(|e| LauncherError::io(env::default_app_dir(), e))?;
    let config_path = cli.config.unwrap_or_else(env::config_path);
    let config = LauncherConfig::load_or_init(&config_path)?;

    match cli.command {
        Command::Check => check_command(&config).await,
        Command::Fetch { games, all, yes } => fetch_command(&config, games, all, yes).await,
        Command::Status => status_command(&config),
        Command::Open { game } => open_command(&config, &game),
    }
}

fn build_engine(
    config: &LauncherConfig,
) -> Result<(UpdateEngine, mpsc::UnboundedReceiver<UpdateEvent>)> {
    let store = VersionStore::load(env::version_store_path())?;
    let source = Arc::new(HttpSource::new(Duration::from_millis(config.progress_delay_ms)));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Ok((UpdateEngine::new(config, store, source, events_tx), events_rx))
}

async fn check_command(config: &LauncherConfig) -> Result<()> {
    let (engine, mut events) = build_engine(config)?;
    println!("Checking for updates...");
    engine.check_updates()?;

    let outdated = wait_for_check(&mut events).await;
    if outdated.is_empty() {
        println!("No updates available");
    } else {
        println!("{}", update_summary(&outdated));
    }
    Ok(())
}

async fn fetch_command(
    config: &LauncherConfig,
    games: Vec<String>,
    all: bool,
    yes: bool,
) -> Result<()> {
    let (engine, mut events) = build_engine(config)?;

    // With no explicit selection, download whatever a fresh check flags.
    let selection = if all || games.is_empty() {
        println!("Checking for updates...");
        engine.check_updates()?;
        let outdated = wait_for_check(&mut events).await;
        if outdated.is_empty() {
            println!("All available updates have been downloaded.");
            return Ok(());
        }
        println!("{}", update_summary(&outdated));
        outdated.into_iter().map(|game| game.game_id).collect()
    } else {
        games
    };

    if !yes && !confirm(&format!("Download {} update(s)? [y/N] ", selection.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    engine.start_campaign(&selection)?;
    let (completed, failed) = drain_campaign(&mut events).await;
    println!("Update process finished.");
    if completed == 0 && failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn status_command(config: &LauncherConfig) -> Result<()> {
    let store = VersionStore::load(env::version_store_path())?;
    let games_dir = config.games_dir();
    for game in &config.games {
        let version = store
            .version_of(&game.id)
            .map(|v| format!("v{v}"))
            .unwrap_or_else(|| "not downloaded".into());
        let on_disk = match std::fs::metadata(games_dir.join(game.file_name())) {
            Ok(meta) => format!("{} on disk", util::format_size(meta.len())),
            Err(_) => "missing".into(),
        };
        println!("{:<6} {:<26} {:<16} {}", game.id, game.title, version, on_disk);
    }
    Ok(())
}

fn open_command(config: &LauncherConfig, id: &str) -> Result<()> {
    let game = config
        .game(id)
        .ok_or_else(|| LauncherError::Config(format!("unknown game id: {id}")))?;
    println!("Opening {}", game.page_url);
    open::that(&game.page_url)
        .map_err(|e| LauncherError::Config(format!("could not open {}: {e}", game.page_url)))
}

/// Consume events until the running check resolves, returning the games it
/// flagged. Probe failures are surfaced as they arrive.
async fn wait_for_check(events: &mut mpsc::UnboundedReceiver<UpdateEvent>) -> Vec<OutdatedGame> {
    while let Some(event) = events.recv().await {
        match event {
            UpdateEvent::ProbeFailed { game_id, reason } => {
                eprintln!("Could not reach {game_id}: {reason}");
            }
            UpdateEvent::NoUpdates => return Vec::new(),
            UpdateEvent::UpdatesFound(outdated) => return outdated,
            _ => {}
        }
    }
    Vec::new()
}

/// Consume events until the campaign finishes, rendering one progress bar
/// per game while sizes are known. Returns the (completed, failed) counts.
async fn drain_campaign(events: &mut mpsc::UnboundedReceiver<UpdateEvent>) -> (usize, usize) {
    let mut bar: Option<ProgressBar> = None;
    while let Some(event) = events.recv().await {
        match event {
            UpdateEvent::DownloadStarted { game_id } => {
                println!("Downloading {game_id}...");
            }
            UpdateEvent::DownloadProgress {
                game_id,
                percent,
                downloaded,
                total,
            } => {
                let bar = bar.get_or_insert_with(|| progress_bar(&game_id, total));
                bar.set_position(downloaded);
                debug!("fetch: {game_id} at {percent}%");
            }
            UpdateEvent::DownloadCompleted { game_id, version } => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                println!("{game_id} v{version} downloaded successfully");
            }
            UpdateEvent::DownloadFailed { game_id, reason } => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                eprintln!("Error downloading {game_id}: {reason}");
            }
            UpdateEvent::CampaignFinished { completed, failed } => {
                return (completed, failed);
            }
            _ => {}
        }
    }
    (0, 0)
}

fn progress_bar(game_id: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style =
        ProgressStyle::with_template("{msg} [{bar:30}] {percent:>3}% ({bytes}/{total_bytes})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.set_message(game_id.to_owned());
    bar
}

fn update_summary(outdated: &[OutdatedGame]) -> String {
    let entries: Vec<String> = outdated
        .iter()
        .map(|game| {
            format!(
                "{}: v{} → v{}",
                game.game_id,
                game.local_version.as_deref().unwrap_or("none"),
                game.remote_version
            )
        })
        .collect();
    format!("Updates available: {}", entries.join(", "))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush().map_err(|e| LauncherError::io("stdout", e))?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|e| LauncherError::io("stdin", e))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn build_runtime() -> Runtime {
    match Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            warn!("main: failed to create multithreaded runtime ({err}); trying single-threaded runtime");
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(fallback_err) => {
                    error!(
                        "main: failed to create any Tokio runtime ({fallback_err}); terminating launcher"
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}
