mod audio;
mod cli;
mod config;
mod error;
mod hardware;
mod playback;
mod profile;
#[cfg(test)]
mod test_util;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use audio::beats::SpectralFluxTracker;
use cli::Cli;
use config::{ButtonSource, Config};
use hardware::{Button, TransportController};
use playback::{
    CommandSlot, PlayerKeys, Playlist, ProcessTransport, SyncOptions, Synchronizer, SystemClock,
};
use profile::{title_for, CachedAnalyzer, ProfileStore};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match cli.config.clone().or_else(config::find_config) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => {
            log::info!("No config file found, using defaults");
            Config::default()
        }
    };
    apply_overrides(&mut cfg, &cli);
    cfg.validate().context("Invalid configuration")?;

    let library = &cfg.library;
    let mut playlist = Playlist::discover(
        &library.playlist_directory,
        &library.audio_extension,
        library.shuffle,
    )?;
    if playlist.is_empty() {
        anyhow::bail!(
            "No .{} tracks found in {}",
            library.audio_extension,
            library.playlist_directory.display()
        );
    }

    let store = ProfileStore::new(library.cache_dir());
    log::info!("Profile cache: {}", store.dir().display());
    let mut profiles = CachedAnalyzer::new(
        store,
        cfg.analysis.band_edges.clone(),
        Box::new(SpectralFluxTracker::default()),
    );

    if cli.analyze_only {
        return analyze_all(&playlist, &profiles);
    }

    // Both devices are required: failing to open either aborts startup.
    let output = hardware::open_driver(&cfg.output)?;
    let transport = ProcessTransport::new(
        &cfg.player.command,
        cfg.player.args.clone(),
        PlayerKeys {
            pause: cfg.player.pause_key.clone(),
            resume: cfg.player.resume_key.clone(),
            stop: cfg.player.stop_key.clone(),
        },
    )?;

    let commands = CommandSlot::new();
    let mut sync = Synchronizer::new(
        output,
        Box::new(transport),
        Box::new(SystemClock),
        cfg.output.bank_count,
        commands.clone(),
        SyncOptions::from(&cfg.playback),
    );
    let shutdown = sync.shutdown_handle();

    let controller = TransportController::new(commands, Duration::from_millis(cfg.playback.debounce_ms))
        .with_shutdown(shutdown.clone());
    let buttons = match cfg.buttons.source {
        ButtonSource::Keyboard => Some(controller.spawn_keyboard()),
        ButtonSource::Gpio => {
            let [next, previous, pause] = cfg
                .buttons
                .gpio_pins()
                .context("GPIO buttons need next, previous and pause pins")?;
            Some(controller.spawn_gpio(
                &cfg.output.gpio_root,
                [
                    (Button::Next, next),
                    (Button::Previous, previous),
                    (Button::PlayPause, pause),
                ],
                Duration::from_millis(cfg.buttons.poll_ms),
            )?)
        }
        ButtonSource::None => None,
    };

    let result = sync.run(&mut playlist, &mut profiles);
    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    if cfg.buttons.source == ButtonSource::Gpio {
        if let Some(handle) = buttons {
            if let Err(panic) = handle.join() {
                log::error!("Button thread panicked: {:?}", panic);
            }
        }
    }
    result
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(ref dir) = cli.playlist_dir {
        cfg.library.playlist_directory = dir.clone();
    }
    if let Some(ref dir) = cli.cache_dir {
        cfg.library.cache_directory = Some(dir.clone());
    }
    if let Some(ref ext) = cli.extension {
        cfg.library.audio_extension = ext.clone();
    }
    if let Some(driver) = cli.driver {
        cfg.output.driver = driver;
    }
    if cli.no_shuffle {
        cfg.library.shuffle = false;
    }
}

/// Fill the cache for every track without playing anything.
fn analyze_all(playlist: &Playlist, profiles: &CachedAnalyzer) -> Result<()> {
    let mut failed = 0;
    for (i, track) in playlist.tracks().iter().enumerate() {
        log::info!("[{}/{}] {}", i + 1, playlist.len(), track.display());
        match profiles.load_or_analyze(track) {
            Ok(profile) => log::info!(
                "'{}': {} chunks, {:.0} BPM, {:.1}s",
                title_for(track),
                profile.chunk_count(),
                profile.tempo,
                profile.duration
            ),
            Err(e) => {
                log::warn!("Skipping {}: {}", track.display(), e);
                failed += 1;
            }
        }
    }
    log::info!("Analyzed {} of {} track(s)", playlist.len() - failed, playlist.len());
    if failed == playlist.len() {
        anyhow::bail!("No track could be analyzed");
    }
    Ok(())
}
