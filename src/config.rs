use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::analysis::validate_band_edges;
use crate::error::ConfigError;
use crate::hardware::BankPins;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub buttons: ButtonConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Band cutoffs in Hz.
    #[serde(default = "default_band_edges")]
    pub band_edges: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_playlist_directory")]
    pub playlist_directory: PathBuf,
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousPolicy {
    /// Go back one track (stays on the first).
    #[default]
    Retreat,
    /// Replay the current track from the start.
    Restart,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub previous_policy: PreviousPolicy,
    /// Share of each chunk the lights stay on.
    #[serde(default = "default_on_fraction")]
    pub on_fraction: f64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_command")]
    pub command: String,
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
    #[serde(default = "default_pause_key")]
    pub pause_key: String,
    #[serde(default = "default_pause_key")]
    pub resume_key: String,
    #[serde(default = "default_stop_key")]
    pub stop_key: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Log,
    ShiftRegister,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "default_bank_count")]
    pub bank_count: usize,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    /// One entry per bank, in band order.
    #[serde(default)]
    pub banks: Vec<BankPins>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonSource {
    #[default]
    Keyboard,
    Gpio,
    None,
}

#[derive(Debug, Deserialize)]
pub struct ButtonConfig {
    #[serde(default)]
    pub source: ButtonSource,
    #[serde(default)]
    pub next: Option<u32>,
    #[serde(default)]
    pub previous: Option<u32>,
    #[serde(default)]
    pub pause: Option<u32>,
    #[serde(default = "default_button_poll_ms")]
    pub poll_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            band_edges: default_band_edges(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            playlist_directory: default_playlist_directory(),
            cache_directory: None,
            audio_extension: default_audio_extension(),
            shuffle: true,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            previous_policy: PreviousPolicy::default(),
            on_fraction: default_on_fraction(),
            debounce_ms: default_debounce_ms(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            args: default_player_args(),
            pause_key: default_pause_key(),
            resume_key: default_pause_key(),
            stop_key: default_stop_key(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            bank_count: default_bank_count(),
            gpio_root: default_gpio_root(),
            banks: Vec::new(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            source: ButtonSource::default(),
            next: None,
            previous: None,
            pause: None,
            poll_ms: default_button_poll_ms(),
        }
    }
}

fn default_band_edges() -> Vec<f64> { vec![0.0, 110.0, 410.0, 700.0, 20000.0] }
fn default_playlist_directory() -> PathBuf { PathBuf::from("songs") }
fn default_audio_extension() -> String { "wav".into() }
fn default_true() -> bool { true }
fn default_on_fraction() -> f64 { 0.75 }
fn default_debounce_ms() -> u64 { 200 }
fn default_pause_poll_ms() -> u64 { 250 }
fn default_player_command() -> String { "omxplayer".into() }
fn default_player_args() -> Vec<String> { vec!["-o".into(), "local".into()] }
fn default_pause_key() -> String { "p".into() }
fn default_stop_key() -> String { "q".into() }
fn default_bank_count() -> usize { 4 }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
fn default_button_poll_ms() -> u64 { 10 }

impl LibraryConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join("lightshow").join("profiles"))
                .unwrap_or_else(|| PathBuf::from("song_profiles"))
        })
    }
}

impl ButtonConfig {
    pub fn gpio_pins(&self) -> Option<[u32; 3]> {
        Some([self.next?, self.previous?, self.pause?])
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let edges = &self.analysis.band_edges;
        validate_band_edges(edges).map_err(|e| ConfigError::InvalidBandConfig(e.to_string()))?;

        let bands = edges.len() - 1;
        if self.output.bank_count != bands {
            return Err(ConfigError::InvalidBandConfig(format!(
                "bank_count is {} but band_edges define {} band(s)",
                self.output.bank_count, bands
            )));
        }
        if self.output.driver == DriverKind::ShiftRegister && self.output.banks.len() != bands {
            return Err(ConfigError::InvalidBandConfig(format!(
                "{} shift-register bank(s) wired for {} band(s)",
                self.output.banks.len(),
                bands
            )));
        }
        if !(self.playback.on_fraction > 0.0 && self.playback.on_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "on_fraction must be in (0, 1], got {}",
                self.playback.on_fraction
            )));
        }
        if self.buttons.source == ButtonSource::Gpio && self.buttons.gpio_pins().is_none() {
            return Err(ConfigError::Invalid(
                "gpio buttons need next, previous and pause pins".into(),
            ));
        }
        if !self.library.playlist_directory.is_dir() {
            return Err(ConfigError::MissingDirectory(
                self.library.playlist_directory.clone(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// `./lightshow.toml`, then `~/.config/lightshow/config.toml`, then the
/// platform config dir.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("lightshow.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("lightshow").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("lightshow").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
