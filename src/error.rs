use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a track into a [`SongProfile`](crate::profile::SongProfile).
///
/// None of these are fatal: the synchronizer logs them and moves on to the
/// next track in the playlist.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("audio contains no samples")]
    EmptyAudio,

    #[error("beat tracker found {found} beat(s), at least 2 are needed to form chunks")]
    NoBeatsDetected { found: usize },

    #[error("invalid band edges: {0}")]
    InvalidBandConfig(String),

    /// Cached profile could not be parsed or violates the profile invariants.
    #[error("cached profile {path} is corrupt: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the two single-writer devices the synchronizer drives.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("output driver unavailable: {0}")]
    OutputDriverUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid band configuration: {0}")]
    InvalidBandConfig(String),

    #[error("directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
